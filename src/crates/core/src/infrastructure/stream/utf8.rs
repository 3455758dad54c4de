//! Incremental UTF-8 decoding of response body chunks.

/// Turns byte chunks into text, holding back a multi-byte sequence that is
/// cut by a chunk boundary until the rest of it arrives.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + chunk` as possible. Invalid sequences
    /// become U+FFFD; an incomplete trailing sequence is kept.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            let (valid_up_to, error_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));

            match error_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid_up_to + len);
                }
                None => {
                    self.pending.drain(..valid_up_to);
                    return out;
                }
            }
        }
    }

    /// Flushes bytes left over at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
