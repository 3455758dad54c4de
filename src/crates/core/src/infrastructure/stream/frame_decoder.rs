//! Line framing for `POST /chat/stream` bodies.
//!
//! The body is a sequence of `data: <JSON>` lines. Fragments arrive with
//! arbitrary boundaries, so a line may be split across any number of calls to
//! [`FrameDecoder::push`]; only complete lines are decoded and the remainder is
//! kept until the next fragment or [`FrameDecoder::flush`].

use crate::util::errors::DecodeError;
use crate::util::types::StreamEventRecord;
use log::{debug, trace, warn};
use tabby_core_types::{StreamPayload, DATA_LINE_PREFIX};

/// Result of decoding one record line.
pub type DecodeOutcome = Result<StreamEventRecord, DecodeError>;

/// Incremental decoder for one response stream. Build a fresh one per request.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    saw_terminal: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` and decodes every line it completes, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<DecodeOutcome> {
        if fragment.is_empty() {
            return Vec::new();
        }

        // Only the newly appended text can contain a new line terminator.
        let search_from = self.buffer.len();
        self.buffer.push_str(fragment);
        let Some(offset) = self.buffer[search_from..].rfind('\n') else {
            return Vec::new();
        };

        let tail = self.buffer.split_off(search_from + offset + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);
        complete
            .split('\n')
            .filter_map(|line| self.decode_line(line))
            .collect()
    }

    /// Decodes whatever is left once the stream has ended. The producer may
    /// omit the newline after its last record.
    pub fn flush(&mut self) -> Vec<DecodeOutcome> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return Vec::new();
        }
        trace!("Flushing unterminated stream line: {} bytes", rest.len());
        self.decode_line(&rest).into_iter().collect()
    }

    fn decode_line(&mut self, line: &str) -> Option<DecodeOutcome> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return None;
        }
        let Some(payload) = line.strip_prefix(DATA_LINE_PREFIX) else {
            trace!("Skipping non-data stream line: {:?}", line);
            return None;
        };
        if self.saw_terminal {
            debug!("Ignoring stream line received after the final record");
            return None;
        }

        match serde_json::from_str::<StreamPayload>(payload) {
            Ok(payload) => {
                let is_final_flag = payload.is_final;
                let record = StreamEventRecord::from(payload);
                if let Some(is_final) = is_final_flag {
                    if is_final != record.is_terminal() {
                        warn!(
                            "Stream payload is_final={} disagrees with type {}; using type",
                            is_final,
                            record.kind().as_str()
                        );
                    }
                }
                self.saw_terminal |= record.is_terminal();
                Some(Ok(record))
            }
            Err(e) => Some(Err(DecodeError::malformed(line, e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::types::RecordKind;

    const WELL_FORMED: &str = concat!(
        "data: {\"type\":\"thinking\",\"content\":\"Let me check\"}\n\n",
        "data: {\"type\":\"tool_call\",\"content\":\"list-datasources\"}\n\n",
        "data: {\"type\":\"tool_result\",\"content\":\"3 sources, caf\u{e9} \u{1F431}\"}\n\n",
        "data: {\"type\":\"step\",\"content\":\"Summarizing\",\"is_final\":false}\n\n",
        "data: {\"type\":\"final\",\"content\":\"**Done**\",\"is_final\":true}\n\n",
    );

    fn records(outcomes: Vec<DecodeOutcome>) -> Vec<StreamEventRecord> {
        outcomes.into_iter().filter_map(Result::ok).collect()
    }

    fn decode_chunks(chunks: &[&str]) -> Vec<StreamEventRecord> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(records(decoder.push(chunk)));
        }
        out.extend(records(decoder.flush()));
        out
    }

    fn char_boundaries(text: &str) -> Vec<usize> {
        text.char_indices().map(|(i, _)| i).skip(1).collect()
    }

    #[test]
    fn payload_split_inside_field_name() {
        let out = decode_chunks(&["data: {\"typ", "e\":\"final\",\"content\":\"Hi\"}\n"]);
        assert_eq!(out, vec![StreamEventRecord::final_record("Hi")]);
        assert!(out[0].is_terminal());
    }

    #[test]
    fn two_lines_in_one_fragment_keep_order() {
        let out = decode_chunks(&[
            "data: {\"type\":\"thinking\",\"content\":\"A\"}\ndata: {\"type\":\"final\",\"content\":\"B\"}\n",
        ]);
        assert_eq!(
            out,
            vec![
                StreamEventRecord::new(RecordKind::Thinking, "A"),
                StreamEventRecord::final_record("B"),
            ]
        );
    }

    #[test]
    fn output_is_invariant_under_two_and_three_way_splits() {
        let expected = decode_chunks(&[WELL_FORMED]);
        assert_eq!(expected.len(), 5);

        let cuts = char_boundaries(WELL_FORMED);
        for &a in &cuts {
            assert_eq!(
                decode_chunks(&[&WELL_FORMED[..a], &WELL_FORMED[a..]]),
                expected,
                "split at {a}"
            );
        }
        for &a in cuts.iter().step_by(7) {
            for &b in cuts.iter().filter(|&&b| b > a).step_by(5) {
                let chunks = [&WELL_FORMED[..a], &WELL_FORMED[a..b], &WELL_FORMED[b..]];
                assert_eq!(decode_chunks(&chunks), expected, "split at {a},{b}");
            }
        }
    }

    #[test]
    fn one_char_at_a_time_matches_single_chunk() {
        let expected = decode_chunks(&[WELL_FORMED]);
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        for ch in WELL_FORMED.chars() {
            out.extend(records(decoder.push(ch.encode_utf8(&mut buf))));
        }
        out.extend(records(decoder.flush()));
        assert_eq!(out, expected);
    }

    #[test]
    fn lines_without_marker_never_produce_records() {
        let out = decode_chunks(&[
            ": keep-alive\n",
            "event: message\n",
            "data:{\"type\":\"final\",\"content\":\"no space\"}\n",
            " data: {\"type\":\"final\",\"content\":\"indented\"}\n",
            "{\"type\":\"final\",\"content\":\"bare\"}\n",
            "   \n",
        ]);
        assert!(out.is_empty());
    }

    #[test]
    fn malformed_line_is_reported_and_decoding_continues() {
        let mut decoder = FrameDecoder::new();
        let outcomes = decoder.push(concat!(
            "data: {\"type\":\"thinking\",\"content\":\n",
            "data: {\"type\":\"unknown\",\"content\":\"x\"}\n",
            "data: {\"type\":\"final\",\"content\":\"ok\"}\n",
        ));
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], Err(DecodeError::MalformedPayload { .. })));
        assert!(matches!(outcomes[1], Err(DecodeError::MalformedPayload { .. })));
        assert_eq!(
            outcomes[2].as_ref().ok(),
            Some(&StreamEventRecord::final_record("ok"))
        );
        assert!(decoder.saw_terminal);
    }

    #[test]
    fn flush_decodes_unterminated_last_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder
            .push("data: {\"type\":\"final\",\"content\":\"tail\"}")
            .is_empty());
        assert!(!decoder.buffer.is_empty());
        assert_eq!(
            records(decoder.flush()),
            vec![StreamEventRecord::final_record("tail")]
        );
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn flush_drops_malformed_tail_without_terminal() {
        let mut decoder = FrameDecoder::new();
        decoder.push("data: {\"type\":\"thinking\",\"content\":\"A\"}\ndata: {\"type\":\"fin");
        let outcomes = decoder.flush();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_err());
        assert!(!decoder.saw_terminal);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let out = decode_chunks(&["data: {\"type\":\"final\",\"content\":\"crlf\"}\r\n\r\n"]);
        assert_eq!(out, vec![StreamEventRecord::final_record("crlf")]);
    }

    #[test]
    fn records_after_final_are_not_emitted() {
        let out = decode_chunks(&[concat!(
            "data: {\"type\":\"final\",\"content\":\"first\"}\n",
            "data: {\"type\":\"thinking\",\"content\":\"late\"}\n",
            "data: {\"type\":\"final\",\"content\":\"second\"}\n",
        )]);
        assert_eq!(out, vec![StreamEventRecord::final_record("first")]);
    }

    #[test]
    fn is_final_flag_does_not_override_type() {
        let out = decode_chunks(&["data: {\"type\":\"step\",\"content\":\"s\",\"is_final\":true}\n"]);
        assert_eq!(out, vec![StreamEventRecord::new(RecordKind::StatusStep, "s")]);
        assert!(!out[0].is_terminal());
    }
}
