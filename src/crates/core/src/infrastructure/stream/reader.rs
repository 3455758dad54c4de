//! Pulls body chunks for one request, honouring cancellation and the idle
//! timeout at every suspension point.

use super::utf8::Utf8ChunkDecoder;
use crate::infrastructure::transport::ByteStream;
use crate::util::errors::TabbyError;
use futures::StreamExt;
use log::{debug, error, trace};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum ReadOutcome {
    /// Decoded text of the next chunk (may be empty while a multi-byte
    /// sequence is incomplete).
    Text(String),
    /// The body ended; carries text flushed from the UTF-8 decoder.
    Closed(String),
    Cancelled,
    Failed(TabbyError),
}

pub struct FragmentReader {
    stream: ByteStream,
    utf8: Utf8ChunkDecoder,
    cancel: CancellationToken,
    idle_timeout: Duration,
    finished: bool,
}

impl FragmentReader {
    pub fn new(stream: ByteStream, cancel: CancellationToken, idle_timeout: Duration) -> Self {
        Self {
            stream,
            utf8: Utf8ChunkDecoder::new(),
            cancel,
            idle_timeout,
            finished: false,
        }
    }

    /// Reads the next chunk. Once a terminal outcome (`Closed`, `Cancelled`,
    /// `Failed`) was returned, no further read is attempted.
    pub async fn next(&mut self) -> ReadOutcome {
        if self.finished {
            return ReadOutcome::Closed(String::new());
        }
        if self.cancel.is_cancelled() {
            debug!("Cancellation observed before next read");
            self.finished = true;
            return ReadOutcome::Cancelled;
        }

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Cancellation observed while waiting for next chunk");
                ReadOutcome::Cancelled
            }
            next = timeout(self.idle_timeout, self.stream.next()) => match next {
                Ok(Some(Ok(bytes))) => {
                    trace!("Stream chunk: {} bytes", bytes.len());
                    return ReadOutcome::Text(self.utf8.decode(&bytes));
                }
                Ok(None) => {
                    if self.utf8.has_pending() {
                        debug!("Stream closed inside a multi-byte sequence");
                    }
                    ReadOutcome::Closed(self.utf8.finish())
                }
                Ok(Some(Err(e))) => {
                    error!("Stream read error: {}", e);
                    ReadOutcome::Failed(e)
                }
                Err(_) => {
                    let error_msg = format!(
                        "no data received for {}s",
                        self.idle_timeout.as_secs()
                    );
                    error!("Stream idle timeout: {}", error_msg);
                    ReadOutcome::Failed(TabbyError::timeout(error_msg))
                }
            },
        };
        self.finished = true;
        outcome
    }
}
