//! Error types shared by every layer of the client.

use thiserror::Error;

pub type TabbyResult<T> = Result<T, TabbyError>;

#[derive(Debug, Error)]
pub enum TabbyError {
    /// Connection refused, DNS failure, reset mid-body and the like.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The client was disposed before or while the operation ran.
    #[error("Request cancelled")]
    Cancelled,
}

impl TabbyError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures where retrying on a fresh session may help.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for TabbyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::HttpStatus {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        Self::Transport(err.to_string())
    }
}

/// Why a single record line could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed payload ({reason}) in line: {line}")]
    MalformedPayload { line: String, reason: String },
}

impl DecodeError {
    /// Builds the error, keeping at most `MAX_LINE_PREVIEW` chars of the line.
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        const MAX_LINE_PREVIEW: usize = 200;
        let line = if line.chars().count() > MAX_LINE_PREVIEW {
            let mut preview: String = line.chars().take(MAX_LINE_PREVIEW).collect();
            preview.push('…');
            preview
        } else {
            line.to_string()
        };
        Self::MalformedPayload {
            line,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_truncates_long_lines() {
        let line = "x".repeat(500);
        let DecodeError::MalformedPayload { line: preview, .. } =
            DecodeError::malformed(&line, "eof");
        assert_eq!(preview.chars().count(), 201);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn connection_failures_are_classified() {
        assert!(TabbyError::transport("refused").is_connection_failure());
        assert!(TabbyError::HttpStatus {
            status: 502,
            body: String::new()
        }
        .is_connection_failure());
        assert!(!TabbyError::Cancelled.is_connection_failure());
        assert!(!TabbyError::config("bad").is_connection_failure());
    }
}
