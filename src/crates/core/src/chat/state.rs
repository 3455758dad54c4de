use tokio_util::sync::CancellationToken;

/// Whether a request is in flight. The token exists only while streaming.
#[derive(Debug, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Streaming { cancel: CancellationToken },
}

impl RequestState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Moves to `Streaming` and hands out the new token, or returns `None`
    /// when a request is already outstanding.
    pub fn begin(&mut self) -> Option<CancellationToken> {
        if self.is_streaming() {
            return None;
        }
        let cancel = CancellationToken::new();
        *self = Self::Streaming {
            cancel: cancel.clone(),
        };
        Some(cancel)
    }

    /// Fires the current token. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match self {
            Self::Idle => false,
            Self::Streaming { cancel } => {
                cancel.cancel();
                true
            }
        }
    }

    pub fn finish(&mut self) {
        *self = Self::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_rejected_while_streaming() {
        let mut state = RequestState::default();
        let token = state.begin().expect("idle state accepts a request");
        assert!(state.is_streaming());
        assert!(state.begin().is_none());

        assert!(state.cancel());
        assert!(state.cancel());
        assert!(token.is_cancelled());

        state.finish();
        assert!(!state.is_streaming());
        assert!(!state.cancel());
    }
}
