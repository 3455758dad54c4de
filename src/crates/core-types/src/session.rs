use serde::{Deserialize, Serialize};

/// Body of `GET /session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub thread_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_body() {
        let body = r#"{"thread_id":"chat_session_42"}"#;
        let parsed: SessionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.thread_id, "chat_session_42");
    }

    #[test]
    fn rejects_body_without_thread_id() {
        assert!(serde_json::from_str::<SessionResponse>("{}").is_err());
    }
}
