// Failure taxonomy for the request handler.
//
// Every operation in `session.rs` and every step of `router.rs` returns
// `GameError`. The router turns it into a status code and an `ErrorReply`
// in exactly one place (`GameError::reply`), so the mapping below is the
// whole contract:
//
//   StoreUnavailable  503  {success:false, error, detail}
//   SessionNotFound   404  expected: the session expired or never existed
//   InvalidAction     400  unknown or missing `action`
//   InvalidRequest    400  unparseable body or missing `sessionId`
//   MethodNotAllowed  405
//   Unhandled         500  generic message; the detail is logged, not sent

use pong_protocol::message::ErrorReply;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("invalid action: {0:?}")]
    InvalidAction(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("unhandled failure: {0}")]
    Unhandled(String),
}

impl GameError {
    pub fn status(&self) -> u16 {
        match self {
            GameError::StoreUnavailable(_) => 503,
            GameError::SessionNotFound(_) => 404,
            GameError::InvalidAction(_) | GameError::InvalidRequest(_) => 400,
            GameError::MethodNotAllowed(_) => 405,
            GameError::Unhandled(_) => 500,
        }
    }

    /// The body sent to the client. Only store outages carry a detail.
    pub fn reply(&self) -> ErrorReply {
        match self {
            GameError::StoreUnavailable(detail) => {
                ErrorReply::with_detail("Session store unavailable", detail.clone())
            }
            GameError::SessionNotFound(_) => ErrorReply::new("Session not found"),
            GameError::InvalidAction(_) => ErrorReply::new("Invalid action"),
            GameError::InvalidRequest(reason) => ErrorReply::new(reason.clone()),
            GameError::MethodNotAllowed(_) => ErrorReply::new("Method not allowed"),
            GameError::Unhandled(_) => ErrorReply::new("Internal server error"),
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => GameError::StoreUnavailable(detail),
            other => GameError::Unhandled(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhandled_does_not_leak_detail() {
        let err = GameError::Unhandled("stored JSON truncated at byte 17".into());
        assert_eq!(err.status(), 500);
        let reply = err.reply();
        assert_eq!(reply.error, "Internal server error");
        assert_eq!(reply.detail, None);
    }

    #[test]
    fn store_outage_carries_detail() {
        let err = GameError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(err.status(), 503);
        assert_eq!(err.reply().detail.as_deref(), Some("connection refused"));
        assert!(!err.reply().success);
    }

    #[test]
    fn corrupt_store_entry_is_unhandled() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = GameError::from(StoreError::Corrupt {
            key: "pong:session:x".into(),
            source: json_err,
        });
        assert_eq!(err.status(), 500);
    }
}
