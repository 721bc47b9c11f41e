// Request actions and reply bodies for the pong HTTP surface.
//
// A request names its operation with the `action` query parameter and
// carries a JSON body. Every reply is a JSON object with a `success` flag;
// failures add `error` (and `detail` for store outages). The structs here
// are used by the server to render replies and by the client to parse them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::{Session, SessionPatch};

/// The six operations a client can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Join,
    Start,
    Reset,
    Update,
    State,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Join,
        Action::Start,
        Action::Reset,
        Action::Update,
        Action::State,
    ];

    /// Parse the `action` query parameter. Matching is exact.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == token)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Join => "join",
            Action::Start => "start",
            Action::Reset => "reset",
            Action::Update => "update",
            Action::State => "state",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `join`, `start`, `reset`, and `state`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

/// Body of `update`: the session id plus the patch fields, flattened.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub patch: SessionPatch,
}

/// Reply to `create`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReply {
    pub success: bool,
    pub session_id: String,
}

/// Reply to `join`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReply {
    pub success: bool,
    pub p2_connected: bool,
}

/// Reply to `start`, `reset`, and `update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// Reply to `state`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateReply {
    pub success: bool,
    pub state: Session,
}

/// Reply for every failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            detail: None,
        }
    }

    pub fn with_detail(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerSlot;

    #[test]
    fn action_tokens_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("delete"), None);
        assert_eq!(Action::parse("CREATE"), None);
        assert_eq!(Action::parse(""), None);
    }

    #[test]
    fn update_request_flattens_patch() {
        let req = UpdateRequest {
            session_id: "abc123".into(),
            patch: SessionPatch::paddle(PlayerSlot::Two, 150.0),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sessionId": "abc123", "player": 2, "paddleY": 150.0})
        );
    }

    #[test]
    fn error_reply_omits_missing_detail() {
        let json = serde_json::to_value(ErrorReply::new("Session not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Session not found"})
        );

        let json =
            serde_json::to_value(ErrorReply::with_detail("Store unavailable", "refused")).unwrap();
        assert_eq!(json["detail"], "refused");
    }

    #[test]
    fn join_reply_field_names() {
        let json = serde_json::to_value(JoinReply {
            success: true,
            p2_connected: true,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "p2Connected": true}));
    }
}
