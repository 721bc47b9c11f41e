// Blocking HTTP client for the pong request handler.
//
// One method per action. Each call POSTs `?action=<name>` with a JSON body
// and decodes the typed reply from `pong_protocol::message`. A non-2xx reply
// becomes `ClientError::Status` carrying the server's `error` text (plus its
// `detail` for store outages), so callers can tell "session gone" (404) from
// "store down" (503) without parsing bodies themselves.
//
// The underlying `reqwest::blocking::Client` keeps connections alive, which
// matters when a bot polls every few milliseconds.

use std::time::Duration;

use pong_protocol::message::{
    Ack, Action, CreateReply, ErrorReply, JoinReply, SessionRef, StateReply, UpdateRequest,
};
use pong_protocol::{Session, SessionPatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::trace;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("match did not finish within {0:?}")]
    TimedOut(Duration),
}

impl ClientError {
    /// Failures worth riding out during a match: the network blinked or the
    /// store is briefly unavailable.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status == 503,
            ClientError::Decode(_) | ClientError::TimedOut(_) => false,
        }
    }
}

/// Client for one pong server.
pub struct ApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the handler's address, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a match; the caller becomes player one.
    pub fn create(&self) -> Result<String, ClientError> {
        let reply: CreateReply = self.call(Action::Create, &serde_json::json!({}))?;
        Ok(reply.session_id)
    }

    /// Join a match as player two. Returns the server's `p2Connected`.
    pub fn join(&self, session_id: &str) -> Result<bool, ClientError> {
        let reply: JoinReply = self.call(Action::Join, &session_ref(session_id))?;
        Ok(reply.p2_connected)
    }

    pub fn start(&self, session_id: &str) -> Result<(), ClientError> {
        self.call::<_, Ack>(Action::Start, &session_ref(session_id))
            .map(drop)
    }

    pub fn reset(&self, session_id: &str) -> Result<(), ClientError> {
        self.call::<_, Ack>(Action::Reset, &session_ref(session_id))
            .map(drop)
    }

    pub fn update(&self, session_id: &str, patch: SessionPatch) -> Result<(), ClientError> {
        let body = UpdateRequest {
            session_id: session_id.to_owned(),
            patch,
        };
        self.call::<_, Ack>(Action::Update, &body).map(drop)
    }

    pub fn state(&self, session_id: &str) -> Result<Session, ClientError> {
        let reply: StateReply = self.call(Action::State, &session_ref(session_id))?;
        Ok(reply.state)
    }

    fn call<B: Serialize, R: DeserializeOwned>(
        &self,
        action: Action,
        body: &B,
    ) -> Result<R, ClientError> {
        let url = format!("{}/?action={action}", self.base_url);
        let response = self.http.post(&url).json(body).send()?;
        let status = response.status();
        let bytes = response.bytes()?;
        trace!(%action, status = status.as_u16(), len = bytes.len(), "reply");

        if !status.is_success() {
            let message = match serde_json::from_slice::<ErrorReply>(&bytes) {
                Ok(ErrorReply {
                    error,
                    detail: Some(detail),
                    ..
                }) => format!("{error}: {detail}"),
                Ok(reply) => reply.error,
                Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
            };
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn session_ref(session_id: &str) -> SessionRef {
    SessionRef {
        session_id: session_id.to_owned(),
    }
}
