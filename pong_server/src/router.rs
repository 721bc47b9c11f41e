// Request Router: one HTTP request in, one normalized response out.
//
// The router is platform-agnostic. Whatever hosts it (the `tiny_http` loop
// in `server.rs`, or a cloud function adapter) passes the method, the URL
// (path plus query string), and the raw body, and writes back the returned
// status, headers, and body. Nothing here touches sockets.
//
// Dispatch:
// - `GET` with no `action`           → the HTML client page.
// - `GET ?action=state&sessionId=…`  → read-only polling convenience.
// - `POST ?action=<action>`          → one of the six `Action`s.
// - anything else                    → 405.
//
// Before any action runs, the store is probed. If it is unreachable every
// action, `create` included, gets the same 503 body. All other failures are
// `GameError`s rendered by `GameError::reply`; `Unhandled` details are
// logged here and never sent to the client.

use std::time::Instant;

use pong_protocol::message::{Ack, Action, CreateReply, JoinReply, StateReply};
use pong_protocol::session::SessionPatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use crate::clock::Clock;
use crate::error::GameError;
use crate::session::Sessions;
use crate::store::KvBackend;

/// The browser client, served on a plain `GET`.
pub const CLIENT_PAGE: &str = include_str!("../assets/index.html");

/// A response ready to be written by whatever hosts the router.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type".into(), content_type.into()),
                ("Access-Control-Allow-Origin".into(), "*".into()),
                ("Cache-Control".into(), "no-store".into()),
            ],
            body,
        }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, GameError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| GameError::Unhandled(format!("failed to encode reply: {e}")))?;
        Ok(Self::new(status, "application/json", body))
    }

    /// Value of the first header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Maps requests onto the session state machine.
pub struct Router<B, C> {
    sessions: Sessions<B, C>,
}

impl<B: KvBackend, C: Clock> Router<B, C> {
    pub fn new(sessions: Sessions<B, C>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Sessions<B, C> {
        &self.sessions
    }

    /// Handle one request. Never panics on client input; every failure is
    /// turned into an error response.
    pub fn handle(&self, method: &str, url: &str, body: &[u8]) -> ApiResponse {
        let started = Instant::now();
        let action = query_param(url, "action");
        let response = self
            .route(method, url, action.as_deref(), body)
            .unwrap_or_else(|err| error_response(&err));
        debug!(
            method,
            action = action.as_deref().unwrap_or("-"),
            status = response.status,
            elapsed_us = started.elapsed().as_micros() as u64,
            "request handled"
        );
        response
    }

    fn route(
        &self,
        method: &str,
        url: &str,
        action: Option<&str>,
        body: &[u8],
    ) -> Result<ApiResponse, GameError> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => match action {
                None => Ok(ApiResponse::new(
                    200,
                    "text/html; charset=utf-8",
                    CLIENT_PAGE.as_bytes().to_vec(),
                )),
                Some(token) if Action::parse(token) == Some(Action::State) => {
                    self.dispatch(Action::State, url, body)
                }
                Some(_) => Err(GameError::MethodNotAllowed("GET".into())),
            },
            "POST" => {
                let token = action.unwrap_or_default();
                let action = Action::parse(token)
                    .ok_or_else(|| GameError::InvalidAction(token.to_owned()))?;
                self.dispatch(action, url, body)
            }
            other => Err(GameError::MethodNotAllowed(other.to_owned())),
        }
    }

    fn dispatch(&self, action: Action, url: &str, body: &[u8]) -> Result<ApiResponse, GameError> {
        self.sessions.probe()?;
        let body = parse_body(body)?;
        let id = || session_id(&body, url);

        match action {
            Action::Create => {
                let session_id = self.sessions.create()?;
                ApiResponse::json(
                    200,
                    &CreateReply {
                        success: true,
                        session_id,
                    },
                )
            }
            Action::Join => {
                let p2_connected = self.sessions.join(&id()?)?;
                ApiResponse::json(
                    200,
                    &JoinReply {
                        success: true,
                        p2_connected,
                    },
                )
            }
            Action::Start => {
                self.sessions.start(&id()?)?;
                ApiResponse::json(200, &Ack { success: true })
            }
            Action::Reset => {
                self.sessions.reset(&id()?)?;
                ApiResponse::json(200, &Ack { success: true })
            }
            Action::Update => {
                let id = id()?;
                let patch = SessionPatch::deserialize(&body)
                    .map_err(|e| GameError::InvalidRequest(format!("Invalid update: {e}")))?;
                self.sessions.update(&id, &patch)?;
                ApiResponse::json(200, &Ack { success: true })
            }
            Action::State => {
                let state = self.sessions.read(&id()?)?;
                ApiResponse::json(
                    200,
                    &StateReply {
                        success: true,
                        state,
                    },
                )
            }
        }
    }
}

fn error_response(err: &GameError) -> ApiResponse {
    match err {
        GameError::Unhandled(detail) => error!(%detail, "unhandled failure"),
        GameError::StoreUnavailable(detail) => warn!(%detail, "rejecting request, store unavailable"),
        other => debug!(error = %other, "request rejected"),
    }
    let body = serde_json::to_vec(&err.reply()).unwrap_or_else(|_| {
        br#"{"success":false,"error":"Internal server error"}"#.to_vec()
    });
    ApiResponse::new(err.status(), "application/json", body)
}

/// An empty body counts as `{}`; anything else must be a JSON object.
fn parse_body(body: &[u8]) -> Result<Value, GameError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GameError::InvalidRequest(format!("Invalid JSON body: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(GameError::InvalidRequest(
            "Request body must be a JSON object".into(),
        ))
    }
}

/// `sessionId` from the body, or from the query string for `GET` polling.
fn session_id(body: &Value, url: &str) -> Result<String, GameError> {
    body.get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| query_param(url, "sessionId"))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GameError::InvalidRequest("Missing sessionId".into()))
}

/// First value of `name` in the URL's query string, percent-decoded.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pong_protocol::message::ErrorReply;
    use pong_protocol::session::Session;
    use pong_protocol::types::PlayerSlot;
    use serde::de::DeserializeOwned;
    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryBackend, SessionStore};

    const T0: u64 = 1_700_000_000_000;

    struct Harness {
        router: Router<MemoryBackend, ManualClock>,
        backend: MemoryBackend,
        clock: ManualClock,
    }

    impl Harness {
        fn new() -> Self {
            let backend = MemoryBackend::new();
            let clock = ManualClock::new(T0);
            let store = SessionStore::new(backend.clone(), Duration::from_secs(3600));
            Self {
                router: Router::new(Sessions::new(store, clock.clone())),
                backend,
                clock,
            }
        }

        fn post(&self, action: &str, body: Value) -> ApiResponse {
            let body = serde_json::to_vec(&body).unwrap();
            self.router
                .handle("POST", &format!("/?action={action}"), &body)
        }

        fn create(&self) -> String {
            let resp = self.post("create", json!({}));
            assert_eq!(resp.status, 200);
            parse::<CreateReply>(&resp).session_id
        }

        fn state(&self, id: &str) -> Session {
            let resp = self.post("state", json!({ "sessionId": id }));
            assert_eq!(resp.status, 200);
            parse::<StateReply>(&resp).state
        }
    }

    fn parse<T: DeserializeOwned>(resp: &ApiResponse) -> T {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn get_without_action_serves_client_page() {
        let h = Harness::new();
        let resp = h.router.handle("GET", "/", b"");
        assert_eq!(resp.status, 200);
        assert!(resp.header("content-type").unwrap().starts_with("text/html"));
        assert!(String::from_utf8(resp.body).unwrap().contains("<canvas"));
    }

    #[test]
    fn create_reply_shape() {
        let h = Harness::new();
        let resp = h.post("create", json!({}));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
        let body: Value = parse(&resp);
        assert_eq!(body["success"], true);
        assert!(body["sessionId"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn create_accepts_empty_body() {
        let h = Harness::new();
        let resp = h.router.handle("POST", "/?action=create", b"");
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn created_session_reads_back_initial() {
        let h = Harness::new();
        let id = h.create();
        let state = h.state(&id);
        assert!(!state.game_started);
        assert_eq!(state.winner, None);
        assert_eq!((state.p1_score, state.p2_score), (0, 0));
        assert_eq!((state.ball_x, state.ball_y), (400.0, 200.0));
    }

    #[test]
    fn join_twice_reports_connected() {
        let h = Harness::new();
        let id = h.create();
        for _ in 0..2 {
            let resp = h.post("join", json!({ "sessionId": id }));
            assert_eq!(resp.status, 200);
            let reply: JoinReply = parse(&resp);
            assert!(reply.success);
            assert!(reply.p2_connected);
        }
    }

    #[test]
    fn unknown_session_is_404() {
        let h = Harness::new();
        for action in ["join", "start", "reset", "update", "state"] {
            let resp = h.post(action, json!({ "sessionId": "nosuchsession" }));
            assert_eq!(resp.status, 404, "action {action}");
            let reply: ErrorReply = parse(&resp);
            assert!(!reply.success);
            assert_eq!(reply.error, "Session not found");
        }
    }

    #[test]
    fn invalid_or_missing_action_is_400() {
        let h = Harness::new();
        let resp = h.post("explode", json!({}));
        assert_eq!(resp.status, 400);
        assert_eq!(parse::<ErrorReply>(&resp).error, "Invalid action");

        let resp = h.router.handle("POST", "/", b"{}");
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn missing_session_id_is_400() {
        let h = Harness::new();
        let resp = h.post("join", json!({}));
        assert_eq!(resp.status, 400);
        assert_eq!(parse::<ErrorReply>(&resp).error, "Missing sessionId");
    }

    #[test]
    fn malformed_body_is_400() {
        let h = Harness::new();
        let resp = h.router.handle("POST", "/?action=state", b"{\"sessionId\":");
        assert_eq!(resp.status, 400);
        let resp = h.router.handle("POST", "/?action=state", b"[1,2]");
        assert_eq!(resp.status, 400);

        let id = h.create();
        let resp = h.post("update", json!({ "sessionId": id, "player": 7, "paddleY": 1 }));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn other_methods_are_405() {
        let h = Harness::new();
        for method in ["PUT", "DELETE", "PATCH", "OPTIONS"] {
            let resp = h.router.handle(method, "/?action=create", b"{}");
            assert_eq!(resp.status, 405, "method {method}");
        }
        let resp = h.router.handle("GET", "/?action=create", b"");
        assert_eq!(resp.status, 405);
    }

    #[test]
    fn get_state_with_query_session_id() {
        let h = Harness::new();
        let id = h.create();
        let resp = h
            .router
            .handle("GET", &format!("/?action=state&sessionId={id}"), b"");
        assert_eq!(resp.status, 200);
        assert!(parse::<StateReply>(&resp).success);
    }

    #[test]
    fn paddle_update_round_trips() {
        let h = Harness::new();
        let id = h.create();
        let before = h.state(&id);
        let resp = h.post(
            "update",
            json!({ "sessionId": id, "player": 2, "paddleY": 150 }),
        );
        assert_eq!(resp.status, 200);
        assert_eq!(parse::<Ack>(&resp), Ack { success: true });

        let after = h.state(&id);
        assert_eq!(after, Session { p2_y: 150.0, ..before });
    }

    #[test]
    fn countdown_scenario_over_http() {
        let h = Harness::new();
        let id = h.create();
        assert_eq!(h.post("join", json!({ "sessionId": id })).status, 200);
        assert_eq!(h.post("start", json!({ "sessionId": id })).status, 200);

        h.clock.advance(Duration::from_secs(3));
        let state = h.state(&id);
        assert!(!state.countdown_active);
        assert_eq!(state.countdown_value, 0);
        assert!(state.ready_to_start);

        let resp = h.post(
            "update",
            json!({ "sessionId": id, "readyToStart": false, "gameStarted": true }),
        );
        assert_eq!(resp.status, 200);
        let state = h.state(&id);
        assert!(state.game_started);
        assert!(!state.ready_to_start);
    }

    #[test]
    fn reset_over_http_rearms_countdown() {
        let h = Harness::new();
        let id = h.create();
        h.post(
            "update",
            json!({ "sessionId": id, "ballX": 900, "p1Score": 3, "winner": 1 }),
        );
        assert_eq!(h.state(&id).winner, Some(PlayerSlot::One));

        assert_eq!(h.post("reset", json!({ "sessionId": id })).status, 200);
        let state = h.state(&id);
        assert_eq!(state.ball_x, 400.0);
        assert_eq!(state.p1_score, 0);
        assert_eq!(state.winner, None);
        assert!(state.countdown_active);
        assert_eq!(state.countdown_value, 3);
    }

    #[test]
    fn unavailable_store_is_503_for_every_action() {
        let h = Harness::new();
        let id = h.create();
        h.backend.set_available(false);

        for action in Action::ALL {
            let resp = h.post(action.as_str(), json!({ "sessionId": id, "player": 1, "paddleY": 5 }));
            assert_eq!(resp.status, 503, "action {action}");
            let reply: ErrorReply = parse(&resp);
            assert!(!reply.success);
            assert!(reply.detail.is_some());
        }
        let resp = h
            .router
            .handle("GET", &format!("/?action=state&sessionId={id}"), b"");
        assert_eq!(resp.status, 503);

        h.backend.set_available(true);
        assert_eq!(h.post("state", json!({ "sessionId": id })).status, 200);
    }

    #[test]
    fn corrupt_session_is_generic_500() {
        let h = Harness::new();
        crate::store::KvBackend::set_ex(
            &h.backend,
            "pong:session:broken",
            "{\"ballX\": \"oops\"}",
            Duration::from_secs(60),
        )
        .unwrap();
        let resp = h.post("state", json!({ "sessionId": "broken" }));
        assert_eq!(resp.status, 500);
        let reply: ErrorReply = parse(&resp);
        assert_eq!(reply.error, "Internal server error");
        assert_eq!(reply.detail, None);
    }

    #[test]
    fn query_param_parsing() {
        assert_eq!(query_param("/?action=state", "action").as_deref(), Some("state"));
        assert_eq!(
            query_param("/api?x=1&action=join&action=state", "action").as_deref(),
            Some("join")
        );
        assert_eq!(query_param("/?sessionId=a%2Bb+c", "sessionId").as_deref(), Some("a+b c"));
        assert_eq!(query_param("/?flag", "flag").as_deref(), Some(""));
        assert_eq!(query_param("/", "action"), None);
        assert_eq!(query_param("/?bad=%zz", "bad").as_deref(), Some("%zz"));
        assert_eq!(query_param("/?trail=%4", "trail").as_deref(), Some("%4"));
    }
}
