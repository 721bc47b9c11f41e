// Test harness for end-to-end pong tests.
//
// `TestServer` runs the real `tiny_http` loop with an in-process store and
// the system clock on a random port. `TestPeer` pairs a real `ApiClient`
// with a real `ClientGame` and exposes the runner's two halves (publish and
// poll) as separate blocking calls, so a test can step both peers in
// lockstep and inspect state in between.
//
// `FlakyBackend` wraps the in-process store and turns one chosen
// countdown-arming write into a store outage, so tests can check that peers
// ride out a 503 on `start` or `reset`.
//
// Nothing here reimplements protocol logic; the only test-specific code is
// the polling-with-timeout wrapper and the fault injection.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use pong_client::{ApiClient, ClientGame, GameEvent};
use pong_prng::GameRng;
use pong_protocol::PlayerSlot;
use pong_server::{
    KvBackend, MemoryBackend, Router, ServerHandle, SessionStore, Sessions, StoreError,
    SystemClock, start_server,
};

/// Default timeout for blocking poll loops. Covers the 3 s countdown.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A server on a random loopback port, stopped on drop.
pub struct TestServer {
    handle: Option<ServerHandle>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub fn start() -> Self {
        Self::with_backend(MemoryBackend::new())
    }

    /// Serve sessions out of `backend` instead of a fresh in-process store.
    pub fn with_backend<B: KvBackend + 'static>(backend: B) -> Self {
        let store = SessionStore::new(backend, Duration::from_secs(3600));
        let router = Router::new(Sessions::new(store, SystemClock));
        let (handle, addr) =
            start_server("127.0.0.1", 0, router).expect("failed to start test server");
        Self {
            handle: Some(handle),
            addr,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

/// In-process store that rejects the `nth` write arming a countdown
/// (`countdownActive` going from false to true), once. Clones share counters.
#[derive(Clone)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    fail_on: u32,
    arming_writes: Arc<AtomicU32>,
    failures: Arc<AtomicU32>,
}

impl FlakyBackend {
    /// `nth` counts from 1: the first `start` of a session is write 1, the
    /// first `reset` after it write 2.
    pub fn failing_arming_write(nth: u32) -> Self {
        Self {
            inner: MemoryBackend::new(),
            fail_on: nth,
            arming_writes: Arc::new(AtomicU32::new(0)),
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Writes rejected so far.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

fn countdown_active(value: &str) -> bool {
    value.contains(r#""countdownActive":true"#)
}

impl KvBackend for FlakyBackend {
    fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let was_active = self.inner.get(key)?.is_some_and(|old| countdown_active(&old));
        if countdown_active(value) && !was_active {
            let seen = self.arming_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if seen == self.fail_on {
                self.failures.fetch_add(1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("injected write failure".into()));
            }
        }
        self.inner.set_ex(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}

/// One peer stepped by hand.
pub struct TestPeer {
    pub api: ApiClient,
    pub game: ClientGame,
}

impl TestPeer {
    /// Create a match as player one.
    pub fn host(url: &str) -> Self {
        let api = ApiClient::new(url).expect("client build failed");
        let id = api.create().expect("create failed");
        let mut game = ClientGame::new(PlayerSlot::One, GameRng::new(11));
        game.enter_session(id);
        Self { api, game }
    }

    /// Join `session_id` as player two.
    pub fn join(url: &str, session_id: &str) -> Self {
        let api = ApiClient::new(url).expect("client build failed");
        assert!(api.join(session_id).expect("join failed"));
        let mut game = ClientGame::new(PlayerSlot::Two, GameRng::new(22));
        game.enter_session(session_id);
        Self { api, game }
    }

    pub fn session_id(&self) -> String {
        self.game
            .session_id()
            .expect("peer has no session")
            .to_owned()
    }

    /// Send this peer's patch for the current tick.
    pub fn publish(&mut self) {
        let id = self.session_id();
        if let Some(patch) = self.game.publish_patch() {
            self.api.update(&id, patch).expect("update failed");
        }
    }

    /// Poll once and reconcile.
    pub fn poll(&mut self) -> Vec<GameEvent> {
        let state = self.api.state(&self.session_id()).expect("state failed");
        self.game.reconcile(&state)
    }

    /// Poll until `done` holds, collecting every event seen on the way.
    pub fn poll_until(&mut self, what: &str, done: impl Fn(&ClientGame) -> bool) -> Vec<GameEvent> {
        let start = Instant::now();
        let mut events = Vec::new();
        loop {
            events.extend(self.poll());
            if done(&self.game) {
                return events;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }
}
