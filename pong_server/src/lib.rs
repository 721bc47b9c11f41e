// pong_server: stateless HTTP handler for two-player pong sessions.
//
// Every request loads the session it names from a key-value store, applies
// one action, and writes the result back with a fresh TTL. Nothing about a
// game lives in process memory between requests, so any number of handler
// instances can front the same store. The two browsers (or bots) run the
// physics themselves; the server only keeps the shared record consistent.
//
// Module overview:
// - `clock.rs`:    Wall-clock source (`SystemClock`, `ManualClock` for tests).
// - `config.rs`:   Environment-driven `ServerConfig` and `StoreConfig`.
// - `error.rs`:    `GameError`, the single status-code mapping.
// - `store.rs`:    `KvBackend` (Redis or in-memory) and the typed
//                  `SessionStore` on top of it.
// - `session.rs`:  Session operations: create, join, start, reset, update,
//                  read, plus the countdown derivation.
// - `router.rs`:   Method/action dispatch from raw request to `ApiResponse`.
// - `server.rs`:   `tiny_http` listener loop hosting a `Router`.
//
// The binary (`main.rs`) reads the environment, applies CLI overrides, and
// calls `start_server`. Tests embed the server with `MemoryBackend`.

pub mod clock;
pub mod config;
pub mod error;
pub mod router;
pub mod server;
pub mod session;
pub mod store;

use tracing::info;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ServerConfig, StoreConfig};
pub use error::GameError;
pub use router::{ApiResponse, Router};
pub use server::{ServerHandle, start_server};
pub use session::Sessions;
pub use store::{KvBackend, MemoryBackend, RedisBackend, SessionStore, StoreError};

/// Build the production router described by `config`: Redis unless
/// `memory_store` is set, with the system clock.
pub fn build_router(config: &ServerConfig) -> Router<Box<dyn KvBackend>, SystemClock> {
    let backend: Box<dyn KvBackend> = if config.memory_store {
        info!("using in-process session store");
        Box::new(MemoryBackend::new())
    } else {
        info!(addr = %config.store.display_addr(), tls = config.store.tls, "using redis session store");
        Box::new(RedisBackend::new(config.store.clone()))
    };
    let store = SessionStore::new(backend, config.session_ttl);
    Router::new(Sessions::new(store, SystemClock))
}
