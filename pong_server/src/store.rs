// Session Store Client: typed access to the shared key-value store.
//
// Two layers:
// - `KvBackend` is the raw contract: string values with an expiry, plus a
//   `ping` used to probe availability. `RedisBackend` talks to a real store;
//   `MemoryBackend` keeps everything in-process for tests and local play.
// - `SessionStore` sits on top and speaks `Session`: JSON encoding, the
//   `pong:session:` key prefix, the time-to-live refreshed on every write,
//   and the `lastUpdate` stamp.
//
// "Store unavailable" and "session not found" are deliberately different
// shapes: the former is `Err(StoreError::Unavailable)`, the latter is
// `Ok(None)`. The router maps them to 503 and 404 respectively.
//
// `RedisBackend` connection lifecycle: the first call connects (bounded by
// `StoreConfig::connect_timeout`) and the connection is cached behind a
// `Mutex` for the life of the process. A failed connect, failed AUTH, or an
// I/O error on the cached connection moves the backend to `Unavailable`.
// While unavailable every call fails immediately with the recorded detail.
// The next call after `retry_after` has elapsed (or after `reset()`) tries
// to connect again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use pong_protocol::session::Session;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;

/// Prefix for every session key in the store.
pub const KEY_PREFIX: &str = "pong:session:";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached, refused authentication, or dropped
    /// the connection.
    #[error("{0}")]
    Unavailable(String),
    /// A stored value did not decode as a `Session`.
    #[error("corrupt entry at {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode session: {0}")]
    Encode(serde_json::Error),
}

/// Raw string store with per-key expiry.
pub trait KvBackend: Send + Sync {
    /// Check that the store is reachable, connecting if necessary.
    fn ping(&self) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Write `value` and (re)set its expiry to `ttl` from now.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<B: KvBackend + ?Sized> KvBackend for Box<B> {
    fn ping(&self) -> Result<(), StoreError> {
        (**self).ping()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).set_ex(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

enum Link {
    Idle,
    Connected(redis::Connection),
    Unavailable { detail: String, since: Instant },
}

/// Backend for a Redis-compatible store, connected lazily.
pub struct RedisBackend {
    config: StoreConfig,
    link: Mutex<Link>,
}

impl RedisBackend {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            link: Mutex::new(Link::Idle),
        }
    }

    /// Forget any cached connection or recorded outage. The next call
    /// connects from scratch.
    pub fn reset(&self) {
        *self.lock() = Link::Idle;
    }

    /// Whether the backend currently holds an open connection.
    pub fn is_connected(&self) -> bool {
        matches!(*self.lock(), Link::Connected(_))
    }

    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connect(&self) -> Result<redis::Connection, String> {
        let addr = self.config.display_addr();
        let url = self
            .config
            .url()
            .map_err(|e| format!("invalid store address {addr}: {e}"))?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| format!("invalid store address {addr}: {e}"))?;
        let conn = client
            .get_connection_with_timeout(self.config.connect_timeout)
            .map_err(|e| format!("cannot connect to store at {addr}: {e}"))?;
        conn.set_read_timeout(Some(self.config.connect_timeout))
            .and_then(|()| conn.set_write_timeout(Some(self.config.connect_timeout)))
            .map_err(|e| format!("cannot configure store connection to {addr}: {e}"))?;
        Ok(conn)
    }

    /// Run `op` on the cached connection, connecting first if needed.
    fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    {
        let mut link = self.lock();

        if let Link::Unavailable { detail, since } = &*link {
            let retry_due = self
                .config
                .retry_after
                .is_some_and(|cool_down| since.elapsed() >= cool_down);
            if !retry_due {
                return Err(StoreError::Unavailable(detail.clone()));
            }
            debug!("retrying unavailable store");
            *link = Link::Idle;
        }

        if matches!(*link, Link::Idle) {
            match self.connect() {
                Ok(conn) => {
                    info!(addr = %self.config.display_addr(), tls = self.config.tls, "connected to session store");
                    *link = Link::Connected(conn);
                }
                Err(detail) => {
                    warn!(%detail, "session store unavailable");
                    *link = Link::Unavailable {
                        detail: detail.clone(),
                        since: Instant::now(),
                    };
                    return Err(StoreError::Unavailable(detail));
                }
            }
        }

        let result = match &mut *link {
            Link::Connected(conn) => op(conn),
            _ => {
                return Err(StoreError::Unavailable(
                    "store connection not established".into(),
                ));
            }
        };

        result.map_err(|e| {
            let detail = format!("store command failed: {e}");
            if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                warn!(%detail, "session store connection lost");
                *link = Link::Unavailable {
                    detail: detail.clone(),
                    since: Instant::now(),
                };
            }
            StoreError::Unavailable(detail)
        })
    }
}

impl KvBackend for RedisBackend {
    fn ping(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| redis::cmd("PING").query::<String>(conn))
            .map(|_| ())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_connection(|conn| redis::cmd("GET").arg(key).query::<Option<String>>(conn))
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let secs = ttl.as_secs().max(1);
        self.with_connection(|conn| {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(secs)
                .query::<()>(conn)
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_connection(|conn| redis::cmd("DEL").arg(key).query::<()>(conn))
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

struct MemoryInner {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    available: AtomicBool,
}

/// In-process backend. Clones share the same entries, so a test can keep a
/// handle to flip availability after handing the backend to a router.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                entries: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".into(),
            ))
        }
    }
}

impl KvBackend for MemoryBackend {
    fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let now = Instant::now();
        let mut entries = self.entries();
        if matches!(entries.get(key), Some((_, expires)) if *expires <= now) {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.entries()
            .insert(key.to_owned(), (value.to_owned(), Instant::now() + ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Typed wrapper
// ---------------------------------------------------------------------------

/// `Session`-typed view of a `KvBackend`.
pub struct SessionStore<B> {
    backend: B,
    ttl: Duration,
}

impl<B: KvBackend> SessionStore<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store key for a session id.
    pub fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    /// Check that the store is reachable.
    pub fn probe(&self) -> Result<(), StoreError> {
        self.backend.ping()
    }

    /// Load a session. `Ok(None)` means it expired or never existed.
    pub fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let key = Self::key(id);
        match self.backend.get(&key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt { key, source }),
        }
    }

    /// Stamp `lastUpdate`, write the session, and refresh its expiry.
    pub fn set(&self, id: &str, session: &mut Session, now_ms: u64) -> Result<(), StoreError> {
        session.last_update = now_ms;
        let raw = serde_json::to_string(session).map_err(StoreError::Encode)?;
        self.backend.set_ex(&Self::key(id), &raw, self.ttl)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.backend.delete(&Self::key(id))
    }
}
