// Environment-driven configuration for the pong server.
//
// Deployment platforms hand the handler its settings through environment
// variables, so `ServerConfig::from_env` is the primary entry point. The
// `pong-server` binary then lets command-line flags override a few fields
// (see `main.rs`).
//
// Variables:
//   PONG_BIND                 Listen address (default 127.0.0.1)
//   PONG_PORT                 Listen port (default 8080)
//   PONG_SESSION_TTL_SECS     Idle session lifetime (default 3600)
//   REDIS_HOST                Store host (default 127.0.0.1)
//   REDIS_PORT                Store port (default 6379)
//   REDIS_USERNAME            Optional; absent means no ACL user
//   REDIS_PASSWORD            Optional; absent means unauthenticated
//   REDIS_TLS                 1/true/yes to connect over TLS (default off)
//   REDIS_CONNECT_TIMEOUT_MS  Bound on each connect attempt (default 1500)
//   REDIS_RETRY_SECS          Cool-down before retrying an unavailable
//                             store; 0 disables automatic retry (default 5)
//
// Unparseable values are reported as `ConfigError` rather than silently
// replaced by defaults.

use std::time::Duration;

use pong_protocol::rules::SESSION_TTL_SECS;
use thiserror::Error;
use url::{ParseError, Url};

/// A configuration value that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Connection settings for the backing key-value store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub connect_timeout: Duration,
    /// `None` means an unavailable store stays unavailable until `reset()`.
    pub retry_after: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            username: None,
            password: None,
            tls: false,
            connect_timeout: Duration::from_millis(1500),
            retry_after: Some(Duration::from_secs(5)),
        }
    }
}

impl StoreConfig {
    /// Connection URL in the form the `redis` crate accepts. Credentials are
    /// percent-encoded; the URL is never logged because it may carry them.
    pub fn url(&self) -> Result<Url, ParseError> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{scheme}://{}:{}/", self.host, self.port))?;
        if let Some(user) = &self.username {
            url.set_username(user)
                .map_err(|()| ParseError::SetHostOnCannotBeABaseUrl)?;
        }
        if let Some(pass) = &self.password {
            url.set_password(Some(pass))
                .map_err(|()| ParseError::SetHostOnCannotBeABaseUrl)?;
        }
        Ok(url)
    }

    /// `host:port` for log lines.
    pub fn display_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything the `pong-server` binary needs to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub session_ttl: Duration,
    pub store: StoreConfig,
    /// Use the in-process store instead of connecting to `store`.
    pub memory_store: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            session_ttl: Duration::from_secs(SESSION_TTL_SECS),
            store: StoreConfig::default(),
            memory_store: false,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary lookup function, so tests
    /// don't have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get("PONG_BIND") {
            config.bind = bind;
        }
        if let Some(port) = get("PONG_PORT") {
            config.port = parse("PONG_PORT", &port)?;
        }
        if let Some(ttl) = get("PONG_SESSION_TTL_SECS") {
            let secs: u64 = parse("PONG_SESSION_TTL_SECS", &ttl)?;
            if secs == 0 {
                return Err(ConfigError {
                    name: "PONG_SESSION_TTL_SECS",
                    value: ttl,
                });
            }
            config.session_ttl = Duration::from_secs(secs);
        }

        if let Some(host) = get("REDIS_HOST") {
            config.store.host = host;
        }
        if let Some(port) = get("REDIS_PORT") {
            config.store.port = parse("REDIS_PORT", &port)?;
        }
        config.store.username = get("REDIS_USERNAME");
        config.store.password = get("REDIS_PASSWORD");
        if let Some(tls) = get("REDIS_TLS") {
            config.store.tls = parse_flag("REDIS_TLS", &tls)?;
        }
        if let Some(ms) = get("REDIS_CONNECT_TIMEOUT_MS") {
            config.store.connect_timeout =
                Duration::from_millis(parse("REDIS_CONNECT_TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = get("REDIS_RETRY_SECS") {
            let secs: u64 = parse("REDIS_RETRY_SECS", &secs)?;
            config.store.retry_after = (secs > 0).then_some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        name,
        value: value.into(),
    })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            name,
            value: value.into(),
        }),
    }
}
