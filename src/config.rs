//! Relay configuration, read from the environment

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,
    /// Frames that may wait in one participant's outbound queue
    pub outbound_capacity: usize,
    /// Upper bound for a single socket write
    pub send_timeout: Duration,
    /// How often the server pings each connection
    pub ping_interval: Duration,
    /// How long a ping may go unanswered before the peer is dropped
    pub pong_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            outbound_capacity: 64,
            send_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables.
    /// Unset variables keep their default; unparsable or zero values are
    /// logged and replaced by the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("CHAT_BIND_ADDR", defaults.bind_addr),
            outbound_capacity: env_nonzero("CHAT_OUTBOUND_CAPACITY", defaults.outbound_capacity),
            send_timeout: env_secs("CHAT_SEND_TIMEOUT_SECS", defaults.send_timeout),
            ping_interval: env_secs("CHAT_PING_INTERVAL_SECS", defaults.ping_interval),
            pong_timeout: env_secs("CHAT_PONG_TIMEOUT_SECS", defaults.pong_timeout),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default;
    }
    match trimmed.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Invalid value {:?} for {}, using {:?}", raw, key, default);
            default
        }
    }
}

fn env_nonzero(key: &str, default: usize) -> usize {
    match env_or(key, default) {
        0 => {
            tracing::warn!("{} must be greater than zero, using {}", key, default);
            default
        }
        n => n,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_nonzero(key, default.as_secs() as usize) as u64)
}
