//! Server configuration.
//!
//! Every setting has a default and can be overridden through the
//! environment:
//!
//! - `BIND_ADDR`          (default: "0.0.0.0")
//! - `PORT`               (default: "8080")
//! - `STATIC_DIR`         (default: "./client")
//! - `MAX_CONNECTIONS`    (default: "1024")
//! - `MAX_MESSAGE_SIZE`   (default: "4096", bytes)
//! - `OUTBOUND_CAPACITY`  (default: "256", envelopes)
//! - `KEEPALIVE_SECS`     (default: "54")
//! - `PEER_TIMEOUT_SECS`  (default: "60")
//! - `WRITE_TIMEOUT_SECS` (default: "10")

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chess_core::ConnectionConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("KEEPALIVE_SECS ({keepalive:?}) must be shorter than PEER_TIMEOUT_SECS ({timeout:?})")]
    KeepaliveTooLong {
        keepalive: Duration,
        timeout: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    pub port: u16,

    /// Directory of the browser client, served for every non-API path.
    pub static_dir: String,

    /// Live connections admitted before new upgrades are refused.
    pub max_connections: usize,

    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,

    pub connection: ConnectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "./client".to_string(),
            max_connections: 1024,
            max_message_size: 4096,
            connection: ConnectionConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup, falling back to defaults
    /// for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let conn = defaults.connection;

        let connection = ConnectionConfig {
            keepalive_interval: read_secs(&lookup, "KEEPALIVE_SECS", conn.keepalive_interval)?,
            peer_timeout: read_secs(&lookup, "PEER_TIMEOUT_SECS", conn.peer_timeout)?,
            write_timeout: read_secs(&lookup, "WRITE_TIMEOUT_SECS", conn.write_timeout)?,
            outbound_capacity: read_or_default(
                &lookup,
                "OUTBOUND_CAPACITY",
                conn.outbound_capacity,
            )?,
        };
        if connection.keepalive_interval >= connection.peer_timeout {
            return Err(ConfigError::KeepaliveTooLong {
                keepalive: connection.keepalive_interval,
                timeout: connection.peer_timeout,
            });
        }

        Ok(Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: read_or_default(&lookup, "PORT", defaults.port)?,
            static_dir: lookup("STATIC_DIR").unwrap_or(defaults.static_dir),
            max_connections: read_or_default(&lookup, "MAX_CONNECTIONS", defaults.max_connections)?,
            max_message_size: read_or_default(
                &lookup,
                "MAX_MESSAGE_SIZE",
                defaults.max_message_size,
            )?,
            connection,
        })
    }

    /// `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_or_default<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn read_secs<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = read_or_default(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
