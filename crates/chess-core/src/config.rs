//! Per-connection tuning.

use std::time::Duration;

/// Timing and buffering knobs for one connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Interval between keepalive pings. Must be shorter than `peer_timeout`.
    pub keepalive_interval: Duration,
    /// How long the peer may go without answering a ping.
    pub peer_timeout: Duration,
    /// Upper bound on a single frame write.
    pub write_timeout: Duration,
    /// Envelopes that may queue for a connection before new ones are dropped.
    pub outbound_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let peer_timeout = Duration::from_secs(60);
        Self {
            keepalive_interval: peer_timeout * 9 / 10,
            peer_timeout,
            write_timeout: Duration::from_secs(10),
            outbound_capacity: 256,
        }
    }
}
