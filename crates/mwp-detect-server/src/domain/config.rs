//! Server configuration.
//!
//! [`ServerConfig`] is built once in `main.rs` from CLI arguments (or their
//! environment variable overrides) and shared read-only with every session.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Default WebSocket port of the detection service.
pub const DEFAULT_PORT: u16 = 24850;

/// All runtime configuration for the detection server.
///
/// # Example
///
/// ```rust
/// use mwp_detect_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 24850);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.  Loopback by default: the
    /// engine and the server normally share a machine and a spool directory.
    pub bind_addr: SocketAddr,

    /// Minimum confidence for a candidate to count as found.
    pub threshold: f32,

    /// How long the accept loop waits before re-checking the shutdown flag.
    pub accept_poll: Duration,
}

impl Default for ServerConfig {
    /// | Field       | Default           |
    /// |-------------|-------------------|
    /// | bind_addr   | `127.0.0.1:24850` |
    /// | threshold   | 0.8               |
    /// | accept_poll | 200 ms            |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            threshold: 0.8,
            accept_poll: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_loopback_on_default_port() {
        let cfg = ServerConfig::default();

        assert!(cfg.bind_addr.ip().is_loopback());
        assert_eq!(cfg.bind_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_default_threshold_matches_engine_default() {
        let cfg = ServerConfig::default();
        assert!((cfg.threshold - 0.8).abs() < f32::EPSILON);
    }
}
