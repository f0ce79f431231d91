//! Batch configuration.

use crate::error::ConfigError;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;

/// Default idle window: the loop gives up after this long without any readiness event.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default upper bound for a single recv call during a drain pass.
pub const DEFAULT_CHUNK_SIZE: usize = 1023;

/// Default number of readiness events handled per wait.
pub const DEFAULT_MAX_EVENTS: usize = 100;

/// Default request. HTTP/1.0 so the server closes the connection after responding.
pub const DEFAULT_REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// Configuration for one fetch batch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Resolved address every connection dials.
    pub destination: SocketAddr,
    /// Number of concurrent connections (and output slots).
    pub connections: usize,
    /// Maximum time to wait for the next readiness event.
    pub idle_timeout: Duration,
    /// Maximum bytes read per recv call.
    pub chunk_size: usize,
    /// Maximum readiness events handled per wait.
    pub max_events: usize,
    /// Request written once on every connection.
    pub request: Bytes,
}

impl FetchConfig {
    /// Create a configuration for a single connection to `destination` with default settings.
    pub fn new(destination: SocketAddr) -> Self {
        Self {
            destination,
            connections: 1,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_events: DEFAULT_MAX_EVENTS,
            request: Bytes::from_static(DEFAULT_REQUEST),
        }
    }

    /// Check the configuration for values the reactor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.max_events == 0 {
            return Err(ConfigError::ZeroMaxEvents);
        }
        if self.request.is_empty() {
            return Err(ConfigError::EmptyRequest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:80".parse().unwrap()
    }

    #[test]
    fn defaults_match_documented_sizing() {
        let config = FetchConfig::new(addr());
        assert_eq!(config.connections, 1);
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert_eq!(config.chunk_size, 1023);
        assert_eq!(config.max_events, 100);
        assert!(config.request.ends_with(b"\r\n\r\n"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let mut config = FetchConfig::new(addr());
        config.chunk_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroChunkSize));

        let mut config = FetchConfig::new(addr());
        config.max_events = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxEvents));
    }

    #[test]
    fn validate_rejects_empty_request() {
        let mut config = FetchConfig::new(addr());
        config.request = Bytes::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptyRequest));
    }

    #[test]
    fn zero_connections_is_valid() {
        let mut config = FetchConfig::new(addr());
        config.connections = 0;
        assert!(config.validate().is_ok());
    }
}
