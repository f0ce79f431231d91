//! Reactor builder with fluent API.

use crate::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_EVENTS, DEFAULT_REQUEST, FetchConfig,
};
use crate::error::{ConfigError, ReactorError};
use crate::reactor::Reactor;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;

/// Builder for creating a [`Reactor`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use fetch_reactor::{CollectSink, Reactor};
/// use std::time::Duration;
///
/// let reactor = Reactor::builder()
///     .destination("142.251.46.228:80".parse()?)
///     .connections(10)
///     .idle_timeout(Duration::from_secs(5))
///     .build()?;
///
/// let mut sink = CollectSink::new(10);
/// let report = reactor.run(&mut sink)?;
/// println!("took {:?}", report.elapsed);
/// ```
#[derive(Debug, Clone)]
pub struct ReactorBuilder {
    destination: Option<SocketAddr>,
    connections: usize,
    idle_timeout: Duration,
    chunk_size: usize,
    max_events: usize,
    request: Bytes,
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            destination: None,
            connections: 1,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_events: DEFAULT_MAX_EVENTS,
            request: Bytes::from_static(DEFAULT_REQUEST),
        }
    }

    /// Set the address every connection dials. Required.
    pub fn destination(mut self, addr: SocketAddr) -> Self {
        self.destination = Some(addr);
        self
    }

    /// Set the number of concurrent connections (one output slot each).
    ///
    /// Default: 1
    pub fn connections(mut self, count: usize) -> Self {
        self.connections = count;
        self
    }

    /// Set how long the loop waits without any readiness event before giving up.
    ///
    /// Default: 10 seconds
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum number of bytes read per recv call.
    ///
    /// Default: 1023
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the maximum number of readiness events handled per wait.
    ///
    /// Default: 100
    pub fn max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Set the request written on every connection.
    ///
    /// Default: `GET / HTTP/1.0\r\n\r\n`
    pub fn request(mut self, request: impl Into<Bytes>) -> Self {
        self.request = request.into();
        self
    }

    /// Produce the validated configuration without creating a reactor.
    pub fn config(self) -> Result<FetchConfig, ConfigError> {
        let destination = self.destination.ok_or(ConfigError::MissingDestination)?;
        let config = FetchConfig {
            destination,
            connections: self.connections,
            idle_timeout: self.idle_timeout,
            chunk_size: self.chunk_size,
            max_events: self.max_events,
            request: self.request,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the reactor.
    pub fn build(self) -> Result<Reactor, ReactorError> {
        Reactor::new(self.config()?)
    }
}
