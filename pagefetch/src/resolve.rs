//! Destination resolution.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve {target}: {source}")]
    Lookup {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("{target} resolved to no addresses")]
    NoAddress { target: String },
}

/// Resolve `host:port` to one address, preferring IPv4.
///
/// Literal addresses are returned as-is. Resolution happens once per batch;
/// every connection dials the same address.
pub fn resolve(target: &str) -> Result<SocketAddr, ResolveError> {
    let addrs: Vec<SocketAddr> = target
        .to_socket_addrs()
        .map_err(|source| ResolveError::Lookup {
            target: target.to_string(),
            source,
        })?
        .collect();

    let addr = addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ResolveError::NoAddress {
            target: target.to_string(),
        })?;

    debug!(target, %addr, candidates = addrs.len(), "destination resolved");
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_ipv4() {
        let addr = resolve("142.251.46.228:80").unwrap();
        assert_eq!(addr, "142.251.46.228:80".parse().unwrap());
    }

    #[test]
    fn test_literal_ipv6() {
        let addr = resolve("[::1]:8080").unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_localhost_resolves() {
        let addr = resolve("localhost:8080").unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_missing_port() {
        assert!(matches!(
            resolve("127.0.0.1"),
            Err(ResolveError::Lookup { .. })
        ));
    }
}
