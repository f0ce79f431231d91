use std::io;
use std::net::SocketAddr;

/// Per-connection setup failure from [`Connection::open`](crate::Connection::open).
///
/// The reactor logs these and fails the affected slot; the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("client socket creation failed: {0}")]
    SocketCreate(io::Error),
    #[error("setting socket non-blocking failed: {0}")]
    NonBlocking(io::Error),
    #[error("connect to {addr} could not be initiated: {source}")]
    ConnectInitiation { addr: SocketAddr, source: io::Error },
    #[error("registering socket for readiness failed: {0}")]
    Register(io::Error),
}

/// Socket-level failure of an established or connecting connection.
///
/// Terminates that connection only.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Socket(io::Error),
    #[error("error readiness without a pending socket error")]
    ErrorReadiness,
    #[error("connect failed: {0}")]
    Connect(io::Error),
    #[error("send failed: {0}")]
    Send(io::Error),
    #[error("recv failed: {0}")]
    Recv(io::Error),
    #[error("re-arming read interest failed: {0}")]
    Rearm(io::Error),
}

/// Invalid reactor configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no destination address configured")]
    MissingDestination,
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("max events per wait must be greater than zero")]
    ZeroMaxEvents,
    #[error("request payload is empty")]
    EmptyRequest,
}

/// Batch-fatal reactor failure.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("creating readiness poll failed: {0}")]
    PollCreate(io::Error),
    #[error("waiting for readiness failed: {0}")]
    Poll(io::Error),
}
