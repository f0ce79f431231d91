//! Core types for the fetch reactor.

use mio::Token;
use mio::event::Event;

/// Output slot a connection writes its payload into.
///
/// Assigned by the caller at batch start (`0..connections`) and never
/// changed afterwards.
pub type SlotIndex = usize;

/// Opaque connection identifier.
///
/// The index of the connection in the reactor's arena. It doubles as the
/// mio `Token` attached to the connection's registration, so dispatch never
/// goes through the raw socket descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub(crate) usize);

impl ConnId {
    /// Create a connection ID from a raw arena index.
    ///
    /// This is primarily useful for testing purposes.
    #[inline]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the arena index of this connection.
    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0
    }

    #[inline]
    pub(crate) fn token(&self) -> Token {
        Token(self.0)
    }
}

impl From<Token> for ConnId {
    fn from(token: Token) -> Self {
        Self(token.0)
    }
}

/// Lifecycle state of a single connection.
///
/// States only move forward:
/// `Connecting -> Writable -> ReadingResponse -> {Done | Failed}`.
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Non-blocking connect in flight, registered for write-readiness.
    Connecting,
    /// Connected; the request is being written.
    Writable,
    /// Request fully sent, registered for read-readiness.
    ReadingResponse,
    /// The peer closed its side. Terminal.
    Done,
    /// A transport error ended the connection. Terminal.
    Failed,
}

impl ConnState {
    /// Returns true for `Done` and `Failed`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnState::Done | ConnState::Failed)
    }

    /// Position in the state machine, used to enforce forward-only moves.
    #[inline]
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ConnState::Connecting => 0,
            ConnState::Writable => 1,
            ConnState::ReadingResponse => 2,
            ConnState::Done | ConnState::Failed => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::Connecting => "connecting",
            ConnState::Writable => "writable",
            ConnState::ReadingResponse => "reading",
            ConnState::Done => "done",
            ConnState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness flags carried by one event, detached from the mio `Event`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub error: bool,
    pub writable: bool,
    pub readable: bool,
    pub peer_closed: bool,
}

impl From<&Event> for Readiness {
    fn from(event: &Event) -> Self {
        Self {
            error: event.is_error(),
            writable: event.is_writable(),
            readable: event.is_readable(),
            peer_closed: event.is_read_closed() || event.is_write_closed(),
        }
    }
}

/// Outcome of one drain pass over a readable socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    /// Bytes appended to the payload during this pass.
    pub bytes: usize,
    /// The peer's end of stream was read.
    pub eof: bool,
}

/// Result of a finished fetch batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Wall-clock time spent in the batch.
    pub elapsed: std::time::Duration,
    /// Connections that ended in `Done`.
    pub done: usize,
    /// Connections that ended in `Failed`, including ones that could not be opened.
    pub failed: usize,
    /// Connections still in flight when the loop stopped.
    pub abandoned: usize,
    /// The loop stopped because the idle timeout elapsed.
    pub timed_out: bool,
}

impl BatchReport {
    /// Number of connections that reached a terminal state and were handed to the sink.
    pub fn delivered(&self) -> usize {
        self.done + self.failed
    }
}
