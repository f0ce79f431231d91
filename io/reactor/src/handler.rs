//! Readiness-to-action dispatch.
//!
//! The reactor turns every readiness event into calls on a
//! [`ReadinessHandler`], one method per event kind. Each call reports what
//! the reactor must do with the connection's registration next.

use crate::types::Readiness;

/// Registration follow-up requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Leave the registration as it is.
    Keep,
    /// Re-arm read interest. Read readiness is one-shot: without this the
    /// connection never hears about the next readable edge.
    ArmReadable,
    /// The connection is terminal. Deregister it and hand its payload to the sink.
    Retire,
}

impl Next {
    /// Combine two follow-ups from the same event. `Retire` wins over
    /// `ArmReadable`, which wins over `Keep`.
    #[inline]
    pub fn then(self, other: Next) -> Next {
        match (self, other) {
            (Next::Retire, _) | (_, Next::Retire) => Next::Retire,
            (Next::ArmReadable, _) | (_, Next::ArmReadable) => Next::ArmReadable,
            _ => Next::Keep,
        }
    }
}

/// Event handlers for a single registered connection.
///
/// Handlers run on the reactor thread and must never block: every socket
/// operation inside them is non-blocking.
pub trait ReadinessHandler {
    /// The socket became writable (connect completed, or send buffer space freed).
    fn on_writable(&mut self) -> Next;

    /// Data is available. `scratch` is the reactor's reusable read buffer;
    /// its length is the configured chunk size.
    fn on_readable(&mut self, scratch: &mut [u8]) -> Next;

    /// The peer closed its side of the connection.
    fn on_peer_closed(&mut self) -> Next;

    /// The multiplexer reported an error condition on the socket.
    fn on_error(&mut self) -> Next;
}

/// Deliver one event to `handler`.
///
/// Error is checked first and ends the dispatch. Otherwise writable,
/// readable and peer-closed are handled in that order; readable and
/// peer-closed arriving together both run, so a final chunk of data is
/// drained before the close is acted on. A handler that retires stops
/// further dispatch for this event.
pub fn dispatch<H: ReadinessHandler + ?Sized>(
    handler: &mut H,
    readiness: Readiness,
    scratch: &mut [u8],
) -> Next {
    if readiness.error {
        return handler.on_error();
    }

    let mut next = Next::Keep;

    if readiness.writable {
        next = next.then(handler.on_writable());
        if next == Next::Retire {
            return next;
        }
    }

    if readiness.readable {
        next = next.then(handler.on_readable(scratch));
        if next == Next::Retire {
            return next;
        }
    }

    if readiness.peer_closed {
        next = next.then(handler.on_peer_closed());
    }

    next
}
