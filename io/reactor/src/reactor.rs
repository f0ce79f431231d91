//! The readiness loop.
//!
//! One [`Reactor`] drives one fetch batch on the calling thread. It opens
//! every connection up front, then waits on a single mio `Poll` and routes
//! each readiness event to the owning [`Connection`] through
//! [`dispatch`](crate::handler::dispatch). The loop ends when every
//! connection is terminal or when a whole idle window passes without a
//! single event.

use crate::builder::ReactorBuilder;
use crate::config::FetchConfig;
use crate::connection::Connection;
use crate::error::{OpenError, ReactorError, TransportError};
use crate::handler::{Next, dispatch};
use crate::sink::Sink;
use crate::types::{BatchReport, ConnId, ConnState, Readiness, SlotIndex};
use mio::{Events, Interest, Poll};
use slab::Slab;
use std::io;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Upper bound on connection slots allocated before the batch starts.
/// The arena grows past it on demand.
const MAX_PREALLOCATED: usize = 4096;

/// Event loop for a single fetch batch.
///
/// Consumed by [`run`](Reactor::run), so a reactor never outlives its batch.
pub struct Reactor {
    poll: Poll,
    config: FetchConfig,
    connections: Slab<Connection>,
    /// Reused by every drain pass. Its length is the configured chunk size.
    scratch: Box<[u8]>,
}

impl Reactor {
    /// Create a reactor for `config`.
    ///
    /// Fails if the configuration is invalid or the poll handle cannot be
    /// created; both are fatal for the batch.
    pub fn new(config: FetchConfig) -> Result<Self, ReactorError> {
        config.validate()?;
        let poll = Poll::new().map_err(ReactorError::PollCreate)?;

        Ok(Self {
            poll,
            connections: Slab::with_capacity(config.connections.min(MAX_PREALLOCATED)),
            scratch: vec![0u8; config.chunk_size].into_boxed_slice(),
            config,
        })
    }

    /// Create a builder for configuring the reactor.
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder::new()
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Drive every connection to a terminal state or until the idle timeout.
    ///
    /// `sink` receives the payload of each connection that ends in `Done` or
    /// `Failed`, including slots whose socket could not be opened at all.
    /// Connections still in flight when the idle timeout fires are closed
    /// without a sink call.
    pub fn run<S: Sink + ?Sized>(mut self, sink: &mut S) -> Result<BatchReport, ReactorError> {
        let start = Instant::now();
        let mut report = BatchReport::default();
        let mut remaining = self.config.connections;

        info!(
            destination = %self.config.destination,
            connections = self.config.connections,
            "starting fetch batch"
        );

        for slot in 0..self.config.connections {
            if let Err(e) = self.open(slot) {
                error!(slot, error = %e, "open socket failed");
                sink.write(slot, Vec::new());
                report.failed += 1;
                remaining -= 1;
            }
        }

        let mut events = Events::with_capacity(self.config.max_events);

        while remaining > 0 {
            match self.poll.poll(&mut events, Some(self.config.idle_timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "readiness wait failed");
                    self.abandon_all();
                    return Err(ReactorError::Poll(e));
                }
            }

            if events.is_empty() {
                warn!(
                    remaining,
                    idle_timeout_ms = self.config.idle_timeout.as_millis() as u64,
                    "no readiness events within idle timeout"
                );
                report.timed_out = true;
                break;
            }

            for event in events.iter() {
                let id = ConnId::from(event.token());
                if self.handle(id, Readiness::from(event), sink, &mut report) {
                    remaining -= 1;
                }
            }
        }

        report.abandoned = self.abandon_all();
        report.elapsed = start.elapsed();

        info!(
            done = report.done,
            failed = report.failed,
            abandoned = report.abandoned,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "fetch batch finished"
        );

        Ok(report)
    }

    /// Open the connection for `slot` and register it for write-readiness.
    fn open(&mut self, slot: SlotIndex) -> Result<ConnId, OpenError> {
        let mut conn = Connection::open(self.config.destination, slot, self.config.request.clone())?;

        let entry = self.connections.vacant_entry();
        let id = ConnId::new(entry.key());

        // epoll reports readiness that already exists at registration, so a
        // connect that finished before this call still produces an event.
        self.poll
            .registry()
            .register(conn.source(), id.token(), Interest::WRITABLE)
            .map_err(OpenError::Register)?;

        debug!(slot, conn = id.as_usize(), fd = conn.raw_fd(), "connection opened");
        entry.insert(conn);
        Ok(id)
    }

    /// Route one event. Returns true if the connection was retired.
    fn handle<S: Sink + ?Sized>(
        &mut self,
        id: ConnId,
        readiness: Readiness,
        sink: &mut S,
        report: &mut BatchReport,
    ) -> bool {
        let Some(conn) = self.connections.get_mut(id.as_usize()) else {
            trace!(conn = id.as_usize(), "event for retired connection");
            return false;
        };

        trace!(conn = id.as_usize(), slot = conn.slot(), ?readiness, "event");

        let retire = match dispatch(conn, readiness, &mut self.scratch) {
            Next::Keep => false,
            Next::ArmReadable => {
                match self
                    .poll
                    .registry()
                    .reregister(conn.source(), id.token(), Interest::READABLE)
                {
                    Ok(()) => false,
                    Err(e) => {
                        conn.fail(TransportError::Rearm(e));
                        true
                    }
                }
            }
            Next::Retire => true,
        };

        if retire {
            self.retire(id, sink, report);
        }
        retire
    }

    /// Deregister a terminal connection and hand its payload to the sink.
    fn retire<S: Sink + ?Sized>(&mut self, id: ConnId, sink: &mut S, report: &mut BatchReport) {
        let mut conn = self.connections.remove(id.as_usize());
        debug_assert!(conn.state().is_terminal());

        if let Err(e) = self.poll.registry().deregister(conn.source()) {
            debug!(slot = conn.slot(), error = %e, "deregister failed");
        }

        match conn.state() {
            ConnState::Done => report.done += 1,
            _ => report.failed += 1,
        }

        debug!(slot = conn.slot(), state = %conn.state(), bytes = conn.payload().len(), "connection retired");

        let (slot, payload) = conn.finish();
        sink.write(slot, payload);
    }

    /// Close every connection that is still in flight. Returns how many there were.
    fn abandon_all(&mut self) -> usize {
        let abandoned = self.connections.len();
        for mut conn in self.connections.drain() {
            debug!(slot = conn.slot(), state = %conn.state(), bytes = conn.payload().len(), "abandoning connection");
            if let Err(e) = self.poll.registry().deregister(conn.source()) {
                debug!(slot = conn.slot(), error = %e, "deregister failed");
            }
        }
        abandoned
    }
}

/// Run one fetch batch described by `config`.
pub fn run<S: Sink + ?Sized>(config: FetchConfig, sink: &mut S) -> Result<BatchReport, ReactorError> {
    Reactor::new(config)?.run(sink)
}
