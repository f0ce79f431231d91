//! fetch-reactor - single-threaded readiness reactor for concurrent page fetches.
//!
//! This crate drives N concurrent TCP connections to one destination from a
//! single thread. Every socket is non-blocking and multiplexed through one
//! mio `Poll` (epoll on Linux, kqueue on macOS); no operation ever blocks
//! on a single connection.
//!
//! # Model
//!
//! - **Connection**: one socket's lifecycle. Dial, write the request,
//!   accumulate response bytes, detect completion or failure.
//! - **Reactor**: owns the poll handle and the connection arena, waits for
//!   readiness and dispatches each event to the owning connection through
//!   the [`ReadinessHandler`] trait.
//!
//! Each connection moves forward through
//! `Connecting -> Writable -> ReadingResponse -> {Done | Failed}`. The
//! request is sent on the first write edge; read interest is re-armed
//! after every readable event; a peer close or end of stream completes
//! the connection. Completion is detected by the server closing the
//! connection, so the request should be HTTP/1.0.
//!
//! # Quick Start
//!
//! ```ignore
//! use fetch_reactor::{CollectSink, Reactor};
//!
//! let reactor = Reactor::builder()
//!     .destination("142.251.46.228:80".parse()?)
//!     .connections(8)
//!     .build()?;
//!
//! let mut sink = CollectSink::new(8);
//! let report = reactor.run(&mut sink)?;
//!
//! for (slot, page) in sink.iter() {
//!     println!("slot {slot}: {} bytes", page.len());
//! }
//! println!("Time elapsed: {}ms", report.elapsed.as_millis());
//! ```
//!
//! # Failure Handling
//!
//! Failures are local to one connection: a socket error fails that
//! connection and its partial payload still goes to the sink. Only failing
//! to create the poll handle, or the wait itself failing, aborts the batch.
//! If no readiness event arrives for a whole idle window, the loop stops and
//! the connections still in flight are closed without a result. Nothing is
//! retried.

mod builder;
mod config;
mod connection;
mod error;
mod handler;
mod reactor;
mod sink;
mod types;

pub use builder::ReactorBuilder;
pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_EVENTS, DEFAULT_REQUEST, FetchConfig,
};
pub use connection::Connection;
pub use error::{ConfigError, OpenError, ReactorError, TransportError};
pub use handler::{Next, ReadinessHandler, dispatch};
pub use reactor::{Reactor, run};
pub use sink::{CollectSink, Sink};
pub use types::{BatchReport, ConnId, ConnState, Drained, Readiness, SlotIndex};
