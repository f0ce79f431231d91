//! Per-connection state machine.
//!
//! A [`Connection`] owns one non-blocking client socket from the moment the
//! connect is initiated until it reaches `Done` or `Failed`, at which point
//! its accumulated payload is released to the caller.

use crate::error::{OpenError, TransportError};
use crate::handler::{Next, ReadinessHandler};
use crate::types::{ConnState, Drained, SlotIndex};
use bytes::Bytes;
use mio::net::TcpStream;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, trace, warn};

/// One in-flight fetch.
pub struct Connection {
    stream: TcpStream,
    slot: SlotIndex,
    state: ConnState,
    request: Bytes,
    /// Request bytes already handed to the kernel.
    written: usize,
    payload: Vec<u8>,
}

impl Connection {
    /// Create a non-blocking socket and start connecting to `destination`.
    ///
    /// Never blocks. Connection establishment is observed later through
    /// write-readiness.
    pub fn open(destination: SocketAddr, slot: SlotIndex, request: Bytes) -> Result<Self, OpenError> {
        let socket = Socket::new(
            Domain::for_address(destination),
            Type::STREAM,
            Some(Protocol::TCP),
        )
        .map_err(OpenError::SocketCreate)?;

        socket.set_nonblocking(true).map_err(OpenError::NonBlocking)?;

        match socket.connect(&destination.into()) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(source) => {
                return Err(OpenError::ConnectInitiation {
                    addr: destination,
                    source,
                });
            }
        }

        let std_stream: std::net::TcpStream = socket.into();
        Ok(Self::from_stream(TcpStream::from_std(std_stream), slot, request))
    }

    fn from_stream(stream: TcpStream, slot: SlotIndex, request: Bytes) -> Self {
        Self {
            stream,
            slot,
            state: ConnState::Connecting,
            request,
            written: 0,
            payload: Vec::new(),
        }
    }

    /// The output slot this connection writes into.
    #[inline]
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    #[inline]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Bytes received so far.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Request bytes still waiting to be written.
    #[inline]
    pub fn unsent(&self) -> usize {
        self.request.len() - self.written
    }

    /// The socket's descriptor, for diagnostics.
    pub fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub(crate) fn source(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Close the socket and release the payload for the sink.
    pub fn finish(self) -> (SlotIndex, Vec<u8>) {
        (self.slot, self.payload)
    }

    /// Read everything currently available into the payload.
    ///
    /// Each recv reads at most `scratch.len()` bytes. A short read means the
    /// socket buffer is exhausted for this edge, so the pass stops there
    /// instead of issuing one more recv just to see `WouldBlock`.
    pub fn drain(&mut self, scratch: &mut [u8]) -> Result<Drained, TransportError> {
        let mut drained = Drained::default();
        let chunk = scratch.len();

        loop {
            match self.stream.read(scratch) {
                Ok(0) => {
                    drained.eof = true;
                    break;
                }
                Ok(n) => {
                    self.payload.extend_from_slice(&scratch[..n]);
                    drained.bytes += n;
                    if n < chunk {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Recv(e)),
            }
        }

        Ok(drained)
    }

    fn advance(&mut self, to: ConnState) {
        debug_assert!(
            to.rank() >= self.state.rank(),
            "state moved backward: {} -> {}",
            self.state,
            to
        );
        trace!(slot = self.slot, from = %self.state, to = %to, "state change");
        self.state = to;
    }

    pub(crate) fn fail(&mut self, error: TransportError) -> Next {
        warn!(slot = self.slot, state = %self.state, bytes = self.payload.len(), %error, "connection failed");
        self.advance(ConnState::Failed);
        Next::Retire
    }

    /// Confirm a non-blocking connect finished successfully.
    ///
    /// Returns `Ok(false)` while the handshake is still in flight.
    fn connected(&mut self) -> Result<bool, TransportError> {
        match self.stream.take_error() {
            Ok(None) => {}
            Ok(Some(e)) | Err(e) => return Err(TransportError::Connect(e)),
        }
        match self.stream.peer_addr() {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(e) => Err(TransportError::Connect(e)),
        }
    }

    /// One send attempt of the unsent part of the request.
    fn send_request(&mut self) -> Next {
        loop {
            match self.stream.write(&self.request[self.written..]) {
                Ok(n) => {
                    self.written += n;
                    if self.unsent() == 0 {
                        debug!(slot = self.slot, bytes = self.written, "request sent");
                        self.advance(ConnState::ReadingResponse);
                        return Next::ArmReadable;
                    }
                    debug!(
                        slot = self.slot,
                        sent = n,
                        unsent = self.unsent(),
                        "partial request write, waiting for next write edge"
                    );
                    return Next::Keep;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Next::Keep,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(TransportError::Send(e)),
            }
        }
    }
}

impl ReadinessHandler for Connection {
    fn on_writable(&mut self) -> Next {
        match self.state {
            ConnState::Connecting => {
                match self.connected() {
                    Ok(true) => {}
                    Ok(false) => return Next::Keep,
                    Err(e) => return self.fail(e),
                }
                self.advance(ConnState::Writable);
                self.send_request()
            }
            ConnState::Writable => self.send_request(),
            ConnState::ReadingResponse => Next::Keep,
            ConnState::Done | ConnState::Failed => Next::Retire,
        }
    }

    fn on_readable(&mut self, scratch: &mut [u8]) -> Next {
        match self.state {
            ConnState::ReadingResponse => {}
            ConnState::Done | ConnState::Failed => return Next::Retire,
            _ => return Next::Keep,
        }

        match self.drain(scratch) {
            Ok(drained) => {
                trace!(
                    slot = self.slot,
                    bytes = drained.bytes,
                    total = self.payload.len(),
                    eof = drained.eof,
                    "drained"
                );
                if drained.eof {
                    debug!(slot = self.slot, bytes = self.payload.len(), "end of stream");
                    self.advance(ConnState::Done);
                    Next::Retire
                } else {
                    Next::ArmReadable
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_peer_closed(&mut self) -> Next {
        if !self.state.is_terminal() {
            debug!(slot = self.slot, state = %self.state, bytes = self.payload.len(), "peer closed");
            self.advance(ConnState::Done);
        }
        Next::Retire
    }

    fn on_error(&mut self) -> Next {
        if self.state.is_terminal() {
            return Next::Retire;
        }
        let error = match self.stream.take_error() {
            Ok(Some(e)) | Err(e) => TransportError::Socket(e),
            Ok(None) => TransportError::ErrorReadiness,
        };
        self.fail(error)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("slot", &self.slot)
            .field("state", &self.state)
            .field("written", &self.written)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

    fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    /// Open a connection and drive it through the connect and write phase.
    fn connected_pair() -> (Connection, std::net::TcpStream) {
        let (listener, addr) = listener();
        let mut conn = Connection::open(addr, 7, Bytes::from_static(REQUEST)).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        for _ in 0..100 {
            if conn.on_writable() == Next::ArmReadable {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(conn.state(), ConnState::ReadingResponse);

        let mut request = vec![0u8; REQUEST.len()];
        std::io::Read::read_exact(&mut server, &mut request).unwrap();
        assert_eq!(request, REQUEST);

        (conn, server)
    }

    #[test]
    fn open_starts_connecting() {
        let (_listener, addr) = listener();
        let conn = Connection::open(addr, 3, Bytes::from_static(REQUEST)).unwrap();
        assert_eq!(conn.state(), ConnState::Connecting);
        assert_eq!(conn.slot(), 3);
        assert_eq!(conn.unsent(), REQUEST.len());
        assert!(conn.payload().is_empty());
        assert!(conn.raw_fd() >= 0);
    }

    #[test]
    fn readable_before_request_is_ignored() {
        let (_listener, addr) = listener();
        let mut conn = Connection::open(addr, 0, Bytes::from_static(REQUEST)).unwrap();
        let mut scratch = [0u8; 16];
        assert_eq!(conn.on_readable(&mut scratch), Next::Keep);
        assert_eq!(conn.state(), ConnState::Connecting);
    }

    #[test]
    fn drain_concatenates_full_and_short_chunks() {
        let (mut conn, mut server) = connected_pair();

        let first = vec![b'a'; 1023];
        let last = b"0123456789";
        server.write_all(&first).unwrap();
        server.write_all(last).unwrap();
        thread::sleep(Duration::from_millis(50));

        let mut scratch = vec![0u8; 1023];
        let drained = conn.drain(&mut scratch).unwrap();
        assert_eq!(drained.bytes, 1033);
        assert!(!drained.eof);

        let mut expected = first.clone();
        expected.extend_from_slice(last);
        assert_eq!(conn.payload(), &expected[..]);
    }

    #[test]
    fn repeated_readable_events_append_new_bytes_only() {
        let (mut conn, mut server) = connected_pair();
        let mut scratch = vec![0u8; 1023];

        server.write_all(b"hello ").unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(conn.on_readable(&mut scratch), Next::ArmReadable);

        server.write_all(b"world").unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(conn.on_readable(&mut scratch), Next::ArmReadable);

        // nothing new arrived
        assert_eq!(conn.on_readable(&mut scratch), Next::ArmReadable);

        assert_eq!(conn.payload(), b"hello world");
        assert_eq!(conn.state(), ConnState::ReadingResponse);
    }

    #[test]
    fn short_read_before_close_needs_next_edge() {
        let (mut conn, mut server) = connected_pair();
        server.write_all(b"OK").unwrap();
        drop(server);
        thread::sleep(Duration::from_millis(50));

        // the short read ends the pass before the zero-byte read
        let mut scratch = vec![0u8; 1023];
        assert_eq!(conn.on_readable(&mut scratch), Next::ArmReadable);
        assert_eq!(conn.state(), ConnState::ReadingResponse);
        assert_eq!(conn.payload(), b"OK");

        // the re-armed edge reads end of stream
        assert_eq!(conn.on_readable(&mut scratch), Next::Retire);
        assert_eq!(conn.state(), ConnState::Done);

        let (slot, payload) = conn.finish();
        assert_eq!(slot, 7);
        assert_eq!(payload, b"OK");
    }

    #[test]
    fn peer_closed_after_short_read_completes() {
        let (mut conn, mut server) = connected_pair();
        server.write_all(b"OK").unwrap();
        drop(server);
        thread::sleep(Duration::from_millis(50));

        let mut scratch = vec![0u8; 1023];
        assert_eq!(conn.on_readable(&mut scratch), Next::ArmReadable);
        assert_eq!(conn.on_peer_closed(), Next::Retire);
        assert_eq!(conn.state(), ConnState::Done);
        assert_eq!(conn.payload(), b"OK");
    }

    #[test]
    fn end_of_stream_after_full_chunk_completes() {
        let (mut conn, mut server) = connected_pair();
        let body = vec![b'z'; 1023];
        server.write_all(&body).unwrap();
        drop(server);
        thread::sleep(Duration::from_millis(50));

        let mut scratch = vec![0u8; 1023];
        let drained = conn.drain(&mut scratch).unwrap();
        assert_eq!(drained.bytes, 1023);
        assert!(drained.eof);
        assert_eq!(conn.payload(), &body[..]);
    }

    #[test]
    fn full_chunk_then_close_retires_in_one_pass() {
        let (mut conn, mut server) = connected_pair();
        server.write_all(&[b'z'; 1023]).unwrap();
        drop(server);
        thread::sleep(Duration::from_millis(50));

        let mut scratch = vec![0u8; 1023];
        assert_eq!(conn.on_readable(&mut scratch), Next::Retire);
        assert_eq!(conn.state(), ConnState::Done);
        assert_eq!(conn.payload().len(), 1023);
    }

    #[test]
    fn oversized_request_resumes_on_next_write_edge() {
        let (listener, addr) = listener();
        let request = Bytes::from(vec![b'r'; 16 * 1024 * 1024]);
        let mut conn = Connection::open(addr, 0, request.clone()).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        for _ in 0..100 {
            if conn.on_writable() != Next::Keep || conn.state() != ConnState::Connecting {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        // the kernel buffers cannot take the whole request at once
        assert_eq!(conn.state(), ConnState::Writable);
        assert!(conn.unsent() > 0);
        assert!(conn.unsent() < request.len());

        let len = request.len();
        let reader = thread::spawn(move || {
            let mut received = vec![0u8; len];
            std::io::Read::read_exact(&mut server, &mut received).unwrap();
            received
        });

        let mut next = Next::Keep;
        for _ in 0..2000 {
            next = conn.on_writable();
            if next != Next::Keep {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(next, Next::ArmReadable);
        assert_eq!(conn.state(), ConnState::ReadingResponse);
        assert_eq!(conn.unsent(), 0);
        assert_eq!(reader.join().unwrap(), &request[..]);
    }

    #[test]
    fn terminal_state_absorbs_events() {
        let (mut conn, _server) = connected_pair();
        assert_eq!(conn.on_peer_closed(), Next::Retire);
        assert_eq!(conn.state(), ConnState::Done);

        let mut scratch = [0u8; 8];
        assert_eq!(conn.on_error(), Next::Retire);
        assert_eq!(conn.on_writable(), Next::Retire);
        assert_eq!(conn.on_readable(&mut scratch), Next::Retire);
        assert_eq!(conn.state(), ConnState::Done);
    }

    #[test]
    fn refused_connect_fails() {
        let (listener, addr) = listener();
        drop(listener);

        let mut conn = match Connection::open(addr, 0, Bytes::from_static(REQUEST)) {
            Ok(conn) => conn,
            // refused synchronously
            Err(OpenError::ConnectInitiation { .. }) => return,
            Err(e) => panic!("unexpected open error: {e}"),
        };
        thread::sleep(Duration::from_millis(50));

        let next = conn.on_writable();
        assert_eq!(next, Next::Retire);
        assert_eq!(conn.state(), ConnState::Failed);
        assert!(conn.payload().is_empty());
    }
}
