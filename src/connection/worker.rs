//! Background worker: one thread per handle, driving connect, handshake,
//! the open-session pump, and the close exchange.
//!
//! The worker is the only code that touches the socket, the receive
//! buffer, and the fragment assembler. It observes the host through two
//! narrow channels: the command slot (snapshotted once per tick under the
//! work mutex) and the send queue. Callbacks are invoked inline on this
//! thread, in server-delivery order.

use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::connection::state::{Command, SessionState};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::{decode_next, ClientHandshake, Frame, FrameValidator, MessageAssembler, OpCode};
use crate::socket::{Callbacks, Session, Shared};

/// Frames drained from the send queue per tick.
const SEND_BATCH: usize = 8;

/// Poll interval for the blocking handshake read.
const HANDSHAKE_POLL: Duration = Duration::from_millis(50);

/// A frame write cut short by the socket; resumes next tick.
struct PartialWrite {
    buf: Vec<u8>,
    offset: usize,
}

/// How the open-session pump ended.
enum PumpOutcome {
    /// Close exchange finished (or timed out) without error.
    Clean,
    /// The host released the handle; exit without callbacks.
    End,
    /// I/O or protocol failure.
    Failed(Error),
}

pub(crate) struct Worker {
    shared: Arc<Shared>,
    endpoint: Endpoint,
    config: Config,
    callbacks: Callbacks,
    session: Session,
    recv_buf: BytesMut,
    assembler: MessageAssembler,
    validator: FrameValidator,
    pending: Option<PartialWrite>,
    close_enqueued: bool,
    close_received: bool,
    close_deadline: Option<Instant>,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        endpoint: Endpoint,
        config: Config,
        callbacks: Callbacks,
    ) -> Self {
        let session = Session::new(Arc::clone(&shared));
        let assembler = MessageAssembler::new(config.limits.clone());
        let validator = FrameValidator::new(config.limits.clone());
        Self {
            shared,
            endpoint,
            config,
            callbacks,
            session,
            recv_buf: BytesMut::new(),
            assembler,
            validator,
            pending: None,
            close_enqueued: false,
            close_received: false,
            close_deadline: None,
        }
    }

    /// Worker entry point. Consumes the worker; the shared state outlives
    /// it through the `Arc`.
    pub(crate) fn run(mut self) {
        debug!(endpoint = %self.endpoint, "worker started");

        let stream = match self.establish() {
            Ok(Some(stream)) => stream,
            Ok(None) => return self.teardown_silent(),
            Err(err) => return self.finish(Some(err)),
        };

        match self.pump(stream) {
            PumpOutcome::Clean => self.finish(None),
            PumpOutcome::End => self.teardown_silent(),
            PumpOutcome::Failed(err) => self.finish(Some(err)),
        }
    }

    /// Whether the host released the handle; consumes the command slot.
    fn end_requested(&self) -> bool {
        self.shared.snapshot().1 == Command::End
    }

    /// Resolve, connect, and complete the opening handshake.
    ///
    /// Returns `Ok(None)` when the host released the handle mid-setup.
    fn establish(&mut self) -> Result<Option<TcpStream>> {
        let stream = match self.connect_tcp()? {
            Some(stream) => stream,
            None => return Ok(None),
        };

        self.shared.set_state(SessionState::Handshaking);
        debug!(endpoint = %self.endpoint, "tcp connected, handshaking");

        let Some(stream) = self.upgrade(stream)? else {
            return Ok(None);
        };

        self.shared.set_state(SessionState::Open);
        self.shared.queue.set_connected(true);
        debug!(endpoint = %self.endpoint, "session open");

        if let Some(on_connected) = self.callbacks.on_connected.as_mut() {
            on_connected(&self.session);
        }

        Ok(Some(stream))
    }

    /// Resolve the authority and connect, trying each address in turn.
    fn connect_tcp(&self) -> Result<Option<TcpStream>> {
        let authority = self.endpoint.authority();
        let addrs: Vec<_> = authority
            .to_socket_addrs()
            .map_err(|e| Error::Connect(format!("resolving {}: {e}", self.endpoint.host())))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::Connect(format!(
                "no addresses for {}",
                self.endpoint.host()
            )));
        }

        let mut last_err = None;
        for addr in addrs {
            if self.end_requested() {
                return Ok(None);
            }
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(Some(stream));
                }
                Err(e) => {
                    trace!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(Error::Connect(e.to_string())),
            None => Err(Error::Connect("connect cancelled".into())),
        }
    }

    /// Send the upgrade request and validate the response. Bytes past the
    /// header terminator stay in the receive buffer as the head of the
    /// frame stream.
    fn upgrade(&mut self, mut stream: TcpStream) -> Result<Option<TcpStream>> {
        let handshake = ClientHandshake::new();
        let request = handshake.request(&self.endpoint, &self.config.protocols);
        stream.write_all(&request)?;

        stream.set_read_timeout(Some(HANDSHAKE_POLL))?;

        let deadline = Instant::now() + self.config.handshake_timeout;
        let mut head = Vec::new();
        let mut scratch = [0u8; 4096];

        let head_end = loop {
            if self.end_requested() {
                return Ok(None);
            }
            if let Some(end) = crate::protocol::handshake::find_header_end(&head) {
                break end;
            }
            if head.len() > self.config.limits.max_handshake_size {
                return Err(Error::handshake("response headers too large"));
            }
            if Instant::now() >= deadline {
                return Err(Error::handshake("timed out waiting for response"));
            }

            match stream.read(&mut scratch) {
                Ok(0) => return Err(Error::handshake("connection closed during handshake")),
                Ok(n) => head.extend_from_slice(&scratch[..n]),
                Err(e)
                    if e.kind() == IoErrorKind::WouldBlock
                        || e.kind() == IoErrorKind::TimedOut => {}
                Err(e) if e.kind() == IoErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        };

        handshake.validate_response(&head[..head_end])?;
        self.recv_buf.extend_from_slice(&head[head_end..]);

        stream.set_read_timeout(None)?;
        stream.set_nonblocking(true)?;
        Ok(Some(stream))
    }

    /// The open-session loop: one tick per `tick_interval`.
    fn pump(&mut self, mut stream: TcpStream) -> PumpOutcome {
        let mut scratch = [0u8; 8192];

        // Frames the server bundled with its handshake response.
        if let Err(err) = self.decode_available() {
            return PumpOutcome::Failed(err);
        }

        loop {
            let (state, command) = self.shared.snapshot();
            match command {
                Command::End => return PumpOutcome::End,
                Command::Disconnect if state.is_open() => {
                    debug!("host requested disconnect");
                    self.begin_close(None);
                }
                Command::Disconnect | Command::None => {}
            }

            if let Err(err) = self.flush_sends(&mut stream) {
                return PumpOutcome::Failed(err);
            }

            match self.drain_reads(&mut stream, &mut scratch) {
                Ok(true) => {}
                Ok(false) => {
                    // Peer FIN. Clean when a close exchange was in
                    // progress, abnormal otherwise.
                    if self.shared.state() == SessionState::Closing {
                        return PumpOutcome::Clean;
                    }
                    return PumpOutcome::Failed(Error::ReadWriteSocket(
                        "peer closed the connection unexpectedly".into(),
                    ));
                }
                Err(err) => return PumpOutcome::Failed(err),
            }

            if self.shared.state() == SessionState::Closing {
                let flushed = self.close_enqueued
                    && self.pending.is_none()
                    && self.shared.queue.len() == 0;
                if flushed && self.close_received {
                    return PumpOutcome::Clean;
                }
                if self.close_deadline.is_some_and(|d| Instant::now() >= d) {
                    debug!("close grace period elapsed, forcing shutdown");
                    return PumpOutcome::Clean;
                }
            }

            thread::sleep(self.config.tick_interval);
        }
    }

    /// Enter the closing state, enqueueing our close frame.
    fn begin_close(&mut self, reply_to: Option<CloseFrame>) {
        if self.close_enqueued {
            return;
        }
        let close = reply_to.map(|peer| CloseFrame::new(peer.code, String::new()));
        self.shared.queue.push_frame(&Frame::close(close));
        self.close_enqueued = true;
        self.close_deadline = Some(Instant::now() + self.config.close_grace);
        self.shared.queue.set_connected(false);
        self.shared.set_state(SessionState::Closing);
    }

    /// Drain up to `SEND_BATCH` frames onto the socket, resuming any
    /// partial write first. The send mutex is never held across a write.
    fn flush_sends(&mut self, stream: &mut TcpStream) -> Result<()> {
        if let Some(partial) = self.pending.take() {
            if let Some(still) = write_some(stream, partial)? {
                self.pending = Some(still);
                return Ok(());
            }
        }

        for _ in 0..SEND_BATCH {
            let Some(buf) = self.shared.queue.pop_front() else {
                break;
            };
            trace!(bytes = buf.len(), "writing frame");
            let partial = PartialWrite { buf, offset: 0 };
            if let Some(still) = write_some(stream, partial)? {
                self.pending = Some(still);
                break;
            }
        }
        Ok(())
    }

    /// Read whatever the socket has, decoding and dispatching frames.
    ///
    /// Returns `Ok(false)` on peer FIN.
    fn drain_reads(&mut self, stream: &mut TcpStream, scratch: &mut [u8]) -> Result<bool> {
        loop {
            match stream.read(scratch) {
                Ok(0) => {
                    self.decode_available()?;
                    return Ok(false);
                }
                Ok(n) => {
                    self.recv_buf.extend_from_slice(&scratch[..n]);
                    self.decode_available()?;
                }
                Err(e) if e.kind() == IoErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == IoErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Decode every complete frame in the receive buffer.
    fn decode_available(&mut self) -> Result<()> {
        while let Some(frame) = decode_next(&mut self.recv_buf, &self.validator)? {
            self.dispatch(frame)?;
        }
        Ok(())
    }

    /// Route one validated incoming frame.
    fn dispatch(&mut self, frame: Frame) -> Result<()> {
        trace!(opcode = %frame.opcode, len = frame.payload().len(), fin = frame.fin, "frame received");
        match frame.opcode {
            OpCode::Close => {
                let close = frame.close_frame()?;
                debug!(code = close.as_ref().map(|c| c.code.as_u16()), "close frame received");
                self.close_received = true;
                if self.shared.state().is_open() {
                    self.begin_close(close);
                }
                Ok(())
            }
            OpCode::Ping => {
                trace!("answering ping");
                self.shared.queue.push_frame(&Frame::pong(frame.into_payload()));
                Ok(())
            }
            OpCode::Pong => Ok(()),
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                let Some(message) = self.assembler.push(frame)? else {
                    return Ok(());
                };
                match message.opcode {
                    OpCode::Text => {
                        if let Some(on_text) = self.callbacks.on_text.as_mut() {
                            on_text(&self.session, &message.payload);
                        }
                    }
                    _ => {
                        if let Some(on_binary) = self.callbacks.on_binary.as_mut() {
                            on_binary(&self.session, &message.payload, true);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Terminal transition with callbacks: store the error, mark the
    /// queue closed, move to `Closed`, fire `on_disconnected` once.
    fn finish(&mut self, error: Option<Error>) {
        match &error {
            Some(err) => warn!(endpoint = %self.endpoint, error = %err, "session ended with error"),
            None => debug!(endpoint = %self.endpoint, "session ended"),
        }

        self.shared.queue.mark_closed();
        if let Some(err) = error {
            self.shared.store_error(err);
        }
        self.shared.set_state(SessionState::Closed);

        if let Some(on_disconnected) = self.callbacks.on_disconnected.as_mut() {
            on_disconnected(&self.session);
        }
    }

    /// Terminal transition without callbacks, for a released handle.
    fn teardown_silent(&mut self) {
        debug!(endpoint = %self.endpoint, "released by host, tearing down");
        self.shared.queue.mark_closed();
        self.shared.set_state(SessionState::Closed);
    }
}

/// Write as much of a frame as the socket accepts.
///
/// Returns the remaining portion when the write was cut short.
fn write_some(stream: &mut TcpStream, mut partial: PartialWrite) -> Result<Option<PartialWrite>> {
    while partial.offset < partial.buf.len() {
        match stream.write(&partial.buf[partial.offset..]) {
            Ok(0) => return Ok(Some(partial)),
            Ok(n) => partial.offset += n,
            Err(e) if e.kind() == IoErrorKind::WouldBlock => return Ok(Some(partial)),
            Err(e) if e.kind() == IoErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}
