//! Public handle API: configure, connect, send, and release a WebSocket
//! client instance.
//!
//! A [`Socket`] is configured while idle, then [`Socket::connect`] spawns
//! the background worker that owns all I/O. From that point the handle is
//! a thin, thread-safe front: sends go through the shared queue, state and
//! error queries take a short lock, and [`Socket::disconnect_and_release`]
//! posts a command and returns without blocking.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::connection::queue::SendQueue;
use crate::connection::state::{Command, SessionState};
use crate::connection::worker::Worker;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Fields guarded by the work mutex: lifecycle state and the single-slot
/// host-to-worker command.
pub(crate) struct WorkState {
    pub(crate) state: SessionState,
    pub(crate) command: Command,
}

/// State shared between the handle, sessions, and the worker.
///
/// Lock order when both mutexes are needed: work, then send (the queue's
/// internal mutex). The worker never holds both.
pub(crate) struct Shared {
    pub(crate) work: Mutex<WorkState>,
    pub(crate) queue: SendQueue,
    error: Mutex<Option<Error>>,
}

impl Shared {
    fn new(fragment_size: usize) -> Self {
        Self {
            work: Mutex::new(WorkState {
                state: SessionState::Idle,
                command: Command::None,
            }),
            queue: SendQueue::new(fragment_size),
            error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.work.lock().state
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.work.lock().state = state;
    }

    /// Read the current state and consume the pending command.
    pub(crate) fn snapshot(&self) -> (SessionState, Command) {
        let mut work = self.work.lock();
        let command = work.command;
        work.command = Command::None;
        (work.state, command)
    }

    pub(crate) fn store_error(&self, error: Error) {
        *self.error.lock() = Some(error);
    }

    fn clear_error(&self) {
        *self.error.lock() = None;
    }

    pub(crate) fn last_error(&self) -> Option<Error> {
        self.error.lock().clone()
    }
}

type SessionFn = Box<dyn FnMut(&Session) + Send>;
type TextFn = Box<dyn FnMut(&Session, &[u8]) + Send>;
type BinaryFn = Box<dyn FnMut(&Session, &[u8], bool) + Send>;

/// Host-provided callbacks, moved onto the worker thread at connect time.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) on_connected: Option<SessionFn>,
    pub(crate) on_disconnected: Option<SessionFn>,
    pub(crate) on_text: Option<TextFn>,
    pub(crate) on_binary: Option<BinaryFn>,
}

/// Connection context passed to every callback.
///
/// A `Session` can send and query but deliberately cannot release the
/// handle: callbacks run on the worker thread, and tearing the worker down
/// from inside one of its own callbacks is not permitted.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Enqueue a text message. Returns `true` iff the message was queued.
    pub fn send_text(&self, text: &str) -> bool {
        self.shared.queue.push_message(OpCode::Text, text.as_bytes())
    }

    /// Enqueue a binary message. Returns `true` iff the message was queued.
    pub fn send_binary(&self, data: &[u8]) -> bool {
        self.shared.queue.push_message(OpCode::Binary, data)
    }

    /// Whether the session is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.queue.is_connected()
    }

    /// Most recent error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.shared.last_error()
    }
}

/// Pre-connect configuration, consumed when the worker is spawned.
struct Setup {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    config: Config,
    callbacks: Callbacks,
}

impl Setup {
    fn new() -> Self {
        Self {
            scheme: None,
            host: None,
            port: None,
            path: None,
            config: Config::default(),
            callbacks: Callbacks::default(),
        }
    }
}

/// A client WebSocket handle.
///
/// Created idle, configured with the setters, connected once, and finally
/// released. All methods are safe to call from any thread; none of them
/// performs I/O. Write failures surface as
/// [`ErrorKind::ReadWriteSocket`](crate::ErrorKind::ReadWriteSocket)
/// errors (the Rust runtime already ignores `SIGPIPE` process-wide).
///
/// # Example
///
/// ```no_run
/// use tetherws::Socket;
///
/// let mut socket = Socket::new();
/// socket.set_url("ws://127.0.0.1:9001/echo").unwrap();
/// socket.on_connected(|session| {
///     session.send_text("hello");
/// });
/// socket.on_text(|_session, bytes| {
///     println!("received: {}", String::from_utf8_lossy(bytes));
/// });
/// socket.on_disconnected(|session| {
///     if let Some(err) = session.last_error() {
///         eprintln!("dropped: {err}");
///     }
/// });
/// socket.connect().unwrap();
/// ```
pub struct Socket {
    shared: Arc<Shared>,
    // Mutex only so the handle is `Sync`; setters take `&mut self` and the
    // contents move to the worker at connect time.
    setup: Mutex<Option<Setup>>,
}

impl Socket {
    /// Create a new handle in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new(Config::default().fragment_size)),
            setup: Mutex::new(Some(Setup::new())),
        }
    }

    /// Set every URL component at once by parsing `ws://host[:port]/path`.
    ///
    /// Ignored after `connect`.
    ///
    /// # Errors
    ///
    /// The parse errors of [`Endpoint::parse`].
    pub fn set_url(&mut self, url: &str) -> Result<()> {
        let Some(setup) = self.setup.get_mut().as_mut() else {
            return Ok(());
        };
        let endpoint = Endpoint::parse(url)?;
        setup.scheme = Some(endpoint.scheme().to_string());
        setup.host = Some(endpoint.host().to_string());
        setup.port = Some(endpoint.port());
        setup.path = Some(endpoint.path().to_string());
        Ok(())
    }

    /// Set the URL scheme. Ignored after `connect`.
    pub fn set_scheme(&mut self, scheme: &str) {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.scheme = Some(scheme.to_string());
        }
    }

    /// Set the host. Ignored after `connect`.
    pub fn set_host(&mut self, host: &str) {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.host = Some(host.to_string());
        }
    }

    /// Set the port. Ignored after `connect`.
    pub fn set_port(&mut self, port: u16) {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.port = Some(port);
        }
    }

    /// Set the request path. Ignored after `connect`.
    pub fn set_path(&mut self, path: &str) {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.path = Some(path.to_string());
        }
    }

    /// Replace the connection configuration. Ignored after `connect`.
    pub fn set_config(&mut self, config: Config) {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            self.shared.queue.set_fragment_size(config.fragment_size);
            setup.config = config;
        }
    }

    /// Configured scheme, if any.
    #[must_use]
    pub fn scheme(&self) -> Option<String> {
        self.setup.lock().as_ref().and_then(|s| s.scheme.clone())
    }

    /// Configured host, if any.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        self.setup.lock().as_ref().and_then(|s| s.host.clone())
    }

    /// Configured port, if any.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.setup.lock().as_ref().and_then(|s| s.port)
    }

    /// Configured path, if any.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.setup.lock().as_ref().and_then(|s| s.path.clone())
    }

    /// Install the callback invoked once the handshake completes.
    /// Ignored after `connect`.
    pub fn on_connected<F>(&mut self, callback: F)
    where
        F: FnMut(&Session) + Send + 'static,
    {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.callbacks.on_connected = Some(Box::new(callback));
        }
    }

    /// Install the callback invoked exactly once after any terminal
    /// transition; `last_error` is queryable from inside it. Required by
    /// `connect`. Ignored after `connect`.
    pub fn on_disconnected<F>(&mut self, callback: F)
    where
        F: FnMut(&Session) + Send + 'static,
    {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.callbacks.on_disconnected = Some(Box::new(callback));
        }
    }

    /// Install the callback for reassembled text messages. The payload is
    /// UTF-8 per RFC 6455, but validation is the host's responsibility.
    /// Ignored after `connect`.
    pub fn on_text<F>(&mut self, callback: F)
    where
        F: FnMut(&Session, &[u8]) + Send + 'static,
    {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.callbacks.on_text = Some(Box::new(callback));
        }
    }

    /// Install the callback for binary messages. This build delivers one
    /// call per fully-reassembled message with `is_final` always `true`.
    /// Ignored after `connect`.
    pub fn on_binary<F>(&mut self, callback: F)
    where
        F: FnMut(&Session, &[u8], bool) + Send + 'static,
    {
        if let Some(setup) = self.setup.get_mut().as_mut() {
            setup.callbacks.on_binary = Some(Box::new(callback));
        }
    }

    /// Validate the configuration and spawn the background worker.
    ///
    /// # Errors
    ///
    /// - [`Error::MissedParameter`] when the scheme, host, port, path, or
    ///   `on_disconnected` callback is missing or malformed.
    /// - [`Error::TlsNotSupported`] for a `wss` scheme.
    /// - [`Error::Connect`] when called more than once or when the OS
    ///   refuses to spawn the worker thread.
    ///
    /// Validation errors are also stored and visible via `last_error`.
    pub fn connect(&mut self) -> Result<()> {
        let Some(setup) = self.setup.get_mut().take() else {
            return Err(Error::Connect("connect already attempted".into()));
        };

        self.shared.clear_error();

        let endpoint = match Endpoint::from_parts(
            setup.scheme.as_deref(),
            setup.host.as_deref(),
            setup.port,
            setup.path.as_deref(),
        ) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                self.shared.store_error(err.clone());
                *self.setup.get_mut() = Some(setup);
                return Err(err);
            }
        };

        if setup.callbacks.on_disconnected.is_none() {
            let err = Error::MissedParameter("on_disconnected callback");
            self.shared.store_error(err.clone());
            *self.setup.get_mut() = Some(setup);
            return Err(err);
        }

        self.shared.queue.set_fragment_size(setup.config.fragment_size);
        self.shared.set_state(SessionState::Connecting);
        debug!(endpoint = %endpoint, "starting worker");

        let worker = Worker::new(
            Arc::clone(&self.shared),
            endpoint,
            setup.config,
            setup.callbacks,
        );
        let spawned = thread::Builder::new()
            .name("tetherws-worker".into())
            .spawn(move || worker.run());

        if let Err(io_err) = spawned {
            let err = Error::Connect(format!("failed to spawn worker: {io_err}"));
            self.shared.queue.mark_closed();
            self.shared.set_state(SessionState::Closed);
            self.shared.store_error(err.clone());
            return Err(err);
        }

        Ok(())
    }

    /// Enqueue a text message. Returns `true` iff the message was queued;
    /// messages queued before the connection opens are flushed once it
    /// does.
    pub fn send_text(&self, text: &str) -> bool {
        self.shared.queue.push_message(OpCode::Text, text.as_bytes())
    }

    /// Enqueue a binary message. Returns `true` iff the message was queued.
    pub fn send_binary(&self, data: &[u8]) -> bool {
        self.shared.queue.push_message(OpCode::Binary, data)
    }

    /// Whether the session is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.queue.is_connected()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Most recent error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.shared.last_error()
    }

    /// Release the handle.
    ///
    /// Non-blocking: posts a command and returns. An open session closes
    /// gracefully and still receives its `on_disconnected` callback; a
    /// session that is not open (never connected, already closing, or
    /// already ended) is torn down silently. Shared resources are freed
    /// when the worker drops its reference.
    pub fn disconnect_and_release(self) {
        let mut work = self.shared.work.lock();
        self.shared.queue.clear();
        match work.state {
            SessionState::Open => {
                work.command = Command::Disconnect;
            }
            SessionState::Connecting | SessionState::Handshaking | SessionState::Closing => {
                work.command = Command::End;
            }
            SessionState::Idle | SessionState::Closed => {}
        }
    }
}

impl Default for Socket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_new_socket_is_idle() {
        let socket = Socket::new();
        assert_eq!(socket.state(), SessionState::Idle);
        assert!(!socket.is_connected());
        assert!(socket.last_error().is_none());
    }

    #[test]
    fn test_set_url_fills_components() {
        let mut socket = Socket::new();
        socket.set_url("ws://example.com:8080/chat").unwrap();
        assert_eq!(socket.scheme().as_deref(), Some("ws"));
        assert_eq!(socket.host().as_deref(), Some("example.com"));
        assert_eq!(socket.port(), Some(8080));
        assert_eq!(socket.path().as_deref(), Some("/chat"));
    }

    #[test]
    fn test_individual_setters() {
        let mut socket = Socket::new();
        socket.set_scheme("ws");
        socket.set_host("example.com");
        socket.set_port(9001);
        socket.set_path("/stream");
        assert_eq!(socket.host().as_deref(), Some("example.com"));
        assert_eq!(socket.port(), Some(9001));
    }

    #[test]
    fn test_connect_requires_parameters() {
        let mut socket = Socket::new();
        socket.on_disconnected(|_| {});

        let err = socket.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissedParameter);
        assert_eq!(socket.last_error(), Some(err));
        assert_eq!(socket.state(), SessionState::Idle);
    }

    #[test]
    fn test_connect_requires_disconnect_callback() {
        let mut socket = Socket::new();
        socket.set_url("ws://example.com/chat").unwrap();

        let err = socket.connect().unwrap_err();
        assert_eq!(err, Error::MissedParameter("on_disconnected callback"));
    }

    #[test]
    fn test_connect_rejects_wss() {
        let mut socket = Socket::new();
        let err = socket.set_url("wss://example.com/chat").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TlsNotSupported);

        socket.set_scheme("wss");
        socket.set_host("example.com");
        socket.set_port(443);
        socket.set_path("/chat");
        socket.on_disconnected(|_| {});
        let err = socket.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TlsNotSupported);
    }

    #[test]
    fn test_send_queues_before_connect() {
        let socket = Socket::new();
        assert!(socket.send_text("early"));
        assert!(socket.send_binary(&[1, 2, 3]));
        assert_eq!(socket.shared.queue.len(), 2);
    }

    #[test]
    fn test_release_idle_handle_is_noop() {
        let socket = Socket::new();
        let shared = Arc::clone(&socket.shared);
        socket.disconnect_and_release();
        assert_eq!(shared.state(), SessionState::Idle);
        assert_eq!(shared.snapshot().1, Command::None);
    }

    #[test]
    fn test_release_posts_disconnect_when_open() {
        let socket = Socket::new();
        let shared = Arc::clone(&socket.shared);
        shared.set_state(SessionState::Open);

        socket.disconnect_and_release();
        let (state, command) = shared.snapshot();
        assert_eq!(state, SessionState::Open);
        assert_eq!(command, Command::Disconnect);
    }

    #[test]
    fn test_release_posts_end_while_connecting() {
        let socket = Socket::new();
        let shared = Arc::clone(&socket.shared);
        shared.set_state(SessionState::Connecting);

        socket.disconnect_and_release();
        assert_eq!(shared.snapshot().1, Command::End);
    }

    #[test]
    fn test_release_posts_end_while_closing() {
        // A close exchange is already in flight; release must tear down
        // silently, not re-request the disconnect.
        let socket = Socket::new();
        let shared = Arc::clone(&socket.shared);
        shared.set_state(SessionState::Closing);

        socket.disconnect_and_release();
        assert_eq!(shared.snapshot().1, Command::End);
    }

    #[test]
    fn test_snapshot_consumes_command() {
        let shared = Shared::new(1024);
        shared.work.lock().command = Command::Disconnect;

        assert_eq!(shared.snapshot().1, Command::Disconnect);
        assert_eq!(shared.snapshot().1, Command::None);
    }

    #[test]
    fn test_session_send_and_query() {
        let shared = Arc::new(Shared::new(1024));
        let session = Session::new(Arc::clone(&shared));

        assert!(session.send_text("from callback"));
        assert_eq!(shared.queue.len(), 1);
        assert!(!session.is_connected());

        shared.store_error(Error::Connect("refused".into()));
        assert_eq!(session.last_error().unwrap().kind(), ErrorKind::Connect);
    }
}
