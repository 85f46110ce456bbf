//! # tetherws - Embeddable WebSocket Client
//!
//! `tetherws` is a client-side WebSocket library (RFC 6455) designed to be
//! embedded: a single background worker thread drives all I/O while the
//! host application interacts through a small, thread-safe handle.
//!
//! ## Features
//!
//! - **Callback delivery** on a dedicated worker thread, in server order
//! - **Full client-role RFC 6455 framing** with strict validation
//! - **Thread-safe sends** that never block on socket I/O
//! - **Queue-until-open** semantics for messages sent before the
//!   handshake completes
//! - **Bounded resources** via configurable frame/message limits
//!
//! Plaintext `ws://` only; requesting `wss://` yields a dedicated error so
//! hosts can detect the missing transport.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tetherws::Socket;
//!
//! let mut socket = Socket::new();
//! socket.set_url("ws://127.0.0.1:9001/echo").unwrap();
//! socket.on_connected(|session| {
//!     session.send_text("hello");
//! });
//! socket.on_text(|_session, bytes| {
//!     println!("echo: {}", String::from_utf8_lossy(bytes));
//! });
//! socket.on_disconnected(|_session| println!("done"));
//! socket.connect().unwrap();
//! // ... later:
//! socket.disconnect_and_release();
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod protocol;
pub mod socket;

pub use config::{Config, Limits};
pub use connection::SessionState;
pub use endpoint::Endpoint;
pub use error::{Error, ErrorKind, Result};
pub use message::{CloseCode, CloseFrame};
pub use protocol::{Frame, OpCode};
pub use socket::{Session, Socket};
