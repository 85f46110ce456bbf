//! Configuration and limits for a WebSocket client connection.

use std::time::Duration;

/// Resource limits applied to incoming traffic.
///
/// These bound memory usage against misbehaving or hostile servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single incoming frame payload in bytes.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Maximum size of a complete message after fragment reassembly.
    ///
    /// Default: 64 MB
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 1024
    pub max_fragment_count: usize,

    /// Maximum size of the HTTP handshake response headers.
    ///
    /// Default: 8 KB
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 1024,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Create limits suitable for small embedded hosts.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
        }
    }
}

/// Client connection configuration.
///
/// Built with defaults via [`Config::new`] and customized with the
/// `with_*` methods before being handed to the socket.
#[derive(Debug, Clone)]
pub struct Config {
    /// Incoming traffic limits.
    pub limits: Limits,

    /// Fragmentation threshold for outgoing messages, in bytes.
    ///
    /// Payloads larger than this are split into continuation frames.
    ///
    /// Default: 64 KB
    pub fragment_size: usize,

    /// Subprotocols offered in `Sec-WebSocket-Protocol` (pure passthrough,
    /// no negotiation logic). Empty suppresses the header.
    ///
    /// Default: `chat, superchat`
    pub protocols: Vec<String>,

    /// Time allowed for the TCP connect, per resolved address.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Time allowed for the complete handshake response to arrive.
    ///
    /// Default: 10 seconds
    pub handshake_timeout: Duration,

    /// Sleep between worker loop ticks. Bounds callback and send latency.
    ///
    /// Default: 10 milliseconds
    pub tick_interval: Duration,

    /// Grace period after sending a close frame before the socket is
    /// forced shut.
    ///
    /// Default: 2 seconds
    pub close_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            fragment_size: 64 * 1024,
            protocols: vec!["chat".to_string(), "superchat".to_string()],
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_millis(10),
            close_grace: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Create a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the fragmentation threshold for outgoing messages.
    #[must_use]
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size.max(1);
        self
    }

    /// Set the offered subprotocols.
    #[must_use]
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the handshake response timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the worker tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the close grace period.
    #[must_use]
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }
}
