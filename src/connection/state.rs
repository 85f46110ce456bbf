//! Connection lifecycle states and host-to-worker commands.

/// Lifecycle state of a socket handle.
///
/// A handle starts `Idle`, moves through `Connecting` and `Handshaking`
/// while the worker establishes the session, spends its useful life in
/// `Open`, and ends in `Closed`. The transition to `Closed` happens at
/// most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum SessionState {
    /// No worker started; configuration is still mutable.
    #[default]
    Idle,
    /// The worker is resolving the host and connecting the TCP stream.
    Connecting,
    /// The upgrade request is out; awaiting and validating the response.
    Handshaking,
    /// Session established; messages flow in both directions.
    Open,
    /// A close frame has been sent or received; draining the close exchange.
    Closing,
    /// Terminal. The worker has exited.
    Closed,
}

impl SessionState {
    /// Whether a worker thread exists in this state.
    #[must_use]
    #[inline]
    pub const fn has_worker(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Handshaking
                | SessionState::Open
                | SessionState::Closing
        )
    }

    /// Whether the session is established and data frames may flow.
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    /// Whether the state is terminal.
    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Single-slot directive from the host to the worker.
///
/// Written under the work mutex; the worker snapshots it once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Command {
    /// Nothing requested.
    #[default]
    None,
    /// Begin a graceful close: send a close frame, drain, disconnect.
    Disconnect,
    /// Tear down immediately without invoking further callbacks. Set when
    /// the host releases a handle whose session never opened or already
    /// ended.
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_has_worker_per_state() {
        assert!(!SessionState::Idle.has_worker());
        assert!(SessionState::Connecting.has_worker());
        assert!(SessionState::Handshaking.has_worker());
        assert!(SessionState::Open.has_worker());
        assert!(SessionState::Closing.has_worker());
        assert!(!SessionState::Closed.has_worker());
    }

    #[test]
    fn test_is_open_only_when_open() {
        assert!(SessionState::Open.is_open());
        for state in [
            SessionState::Idle,
            SessionState::Connecting,
            SessionState::Handshaking,
            SessionState::Closing,
            SessionState::Closed,
        ] {
            assert!(!state.is_open(), "{state}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Handshaking.to_string(), "handshaking");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_command_default() {
        assert_eq!(Command::default(), Command::None);
    }
}
