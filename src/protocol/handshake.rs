//! Client-side opening handshake (RFC 6455 Section 4).
//!
//! Builds the HTTP/1.1 Upgrade request and validates the server response,
//! including the `Sec-WebSocket-Accept` challenge.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha1::{Digest, Sha1};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// The GUID appended to the key in the `Sec-WebSocket-Accept` calculation.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Generate a `Sec-WebSocket-Key`: 16 random bytes, base64-encoded.
///
/// Falls back to a clock-seeded generator if the OS entropy source is
/// unavailable.
#[must_use]
pub fn generate_key() -> String {
    let mut nonce = [0u8; 16];
    if getrandom::getrandom(&mut nonce).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let mut seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        for byte in &mut nonce {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            *byte = seed as u8;
        }
    }
    BASE64.encode(nonce)
}

/// Compute the expected `Sec-WebSocket-Accept` value for a key.
///
/// The accept value is `base64(SHA1(key + GUID))`.
///
/// # Example
///
/// ```
/// use tetherws::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Locate the end of the HTTP response head (`\r\n\r\n`).
///
/// Returns the index one past the terminator, i.e. the offset of the first
/// byte of the frame stream.
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

/// State of one opening handshake attempt.
///
/// The expected accept value is computed at construction time, before the
/// request goes out, so response validation is a pure comparison.
#[derive(Debug)]
pub struct ClientHandshake {
    key: String,
    expected_accept: String,
}

impl ClientHandshake {
    /// Start a handshake with a freshly generated key.
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(generate_key())
    }

    /// Start a handshake with a caller-supplied key (used by tests).
    #[must_use]
    pub fn with_key(key: String) -> Self {
        let expected_accept = compute_accept_key(&key);
        Self {
            key,
            expected_accept,
        }
    }

    /// The `Sec-WebSocket-Accept` value the server must return.
    #[must_use]
    pub fn expected_accept(&self) -> &str {
        &self.expected_accept
    }

    /// Build the upgrade request for `endpoint`, offering `protocols`.
    ///
    /// The port is omitted from `Host` and `Origin` when it equals the
    /// scheme default.
    #[must_use]
    pub fn request(&self, endpoint: &Endpoint, protocols: &[String]) -> Vec<u8> {
        let mut out = String::with_capacity(256);
        out.push_str(&format!("GET {} HTTP/1.1\r\n", endpoint.path()));
        out.push_str(&format!("Host: {}\r\n", endpoint.host_header()));
        out.push_str("Upgrade: websocket\r\n");
        out.push_str("Connection: Upgrade\r\n");
        out.push_str(&format!("Origin: {}\r\n", endpoint.origin()));
        out.push_str(&format!("Sec-WebSocket-Key: {}\r\n", self.key));
        if !protocols.is_empty() {
            out.push_str(&format!(
                "Sec-WebSocket-Protocol: {}\r\n",
                protocols.join(", ")
            ));
        }
        out.push_str("Sec-WebSocket-Version: 13\r\n");
        out.push_str("\r\n");
        out.into_bytes()
    }

    /// Validate the response head (everything up to and including
    /// `\r\n\r\n`).
    ///
    /// # Errors
    ///
    /// [`Error::ParseHandshake`] if:
    /// - the head is not valid UTF-8 or the status line is malformed;
    /// - the status is not `101` (the parsed status is attached);
    /// - `Upgrade: websocket` or `Connection: Upgrade` is missing
    ///   (case-insensitive match);
    /// - `Sec-WebSocket-Accept` is missing or differs from the expected
    ///   value (byte-exact after trimming).
    pub fn validate_response(&self, head: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(head)
            .map_err(|_| Error::handshake("response head is not valid UTF-8"))?;

        let mut lines = text.lines();
        let status_line = lines
            .next()
            .ok_or_else(|| Error::handshake("empty response"))?;

        let status = parse_status_line(status_line)?;
        if status != 101 {
            return Err(Error::handshake_status(
                status,
                format!("expected 101 Switching Protocols, got {status}"),
            ));
        }

        let headers = parse_headers(lines);

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::handshake_status(status, "missing Upgrade header"))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::handshake_status(
                status,
                format!("invalid Upgrade header: {upgrade}"),
            ));
        }

        let connection = headers
            .get("connection")
            .ok_or_else(|| Error::handshake_status(status, "missing Connection header"))?;
        if !connection.to_ascii_lowercase().contains("upgrade") {
            return Err(Error::handshake_status(
                status,
                format!("invalid Connection header: {connection}"),
            ));
        }

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::handshake_status(status, "missing Sec-WebSocket-Accept header"))?;
        if accept != &self.expected_accept {
            return Err(Error::handshake_status(
                status,
                "Sec-WebSocket-Accept mismatch",
            ));
        }

        Ok(())
    }
}

impl Default for ClientHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `HTTP/1.1 <code> <reason>` into the status code.
fn parse_status_line(line: &str) -> Result<u16> {
    let rest = line
        .strip_prefix("HTTP/1.1 ")
        .ok_or_else(|| Error::handshake(format!("malformed status line: {line}")))?;
    let code = rest.split_whitespace().next().unwrap_or("");
    code.parse()
        .map_err(|_| Error::handshake(format!("malformed status line: {line}")))
}

/// Collect header lines into a map keyed by lowercased name, values trimmed.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    headers
}
