//! WebSocket frame parsing and serialization (RFC 6455 Section 5).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                         Masking key (if present)              |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::opcode::OpCode;
use crate::protocol::validation::FrameValidator;

/// Maximum payload size for control frames (RFC 6455 Section 5.5).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Fixed header fields, decoded ahead of the payload.
#[derive(Debug, Clone)]
struct RawHeader {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    header_len: usize,
}

/// Decode the frame header from the front of `buf`.
///
/// Returns `Ok(None)` while the buffer is shorter than the fixed header,
/// the extended length field, or the masking key.
fn parse_header(buf: &[u8]) -> Result<Option<RawHeader>> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let fin = (byte0 & 0x80) != 0;
    let rsv1 = (byte0 & 0x40) != 0;
    let rsv2 = (byte0 & 0x20) != 0;
    let rsv3 = (byte0 & 0x10) != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = (byte1 & 0x80) != 0;
    let len_selector = byte1 & 0x7F;

    let (payload_len, len_end) = match len_selector {
        0..=125 => (len_selector as usize, 2),
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let len = u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]);
            let len = usize::try_from(len)
                .map_err(|_| Error::protocol(format!("frame length {len} exceeds platform")))?;
            (len, 10)
        }
        _ => unreachable!(),
    };

    let header_len = if masked { len_end + 4 } else { len_end };
    if buf.len() < header_len {
        return Ok(None);
    }

    let mask = masked.then(|| [buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]]);

    Ok(Some(RawHeader {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        mask,
        payload_len,
        header_len,
    }))
}

/// A single WebSocket frame.
///
/// Frames built by this library are unmasked at construction; the masking
/// key is applied by [`Frame::encode`] at serialization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1. Zero without a negotiated extension.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with the given finality, opcode, and payload.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload,
        }
    }

    /// Create an unfragmented text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create an unfragmented binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Create a close frame, optionally carrying a status code and reason.
    #[must_use]
    pub fn close(close: Option<CloseFrame>) -> Self {
        let payload = match close {
            Some(close) => {
                let mut data = close.code.as_u16().to_be_bytes().to_vec();
                data.extend_from_slice(close.reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Decode the close code and reason from a close frame's payload.
    ///
    /// # Errors
    ///
    /// A one-byte payload is a protocol error: the status code occupies
    /// the first two bytes when present at all.
    pub fn close_frame(&self) -> Result<Option<CloseFrame>> {
        match self.payload.len() {
            0 => Ok(None),
            1 => Err(Error::protocol("close frame with 1-byte payload")),
            _ => {
                let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
                let reason = String::from_utf8_lossy(&self.payload[2..]).into_owned();
                Ok(Some(CloseFrame::new(CloseCode::from_u16(code), reason)))
            }
        }
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` whenever the buffer holds less than a complete
    /// frame (header, extended length, masking key, or payload), otherwise
    /// the frame and the number of bytes consumed. A masked payload is
    /// unmasked during parsing.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for invalid or reserved opcodes, or a
    /// length that does not fit the platform.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        let Some(header) = parse_header(buf)? else {
            return Ok(None);
        };

        let total = header
            .header_len
            .checked_add(header.payload_len)
            .ok_or_else(|| Error::protocol("frame length overflows platform"))?;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(key) = header.mask {
            apply_mask_fast(&mut payload, key);
        }

        let frame = Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            payload,
        };

        Ok(Some((frame, total)))
    }

    /// Enforce the control frame rules of RFC 6455 Section 5.5.
    ///
    /// # Errors
    ///
    /// Control frames must not be fragmented and must not carry more than
    /// 125 payload bytes.
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::protocol(format!(
                    "fragmented {} frame",
                    self.opcode
                )));
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::protocol(format!(
                    "{} frame with {}-byte payload",
                    self.opcode,
                    self.payload.len()
                )));
            }
        }
        Ok(())
    }

    /// Serialize the frame, applying `mask` when given.
    ///
    /// Client-to-server frames must always pass a key; the library draws
    /// one per frame from [`MaskKeySource`](crate::protocol::MaskKeySource).
    #[must_use]
    pub fn encode(&self, mask: Option<[u8; 4]>) -> Vec<u8> {
        let payload_len = self.payload.len();
        let mut out = Vec::with_capacity(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        out.push(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            out.push(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(payload_len as u16).to_be_bytes());
        } else {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(payload_len as u64).to_be_bytes());
        }

        match mask {
            Some(key) => {
                out.extend_from_slice(&key);
                let payload_start = out.len();
                out.extend_from_slice(&self.payload);
                apply_mask_fast(&mut out[payload_start..], key);
            }
            None => out.extend_from_slice(&self.payload),
        }

        out
    }

    /// Number of bytes [`Frame::encode`] will produce.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended = if payload_len <= 125 {
            0
        } else if payload_len <= u16::MAX as usize {
            2
        } else {
            8
        };
        2 + extended + if masked { 4 } else { 0 } + payload_len
    }
}

/// Decode and validate the next incoming frame from the receive buffer.
///
/// Role checks (masking direction, RSV bits, frame size) run against the
/// raw header before the payload is materialized; the consumed bytes are
/// removed from `buf`. Returns `Ok(None)` until a full frame is buffered.
///
/// # Errors
///
/// Any validation failure from `validator` or [`Frame::validate`], or a
/// malformed header.
pub(crate) fn decode_next(buf: &mut BytesMut, validator: &FrameValidator) -> Result<Option<Frame>> {
    let Some(header) = parse_header(buf)? else {
        return Ok(None);
    };

    validator.validate_incoming(
        header.mask.is_some(),
        header.rsv1,
        header.rsv2,
        header.rsv3,
        header.payload_len,
    )?;

    let Some((frame, consumed)) = Frame::parse(buf)? else {
        return Ok(None);
    };
    buf.advance(consumed);

    frame.validate()?;
    Ok(Some(frame))
}
