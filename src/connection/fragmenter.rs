//! Fragmentation of outgoing messages (RFC 6455 Section 5.4).

use crate::protocol::{Frame, OpCode};

/// Splits an outgoing payload into data frames.
///
/// Payloads at or below the threshold yield a single final frame. Larger
/// payloads yield the original opcode with `fin=0`, continuation frames
/// for the middle chunks, and a final continuation with `fin=1`.
pub struct Fragmenter<'a> {
    payload: &'a [u8],
    opcode: OpCode,
    chunk_size: usize,
    offset: usize,
}

impl<'a> Fragmenter<'a> {
    /// Create a fragmenter producing chunks of at most `chunk_size` bytes.
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, chunk_size: usize) -> Self {
        Self {
            payload,
            opcode,
            chunk_size: chunk_size.max(1),
            offset: 0,
        }
    }
}

impl Iterator for Fragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let first = self.offset == 0;
        if !first && self.offset >= self.payload.len() {
            return None;
        }

        let end = (self.offset + self.chunk_size).min(self.payload.len());
        let chunk = self.payload[self.offset..end].to_vec();
        let fin = end == self.payload.len();
        let opcode = if first {
            self.opcode
        } else {
            OpCode::Continuation
        };
        self.offset = end.max(1); // an empty payload still yields one frame

        Some(Frame::new(fin, opcode, chunk))
    }
}
