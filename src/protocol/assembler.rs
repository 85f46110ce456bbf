//! Fragment reassembly for incoming messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented messages from their data frames.
///
/// Control frames never enter the assembler; the connection driver handles
/// them inline, which is what lets them interleave with a fragmented
/// message.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragment_count: usize,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler bounded by `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragment_count: 0,
            limits,
        }
    }

    /// Feed one data frame; returns the complete message once a frame with
    /// `fin=1` arrives.
    ///
    /// # Errors
    ///
    /// - A continuation frame with no message in progress.
    /// - A text/binary frame while a previous message is still open.
    /// - The accumulated message exceeding `max_message_size`, or the
    ///   fragment count exceeding `max_fragment_count`.
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::protocol("continuation frame without a message"));
            }
            (OpCode::Continuation, Some(_)) => {}
            (opcode, None) => self.opcode = Some(opcode),
            (_, Some(_)) => {
                return Err(Error::protocol(
                    "new data frame while a fragmented message is open",
                ));
            }
        }

        self.fragment_count += 1;
        if self.fragment_count > self.limits.max_fragment_count {
            return Err(Error::protocol(format!(
                "message exceeds {} fragments",
                self.limits.max_fragment_count
            )));
        }

        let total = self.buffer.len() + frame.payload().len();
        if total > self.limits.max_message_size {
            return Err(Error::protocol(format!(
                "message of {total} bytes exceeds limit of {}",
                self.limits.max_message_size
            )));
        }

        self.buffer.extend_from_slice(frame.payload());

        if frame.fin {
            let payload = self.buffer.split().to_vec();
            let opcode = self.opcode.take().unwrap_or(frame.opcode);
            self.fragment_count = 0;
            Ok(Some(AssembledMessage { opcode, payload }))
        } else {
            Ok(None)
        }
    }

    /// Whether a fragmented message is currently open.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }
}

/// A fully reassembled message: the first frame's opcode and the
/// concatenated payloads.
#[derive(Debug, PartialEq, Eq)]
pub struct AssembledMessage {
    /// Opcode of the first frame of the message.
    pub opcode: OpCode,
    /// Concatenated fragment payloads.
    pub payload: Vec<u8>,
}
