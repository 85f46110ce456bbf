//! RFC 6455 wire protocol: opcodes, masking, frame codec, handshake, and
//! fragment reassembly.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod validation;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD};
pub use handshake::{compute_accept_key, ClientHandshake, WS_GUID};
pub use mask::{apply_mask, apply_mask_fast, MaskKeySource};
pub use opcode::OpCode;
pub use validation::FrameValidator;

pub(crate) use frame::decode_next;
