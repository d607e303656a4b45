use crate::opcode::OpCode;

/// Errors produced by the wire codec.
///
/// Only `InsufficientBytes` and `InvalidSize` can make a direction
/// unrecoverable (the framer cannot realign after a bad header); the
/// per-message variants are handled by resetting the frame and moving on.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Not enough bytes buffered to decode a header. A "need more data"
    /// signal internal to framing, not a protocol violation.
    #[error("not enough bytes for header decoding, expect {expected}, got {got}")]
    InsufficientBytes { expected: usize, got: usize },

    /// The header's declared message size is smaller than the header itself.
    #[error("invalid message size {size}, smaller than the {header_len}-byte header")]
    InvalidSize { size: u32, header_len: usize },

    /// The opcode is not part of the wire protocol's fixed opcode set.
    /// The message is dropped; framing stays aligned via the declared size.
    #[error("unknown opcode: {code}")]
    UnknownOpcode { code: i32 },

    /// The opcode is recognized but has no decoder (response-side payloads).
    /// Non-fatal: only this message's audit is skipped.
    #[error("no decoder implemented for opcode {opcode:?}")]
    NotImplemented { opcode: OpCode },
}
