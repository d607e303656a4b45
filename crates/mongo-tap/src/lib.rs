//! MongoDB wire protocol codec and streaming audit extractor.
//!
//! This crate turns one direction of a proxied MongoDB byte stream into
//! discrete wire messages and audit events. It has two layers:
//!
//! * A pure, stateless codec: [`decode_header`](header::decode_header)
//!   reads the fixed 16-byte message header, and
//!   [`extract_message`](message::extract_message) dispatches a complete
//!   `size`-bounded frame to a per-opcode decoder that pulls out the
//!   audit-relevant metadata (user, database, collection, operation,
//!   document id).
//! * A stateful incremental assembler: [`StreamExtractor`] buffers
//!   arbitrarily-chunked relay bytes, frames them against the header's
//!   declared size, and emits one [`audit_ledger::LogEvent`] per decoded
//!   message.
//!
//! The extractor is attached to the proxy through the
//! [`wire_proxy::TapEndpoint`] seam via [`MongoTapFactory`]; the proxy
//! itself stays free of protocol knowledge.
//!
//! Response-side (backend→client) payload decoding is a deliberate
//! extension point: the outgoing endpoint accepts and discards bytes, and
//! the reply opcodes report [`CodecError::NotImplemented`].

pub mod bson_scan;
pub mod error;
pub mod extractor;
pub mod factory;
pub mod header;
pub mod message;
pub mod opcode;

// Re-export the primary public types at the crate root for convenience.
pub use error::CodecError;
pub use extractor::{ResponseTap, StreamExtractor};
pub use factory::MongoTapFactory;
pub use header::{decode_header, MessageHeader, HEADER_LEN};
pub use message::{extract_message, Derived, Message};
pub use opcode::OpCode;
