//! Line-oriented log event ingestion for the dbtap project.
//!
//! Unlike the binary wire-protocol tap, this is a terminating server, not a
//! proxy: log4j2 socket appenders connect directly and push NUL-terminated
//! JSON event objects. Each object is parsed, flattened, and forwarded to
//! the same audit ledger the proxy taps feed.
//!
//! Framing here is trivial (a delimiter byte), so the crate also owns the
//! idle-timeout policy the generic proxy engine deliberately leaves to
//! protocol-specific processors.

pub mod processor;

pub use processor::{parse_event, LineIngestConfig, LineIngestServer};
