//! Append-only structured JSON-lines audit ledger for the dbtap project.
//!
//! This crate provides the durable event store shared by every protocol tap
//! in the system.  Each audit event is serialised as a single
//! newline-terminated JSON object and appended to a ledger file, producing a
//! [JSON Lines](https://jsonlines.org/) stream that is easy to ship, parse,
//! and replay.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_ledger::{LedgerSink, LogEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = LedgerSink::start("/var/log/dbtap/ledger.jsonl").await?;
//!
//! sink.enqueue(LogEvent::now(
//!     "mongo",
//!     "10.0.0.7:52114",
//!     "appuser",
//!     serde_json::json!({"operation": "insert"}),
//!     Some("65f1c0de".to_string()),
//! ));
//! # Ok(())
//! # }
//! ```

pub mod event;
pub mod sink;
pub mod writer;

// Re-export primary public types at the crate root for convenience.
pub use event::LogEvent;
pub use sink::LedgerSink;
pub use writer::{LedgerWriteError, LedgerWriter};
