use serde::{Deserialize, Serialize};

/// A single audit event extracted from proxied traffic.
///
/// Immutable once constructed; callers build one per successfully decoded
/// message and hand it off to the [`LedgerSink`](crate::LedgerSink) without
/// retaining a reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Protocol tag for the event, e.g. `"mongo"` or `"log4j2"`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Remote address of the connection the event was observed on.
    pub source_addr: String,
    /// Resolved caller identity, empty when no credentials were observed.
    pub identity: String,
    /// Wall-clock time of extraction (epoch seconds), not of original
    /// transmission.
    pub timestamp: i64,
    /// Decoded message summary, or raw data for line-oriented protocols.
    pub payload: serde_json::Value,
    /// Primary key of the affected document, when one could be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
}

impl LogEvent {
    /// Create a new `LogEvent` stamped with the current UTC time.
    pub fn now(
        event_type: impl Into<String>,
        source_addr: impl Into<String>,
        identity: impl Into<String>,
        payload: serde_json::Value,
        primary_key: Option<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            source_addr: source_addr.into(),
            identity: identity.into(),
            timestamp: chrono::Utc::now().timestamp(),
            payload,
            primary_key,
        }
    }
}
