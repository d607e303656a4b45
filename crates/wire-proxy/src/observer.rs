use std::sync::Arc;

use crate::dialog::DialogContext;

/// Error surfaced by a tap when a direction's byte stream can no longer be
/// interpreted.
///
/// Taps are a pure mirror and normally swallow per-message decode problems
/// internally; this error is reserved for unrecoverable framing corruption,
/// where the direction's subsequent bytes cannot be realigned. The engine
/// responds by tearing down the dialog.
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("framing corrupted: {reason}")]
    Framing { reason: String },
}

/// One direction's write endpoint of an observer pair.
///
/// The engine mirrors every relayed byte segment into the matching endpoint.
/// Implementations must not retain the slice beyond the call; the engine
/// reuses its read buffer. The call must report full consumption: partial
/// progress is not a concept here, backpressure belongs to the relay's own
/// flow control.
pub trait TapEndpoint: Send + Sync {
    fn write(&self, chunk: &[u8]) -> Result<(), TapError>;
}

/// A matched pair of tap endpoints for one dialog.
pub struct ObserverPair {
    /// Receives client→backend bytes.
    pub incoming: Arc<dyn TapEndpoint>,
    /// Receives backend→client bytes.
    pub outgoing: Arc<dyn TapEndpoint>,
}

/// Builds an [`ObserverPair`] for each accepted dialog.
///
/// Implementations are interchangeable (a raw hex dumper and a structured
/// protocol extractor satisfy the same contract) and are selected by
/// configuration, not by engine logic.
pub trait ObserverFactory: Send + Sync {
    fn create(&self, dialog: &Arc<DialogContext>) -> ObserverPair;
}

// ---------------------------------------------------------------------------
// Hex dump observer
// ---------------------------------------------------------------------------

/// Pass-through endpoint that hex-dumps every chunk at debug level.
struct HexDumper {
    dialog_id: uuid::Uuid,
    direction: &'static str,
}

impl TapEndpoint for HexDumper {
    fn write(&self, chunk: &[u8]) -> Result<(), TapError> {
        tracing::debug!(
            dialog_id = %self.dialog_id,
            direction = self.direction,
            len = chunk.len(),
            data = %hex::encode(chunk),
            "tap"
        );
        Ok(())
    }
}

/// Observer factory producing [`HexDumper`] pairs.
///
/// Useful for debugging unknown protocols or verifying the relay path
/// without any protocol knowledge.
pub struct DumpObserverFactory;

impl ObserverFactory for DumpObserverFactory {
    fn create(&self, dialog: &Arc<DialogContext>) -> ObserverPair {
        ObserverPair {
            incoming: Arc::new(HexDumper {
                dialog_id: dialog.dialog_id(),
                direction: "incoming",
            }),
            outgoing: Arc::new(HexDumper {
                dialog_id: dialog.dialog_id(),
                direction: "outgoing",
            }),
        }
    }
}
