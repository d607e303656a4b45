use std::sync::{Arc, Mutex};

use bytes::{Buf, BytesMut};

use audit_ledger::{LedgerSink, LogEvent};
use wire_proxy::{DialogContext, TapEndpoint, TapError};

use crate::error::CodecError;
use crate::header::{decode_header, MessageHeader, HEADER_LEN};
use crate::message::{extract_message, Message};

/// Protocol tag carried on every event this tap emits.
const EVENT_TYPE: &str = "mongo";

/// Buffered framing state for one direction of one dialog.
///
/// Owned exclusively by its [`StreamExtractor`]; never shared.
struct ExtractorState {
    /// Bytes received but not yet consumed by a completed message.
    buf: BytesMut,
    /// Header of the message currently being assembled, once decoded.
    pending: Option<MessageHeader>,
}

/// Incremental assembler for one direction of a proxied dialog.
///
/// Consumes arbitrarily-chunked relay bytes, frames them against each
/// header's declared size, decodes complete messages through the codec, and
/// emits one audit event per successful decode. Cycles through
/// decode→emit→reset for the dialog's full duration.
///
/// # Call contract
///
/// [`write`](TapEndpoint::write) always reports full consumption of the
/// chunk it was given; backpressure is the relay's own flow control, not
/// partial consumption here. At most one message is drained per call; when
/// a single chunk carries several whole messages the remainder stays
/// buffered and is drained on subsequent calls. The relay keeps calling as
/// long as the connection is open, so nothing is stranded, but
/// message-to-call latency is not 1:1 within a burst.
///
/// # Concurrency
///
/// Every state transition happens under the extractor's own lock, so the
/// effect of concurrent writes is equivalent to some sequential ordering
/// even if the engine ever invokes the same endpoint from independent
/// paths.
pub struct StreamExtractor {
    state: Mutex<ExtractorState>,
    dialog: Arc<DialogContext>,
    sink: LedgerSink,
}

impl StreamExtractor {
    pub fn new(dialog: Arc<DialogContext>, sink: LedgerSink) -> Self {
        Self {
            state: Mutex::new(ExtractorState {
                buf: BytesMut::new(),
                pending: None,
            }),
            dialog,
            sink,
        }
    }

    /// Reconcile identity with the dialog and hand the event to the ledger.
    ///
    /// A message carrying credentials promotes them into the dialog (first
    /// writer wins); a message without inherits whatever the dialog already
    /// resolved. Enqueueing never waits on persistence.
    fn emit(&self, msg: &Message) {
        let identity = if msg.derived.user.is_empty() {
            self.dialog.user().unwrap_or_default().to_string()
        } else {
            self.dialog.promote_user(&msg.derived.user);
            msg.derived.user.clone()
        };

        let payload = serde_json::json!({
            "opcode": msg.opcode.label(),
            "request_id": msg.header.request_id,
            "response_to": msg.header.response_to,
            "database": msg.derived.database,
            "collection": msg.derived.collection,
            "operation": msg.derived.operation,
        });

        self.sink.enqueue(LogEvent::now(
            EVENT_TYPE,
            self.dialog.remote_addr().to_string(),
            identity,
            payload,
            msg.derived.document_id.clone(),
        ));
    }
}

impl TapEndpoint for StreamExtractor {
    /// Feed one chunk of relayed bytes through the framing state machine.
    ///
    /// Single pass: append, decode a header once enough bytes are buffered,
    /// defer until the declared size is reached, then consume exactly that
    /// many bytes as one message and reset. Decode failures at the message
    /// stage are logged and skipped with framing kept aligned; only a bad
    /// header is unrecoverable and tears the direction down.
    fn write(&self, chunk: &[u8]) -> Result<(), TapError> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        state.buf.extend_from_slice(chunk);

        if state.pending.is_none() && state.buf.len() > HEADER_LEN {
            // Attempted at most once per message cycle. Failure here means
            // the stream cannot be realigned: surface it to the engine.
            let header = decode_header(&state.buf).map_err(|err| TapError::Framing {
                reason: err.to_string(),
            })?;
            state.pending = Some(header);
        }

        let Some(header) = state.pending.clone() else {
            return Ok(());
        };
        let size = header.message_size as usize;
        if state.buf.len() < size {
            // More data needed; nothing else to do this call.
            return Ok(());
        }

        match extract_message(&header, &state.buf[..size]) {
            Ok(msg) => self.emit(&msg),
            Err(err @ CodecError::NotImplemented { .. }) => {
                tracing::debug!(
                    dialog_id = %self.dialog.dialog_id(),
                    %err,
                    "message skipped"
                );
            }
            Err(err) => {
                tracing::warn!(
                    dialog_id = %self.dialog.dialog_id(),
                    %err,
                    "undecodable message skipped"
                );
            }
        }

        // Reset: drop the consumed frame, keep any trailing bytes for the
        // next cycle. Never discarded, never double-consumed.
        state.buf.advance(size);
        state.pending = None;

        Ok(())
    }
}

/// Tap endpoint for the backend→client direction.
///
/// Satisfies the same call contract as [`StreamExtractor`] (accept bytes,
/// never error, report full consumption) but decodes nothing: reply payload
/// extraction is a deliberate extension point, not finished functionality.
pub struct ResponseTap {
    dialog: Arc<DialogContext>,
}

impl ResponseTap {
    pub fn new(dialog: Arc<DialogContext>) -> Self {
        Self { dialog }
    }
}

impl TapEndpoint for ResponseTap {
    fn write(&self, chunk: &[u8]) -> Result<(), TapError> {
        tracing::trace!(
            dialog_id = %self.dialog.dialog_id(),
            len = chunk.len(),
            "response bytes observed"
        );
        Ok(())
    }
}
