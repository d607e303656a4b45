use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use audit_ledger::{LedgerSink, LogEvent};

/// Protocol tag carried on every event this processor emits.
const EVENT_TYPE: &str = "log4j2";

/// Configuration for the line ingestion listener.
pub struct LineIngestConfig {
    /// Address to bind the listening socket to.
    pub listen_addr: SocketAddr,
    /// Connections with no complete event for this long are closed.
    pub idle_timeout: Duration,
}

/// Terminating server for NUL-delimited JSON log events.
pub struct LineIngestServer {
    config: LineIngestConfig,
    sink: LedgerSink,
}

impl LineIngestServer {
    pub fn new(config: LineIngestConfig, sink: LedgerSink) -> Self {
        Self { config, sink }
    }

    /// Run the accept loop. Each connection is handled in its own task.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        tracing::info!(addr = %self.config.listen_addr, "logline-ingest listening");

        let idle_timeout = self.config.idle_timeout;
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let sink = self.sink.clone();

            tokio::spawn(async move {
                if let Err(err) = process_connection(stream, remote_addr, idle_timeout, sink).await
                {
                    tracing::warn!(%remote_addr, %err, "logline connection error");
                }
            });
        }
    }
}

/// Read NUL-terminated events off one connection until close, idle timeout,
/// or I/O error.
async fn process_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    idle_timeout: Duration,
    sink: LedgerSink,
) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        let read = tokio::time::timeout(idle_timeout, reader.read_until(0, &mut buf)).await;

        let n = match read {
            Err(_) => {
                tracing::info!(%remote_addr, "logline connection idle, closing");
                return Ok(());
            }
            Ok(Err(err)) => return Err(err.into()),
            Ok(Ok(0)) => {
                tracing::info!(%remote_addr, "logline peer closed");
                return Ok(());
            }
            Ok(Ok(n)) => n,
        };

        // Strip the delimiter; a read ending at EOF may lack it.
        let line = if buf[n - 1] == 0 { &buf[..n - 1] } else { &buf[..n] };

        let Some(mut event) = parse_event(line) else {
            continue;
        };
        event.source_addr = remote_addr.to_string();
        sink.enqueue(event);
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// The subset of the log4j2 JSON layout this processor understands.
#[derive(Debug, Default, Deserialize)]
struct SocketEvent {
    #[serde(default)]
    instant: Instant,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "contextMap")]
    context_map: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Instant {
    #[serde(default, rename = "epochSecond")]
    epoch_second: i64,
}

/// Parse one raw event into a [`LogEvent`].
///
/// The log message is folded into the context map under `"message"`, and
/// the event keeps the appender's own timestamp when it carries one.
/// Malformed input is logged (hex-dumped at debug level) and dropped.
pub fn parse_event(raw: &[u8]) -> Option<LogEvent> {
    let parsed: SocketEvent = match serde_json::from_slice(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(%err, "bad logline format");
            tracing::debug!(raw = %hex::encode(raw), "undecodable logline");
            return None;
        }
    };

    let mut payload = parsed.context_map;
    payload.insert(
        "message".to_string(),
        serde_json::Value::String(parsed.message),
    );

    let timestamp = if parsed.instant.epoch_second > 0 {
        parsed.instant.epoch_second
    } else {
        chrono::Utc::now().timestamp()
    };

    Some(LogEvent {
        event_type: EVENT_TYPE.to_string(),
        // Filled in by the connection handler.
        source_addr: String::new(),
        identity: String::new(),
        timestamp,
        payload: serde_json::Value::Object(payload),
        primary_key: None,
    })
}
