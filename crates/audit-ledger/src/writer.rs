use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::event::LogEvent;

/// Errors that can occur during ledger I/O.
#[derive(Debug, thiserror::Error)]
pub enum LedgerWriteError {
    #[error("cannot open ledger at {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("ledger write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only JSON-lines store behind the sink's background task.
///
/// Lines accumulate in an in-process [`BufWriter`] and reach the file only
/// on [`sync`](Self::sync). The sink syncs once per drained batch, so a
/// crash can lose at most one burst of events, never an unbounded backlog.
pub struct LedgerWriter {
    out: BufWriter<File>,
}

impl LedgerWriter {
    /// Open (or create) the ledger file at `path` for appending, creating
    /// parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerWriteError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LedgerWriteError::Open {
                    path: path.to_owned(),
                    source,
                })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| LedgerWriteError::Open {
                path: path.to_owned(),
                source,
            })?;

        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Append one event as a newline-terminated JSON object.
    pub async fn append(&mut self, event: &LogEvent) -> Result<(), LedgerWriteError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        Ok(())
    }

    /// Push buffered lines down to the file.
    pub async fn sync(&mut self) -> Result<(), LedgerWriteError> {
        self.out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dbtap-ledger-{}.jsonl", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn appends_one_json_line_per_event() {
        let path = temp_path();
        let mut writer = LedgerWriter::open(&path).await.unwrap();

        for i in 0..3 {
            let event = LogEvent::now(
                "mongo",
                format!("127.0.0.1:{i}"),
                "",
                serde_json::json!({"n": i}),
                None,
            );
            writer.append(&event).await.unwrap();
        }
        writer.sync().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            let event: LogEvent = serde_json::from_str(line).unwrap();
            assert_eq!(event.payload["n"], i);
        }

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn lines_are_buffered_until_sync() {
        let path = temp_path();
        let mut writer = LedgerWriter::open(&path).await.unwrap();

        let event = LogEvent::now("mongo", "a", "", serde_json::json!({}), None);
        writer.append(&event).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "");

        writer.sync().await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap().lines().count(),
            1
        );

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("dbtap-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested/ledger.jsonl");
        let writer = LedgerWriter::open(&path).await;
        assert!(writer.is_ok());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
