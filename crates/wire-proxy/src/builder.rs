use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::dialog::DialogContext;

/// Errors raised while establishing the backend half of a dialog.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to connect to backend {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Opens the backend connection for a dialog.
///
/// Kept as a trait seam so tests and future dial policies (per-database
/// routing, TLS) can swap in without touching the engine.
#[async_trait]
pub trait ConnectionBuilder: Send + Sync {
    async fn build(&self, dialog: &DialogContext) -> Result<TcpStream, BuildError>;
}

/// Default builder: dials one fixed backend address for every dialog.
pub struct TcpConnectionBuilder {
    backend_addr: SocketAddr,
}

impl TcpConnectionBuilder {
    pub fn new(backend_addr: SocketAddr) -> Self {
        Self { backend_addr }
    }
}

#[async_trait]
impl ConnectionBuilder for TcpConnectionBuilder {
    async fn build(&self, dialog: &DialogContext) -> Result<TcpStream, BuildError> {
        let stream =
            TcpStream::connect(self.backend_addr)
                .await
                .map_err(|source| BuildError::Connect {
                    addr: self.backend_addr,
                    source,
                })?;

        tracing::debug!(
            dialog_id = %dialog.dialog_id(),
            backend = %self.backend_addr,
            "backend connected"
        );

        Ok(stream)
    }
}
