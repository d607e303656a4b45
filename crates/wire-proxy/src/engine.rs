use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::builder::ConnectionBuilder;
use crate::dialog::DialogContext;
use crate::observer::{ObserverFactory, TapEndpoint};

/// Size of the per-leg relay read buffer.
const RELAY_BUF_SIZE: usize = 16 * 1024;

/// Configuration for the proxy engine.
pub struct EngineConfig {
    /// Address to bind the listening socket to.
    pub listen_addr: SocketAddr,
    /// Maximum number of dialogs processed concurrently. Further accepts
    /// wait until a worker slot frees up.
    pub max_dialogs: usize,
}

/// The transparent TCP interception proxy.
///
/// Accepts client connections, obtains a backend connection through the
/// [`ConnectionBuilder`], and relays bytes bidirectionally until either leg
/// closes or errors. Each direction's relay mirrors every byte segment into
/// the matching tap endpoint before forwarding it to the real destination.
/// The proxy never alters traffic based on tap output.
pub struct ProxyEngine {
    config: EngineConfig,
    builder: Arc<dyn ConnectionBuilder>,
    observers: Arc<dyn ObserverFactory>,
}

impl ProxyEngine {
    pub fn new(
        config: EngineConfig,
        builder: Arc<dyn ConnectionBuilder>,
        observers: Arc<dyn ObserverFactory>,
    ) -> Self {
        Self {
            config,
            builder,
            observers,
        }
    }

    /// Run the accept loop.
    ///
    /// Binds to `listen_addr` and loops forever accepting connections.
    /// Admission is bounded by a semaphore of `max_dialogs` permits: a permit
    /// is acquired before each accept and travels with the dialog task, so it
    /// is released on every exit path, including errors.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        tracing::info!(addr = %self.config.listen_addr, "wire-proxy listening");

        let workers = Arc::new(Semaphore::new(self.config.max_dialogs));

        loop {
            let permit = match Arc::clone(&workers).acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed; treat closure as shutdown.
                Err(_) => return Ok(()),
            };

            let (stream, remote_addr) = listener.accept().await?;
            let builder = Arc::clone(&self.builder);
            let observers = Arc::clone(&self.observers);

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = handle_dialog(stream, remote_addr, builder, observers).await {
                    tracing::warn!(%remote_addr, %err, "dialog ended with error");
                }
            });
        }
    }
}

/// Handle a single dialog from accept through relay and teardown.
async fn handle_dialog(
    client: TcpStream,
    remote_addr: SocketAddr,
    builder: Arc<dyn ConnectionBuilder>,
    observers: Arc<dyn ObserverFactory>,
) -> anyhow::Result<()> {
    let dialog = Arc::new(DialogContext::new(remote_addr));

    tracing::info!(
        dialog_id = %dialog.dialog_id(),
        %remote_addr,
        "client connected"
    );

    let taps = observers.create(&dialog);

    // A backend connect failure closes the client without a single tap write.
    let backend = builder.build(&dialog).await?;

    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    // client -> backend
    let incoming = tokio::spawn(relay_leg(
        client_read,
        backend_write,
        taps.incoming,
        Arc::clone(&dialog),
        "incoming",
    ));

    // backend -> client
    let outgoing = tokio::spawn(relay_leg(
        backend_read,
        client_write,
        taps.outgoing,
        Arc::clone(&dialog),
        "outgoing",
    ));

    // Either leg finishing (peer close or error) tears down the whole dialog.
    // There is no independent cancellation of just the extraction path.
    let mut incoming = incoming;
    let mut outgoing = outgoing;
    tokio::select! {
        result = &mut incoming => {
            log_leg_end(&dialog, "incoming", &result);
            outgoing.abort();
        }
        result = &mut outgoing => {
            log_leg_end(&dialog, "outgoing", &result);
            incoming.abort();
        }
    }

    tracing::info!(
        dialog_id = %dialog.dialog_id(),
        %remote_addr,
        user = dialog.user().unwrap_or("<none>"),
        "dialog closed"
    );

    Ok(())
}

fn log_leg_end(
    dialog: &DialogContext,
    direction: &str,
    result: &Result<std::io::Result<u64>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(bytes)) => tracing::debug!(
            dialog_id = %dialog.dialog_id(),
            direction,
            bytes,
            "relay leg finished"
        ),
        Ok(Err(err)) => tracing::debug!(
            dialog_id = %dialog.dialog_id(),
            direction,
            %err,
            "relay leg failed"
        ),
        Err(err) => tracing::error!(
            dialog_id = %dialog.dialog_id(),
            direction,
            %err,
            "relay leg panicked"
        ),
    }
}

/// Relay one direction of a dialog, mirroring every segment into `tap`.
///
/// Returns the total byte count on clean close (peer EOF). A read or write
/// error propagates out and terminates the dialog; no implicit retry. A tap
/// error means the direction's framing is corrupted beyond realignment and
/// is treated the same way.
async fn relay_leg<R, W>(
    mut reader: R,
    mut writer: W,
    tap: Arc<dyn TapEndpoint>,
    dialog: Arc<DialogContext>,
    direction: &'static str,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; RELAY_BUF_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            // Propagate the close to the destination.
            writer.shutdown().await.ok();
            return Ok(total);
        }

        // Mirror before forwarding. The tap must not retain the slice; the
        // buffer is reused on the next read.
        if let Err(err) = tap.write(&buf[..n]) {
            tracing::warn!(
                dialog_id = %dialog.dialog_id(),
                direction,
                %err,
                "tap rejected stream, tearing down dialog"
            );
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, err));
        }

        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}
