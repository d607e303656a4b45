mod cli;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use audit_ledger::{LedgerSink, LogEvent};
use logline_ingest::{LineIngestConfig, LineIngestServer};
use mongo_tap::MongoTapFactory;
use wire_proxy::{
    DumpObserverFactory, EngineConfig, ObserverFactory, ProxyEngine, TcpConnectionBuilder,
};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref listen) = cli.listen {
        cfg.network.listen_addr = listen.clone();
    }
    if let Some(ref backend) = cli.backend {
        cfg.network.backend_addr = backend.clone();
    }
    if let Some(ref ledger) = cli.ledger {
        cfg.logging.ledger_path = ledger.clone();
    }
    if let Some(ref observer) = cli.observer {
        cfg.observer.mode = observer.clone();
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        listen = %cfg.network.listen_addr,
        backend = %cfg.network.backend_addr,
        ledger = %cfg.logging.ledger_path.display(),
        observer = %cfg.observer.mode,
        "dbtap starting"
    );

    // 4. Start the ledger writer.
    let (sink, ledger_handle) = LedgerSink::start(&cfg.logging.ledger_path)
        .await
        .context("failed to start ledger writer")?;

    sink.log(LogEvent::now(
        "dbtap",
        "",
        "",
        serde_json::json!({
            "operation": "process-started",
            "version": env!("CARGO_PKG_VERSION"),
            "config_file": cli.config.display().to_string(),
        }),
        None,
    ))
    .await;

    // 5. Resolve addresses.
    let listen_addr: SocketAddr = cfg
        .network
        .listen_addr
        .parse()
        .context("invalid listen address")?;
    let backend_addr: SocketAddr = cfg
        .network
        .backend_addr
        .parse()
        .context("invalid backend address")?;

    // 6. Pick the observer factory for accepted dialogs.
    let observers: Arc<dyn ObserverFactory> = match cfg.observer.mode.to_lowercase().as_str() {
        "dump" => Arc::new(DumpObserverFactory),
        "audit" => Arc::new(MongoTapFactory::new(sink.clone())),
        other => {
            anyhow::bail!("unknown observer mode {other:?} (expected \"audit\" or \"dump\")");
        }
    };

    // 7. Create the proxy engine.
    let engine = ProxyEngine::new(
        EngineConfig {
            listen_addr,
            max_dialogs: cfg.network.max_dialogs,
        },
        Arc::new(TcpConnectionBuilder::new(backend_addr)),
        observers,
    );

    // 8. Optionally start the log line ingestion listener.
    let logline_handle = if cfg.logline.enabled {
        let logline_addr: SocketAddr = cfg
            .logline
            .listen_addr
            .parse()
            .context("invalid logline listen address")?;
        let server = LineIngestServer::new(
            LineIngestConfig {
                listen_addr: logline_addr,
                idle_timeout: Duration::from_secs(cfg.logline.idle_timeout_secs),
            },
            sink.clone(),
        );
        Some(tokio::spawn(async move { server.run().await }))
    } else {
        None
    };

    // 9. Run until a fatal listener error or a shutdown signal.
    let result = tokio::select! {
        r = engine.run() => {
            info!("proxy engine exited");
            r
        }
        _ = shutdown_signal() => Ok(()),
    };

    if let Some(handle) = logline_handle {
        handle.abort();
    }

    // 10. Log shutdown. Dropping the sink closes the ledger channel and lets
    //     the background writer flush and exit.
    info!("dbtap shutting down");

    sink.log(LogEvent::now(
        "dbtap",
        "",
        "",
        serde_json::json!({ "operation": "process-stopped" }),
        None,
    ))
    .await;
    drop(sink);
    let _ = ledger_handle.await;

    result
}

/// Resolves when SIGINT (ctrl-c) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(sig) => sig,
            Err(err) => {
                tracing::error!(%err, "failed to register SIGTERM handler");
                ctrl_c.await.ok();
                info!("received SIGINT (ctrl-c)");
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (ctrl-c)");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT (ctrl-c)");
    }
}
