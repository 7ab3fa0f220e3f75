use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use tokio::{net::TcpListener, sync::watch};

/// How long in-flight requests may run after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Serve `app` on all interfaces until Ctrl-C / SIGTERM, then drain with a bounded grace period.
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = stop_rx.changed().await;
    });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut handle => {
            joined.context("Server task panicked")?.context("Server failed")?;
            return Ok(());
        }
        () = shutdown_signal() => {
            tracing::info!("shutting down gracefully");
        }
    }

    let _ = stop_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
        Ok(joined) => joined.context("Server task panicked")?.context("Server failed")?,
        Err(_) => {
            tracing::warn!(
                grace = ?SHUTDOWN_GRACE,
                "in-flight requests did not finish; forcing shutdown"
            );
            handle.abort();
        }
    }

    tracing::info!("server exiting");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
