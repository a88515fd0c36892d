use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use putfile::{Reaper, RegistryConfig, TransferClient, TransferService};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::gateway;

/// Serves the gateway on `listener` until `shutdown` resolves.
///
/// The reaper runs alongside the server for its whole lifetime. After the
/// server drains, the reaper is stopped and every cached session is closed.
pub async fn serve<C, F>(listener: TcpListener, service: TransferService<C>, config: RegistryConfig, shutdown: F) -> Result<()>
where
	C: TransferClient,
	F: Future<Output = ()> + Send + 'static,
{
	let registry = Arc::clone(service.registry());
	let (stop_tx, stop_rx) = watch::channel(false);
	let reaper = Reaper::new(Arc::clone(&registry), config).spawn(stop_rx);

	let served = axum::serve(listener, gateway::router(service))
		.with_graceful_shutdown(shutdown)
		.await
		.context("Gateway server failed");

	let _ = stop_tx.send(true);
	if let Err(err) = reaper.await {
		warn!(target = "putfile.gateway", error = %err, "reaper task failed");
	}
	let open = registry.len();
	registry.close_all().await;
	info!(target = "putfile.gateway", closed = open, "sessions closed, gateway stopped");
	served
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C on non-unix platforms).
pub async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let mut sigterm = match signal(SignalKind::terminate()) {
			Ok(sigterm) => sigterm,
			Err(err) => {
				warn!(target = "putfile.gateway", error = %err, "failed to install SIGTERM handler");
				wait_ctrl_c().await;
				return;
			}
		};
		tokio::select! {
			_ = sigterm.recv() => info!(target = "putfile.gateway", "received SIGTERM, shutting down"),
			_ = wait_ctrl_c() => {}
		}
	}

	#[cfg(not(unix))]
	wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => info!(target = "putfile.gateway", "received Ctrl+C, shutting down"),
		Err(err) => {
			warn!(target = "putfile.gateway", error = %err, "failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	}
}
