use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use putfile::{SessionRegistry, TransferService};
use putfile_cli::{cli::Cli, logging, server};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	if let Err(err) = run(cli).await {
		eprintln!("putfile: {err:#}");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<()> {
	logging::init_logging(cli.verbose, cli.log_file.as_deref())?;

	let addr = cli.listen_addr();
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind gateway listener: {addr}"))?;
	info!(target = "putfile.gateway", %addr, "gateway listening");

	let registry = Arc::new(SessionRegistry::new(cli.ftp_client()));
	server::serve(
		listener,
		TransferService::new(registry),
		cli.registry_config(),
		server::shutdown_signal(),
	)
	.await
}
