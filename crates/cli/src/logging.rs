use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// Without `log_file` events go to stderr with colors; with it they are
/// appended to the file (parent directories are created). `RUST_LOG`
/// overrides the verbosity-derived filter.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let builder = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_level(true)
		.compact();

	let installed = match log_file {
		Some(path) => {
			let file = open_log_file(path)?;
			builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
		}
		None => builder.with_writer(std::io::stderr).try_init(),
	};
	installed.map_err(|err| anyhow!("Failed to install log subscriber: {err}"))
}

// 0 = request outcomes and session lifecycle
// 1 (-v) = per-step detail from the session core
// 2+ (-vv) = everything, including dependencies
fn default_filter(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn,putfile=info",
		1 => "info,putfile=debug",
		_ => "debug",
	}
}

fn open_log_file(path: &Path) -> Result<File> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
	}
	OpenOptions::new()
		.create(true)
		.append(true)
		.open(path)
		.with_context(|| format!("Failed to open log file: {}", path.display()))
}
