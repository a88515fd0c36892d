//! Runs one upload against a leased session.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::client::{TransferClient, TransferSession};
use crate::error::{Error, Result};
use crate::registry::{Lease, close_detached};
use putfile_protocol::TransferRequest;

/// What to do on the session, resolved from a [`TransferRequest`].
#[derive(Debug, Clone)]
struct UploadJob {
	remote_dir: String,
	local_path: PathBuf,
	remote_path: String,
}

impl From<&TransferRequest> for UploadJob {
	fn from(request: &TransferRequest) -> Self {
		Self {
			remote_dir: request.remote_dir.clone(),
			local_path: request.local_path(),
			remote_path: request.remote_path(),
		}
	}
}

/// Uploads the request's file through `lease`, consuming it.
///
/// Steps run in order and stop at the first failure: change directory, open
/// the local file, store. The local file is closed on every path. On success
/// the entry's access time is refreshed; on failure the entry is released
/// untouched, unless the connection turned out to be gone, in which case the
/// session is closed and dropped from the cache right away.
pub async fn execute<C: TransferClient>(lease: Lease<'_, C>, request: &TransferRequest) -> Result<u64> {
	let job = UploadJob::from(request);
	let guard = lease.lock().await;
	debug!(
		target = "putfile.executor",
		address = lease.address(),
		local = %job.local_path.display(),
		remote = %job.remote_path,
		"uploading"
	);

	let address = lease.address().to_string();
	let (mut guard, outcome) = tokio::task::spawn_blocking(move || {
		let mut guard = guard;
		let outcome = match guard.as_mut() {
			Some(session) => upload(session, &job),
			None => Err(Error::SessionClosed { address }),
		};
		(guard, outcome)
	})
	.await?;

	match outcome {
		Ok(bytes) => {
			drop(guard);
			lease.finish();
			Ok(bytes)
		}
		Err(err) if err.is_connection_lost() => {
			warn!(target = "putfile.executor", address = lease.address(), error = %err, "connection lost, dropping session");
			lease.registry().forget(lease.handle());
			let dead = guard.take();
			drop(guard);
			if let Some(session) = dead {
				close_detached(lease.address(), session).await;
			}
			Err(err)
		}
		Err(err) => Err(err),
	}
}

fn upload<S: TransferSession>(session: &mut S, job: &UploadJob) -> Result<u64> {
	session.change_dir(&job.remote_dir).map_err(|source| Error::Directory {
		path: job.remote_dir.clone(),
		source,
	})?;

	let mut file = open_local(&job.local_path).map_err(|source| Error::LocalFile {
		path: job.local_path.clone(),
		source,
	})?;

	session.store(&job.remote_path, &mut file).map_err(|source| Error::Transfer {
		path: job.remote_path.clone(),
		source,
	})
}

/// Opens `path` for reading. Anything but a regular file is refused here, before
/// the server is asked to create the remote file.
fn open_local(path: &Path) -> io::Result<File> {
	let file = File::open(path)?;
	if !file.metadata()?.is_file() {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
	}
	Ok(file)
}
