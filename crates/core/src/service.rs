//! Request-level entry point tying the registry and executor together.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::TransferClient;
use crate::error::Result;
use crate::executor;
use crate::registry::SessionRegistry;
use putfile_protocol::TransferRequest;

pub struct TransferService<C: TransferClient> {
	registry: Arc<SessionRegistry<C>>,
}

impl<C: TransferClient> Clone for TransferService<C> {
	fn clone(&self) -> Self {
		Self {
			registry: Arc::clone(&self.registry),
		}
	}
}

impl<C: TransferClient> TransferService<C> {
	pub fn new(registry: Arc<SessionRegistry<C>>) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &Arc<SessionRegistry<C>> {
		&self.registry
	}

	/// Uploads `request.local_dir/local_file` to `request.remote_dir` on
	/// `request.address`, reusing a cached session when one exists.
	///
	/// Concurrent calls for the same address run one after another. Dropping the
	/// returned future does not cancel an upload already in flight. Returns the
	/// number of bytes stored.
	pub async fn put_file(&self, request: &TransferRequest) -> Result<u64> {
		let outcome = self.run(request).await;
		match &outcome {
			Ok(bytes) => info!(
				target = "putfile.service",
				address = %request.address,
				file = %request.local_file,
				remote_dir = %request.remote_dir,
				bytes,
				"upload complete"
			),
			Err(err) => warn!(
				target = "putfile.service",
				address = %request.address,
				file = %request.local_file,
				kind = err.kind().as_str(),
				error = %err,
				"upload failed"
			),
		}
		outcome
	}

	/// Checkout and upload run on their own task, so the lease (and the busy
	/// mark) lives until the blocking I/O ends even if the caller goes away.
	async fn run(&self, request: &TransferRequest) -> Result<u64> {
		let registry = Arc::clone(&self.registry);
		let request = request.clone();
		tokio::spawn(async move {
			let lease = registry.checkout(&request.address, &request.user, &request.password).await?;
			executor::execute(lease, &request).await
		})
		.await?
	}
}
