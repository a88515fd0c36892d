//! Background eviction of idle sessions.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::client::TransferClient;
use crate::registry::{RegistryConfig, SessionRegistry};

/// Periodic sweeper over a [`SessionRegistry`].
///
/// Every `sweep_interval` it evicts entries that are not busy and have been
/// idle longer than `idle_timeout`, so an entry is gone at most one interval
/// after crossing the threshold. The first sweep happens one interval after
/// start.
pub struct Reaper<C: TransferClient> {
	registry: Arc<SessionRegistry<C>>,
	config: RegistryConfig,
}

impl<C: TransferClient> Reaper<C> {
	pub fn new(registry: Arc<SessionRegistry<C>>, config: RegistryConfig) -> Self {
		Self { registry, config }
	}

	/// Runs the reaper on the current runtime until `shutdown` flips to `true`
	/// or its sender is dropped.
	pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
		tokio::spawn(self.run(shutdown))
	}

	pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
		let period = self.config.sweep_interval;
		let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		info!(
			target = "putfile.reaper",
			interval_secs = period.as_secs(),
			idle_timeout_secs = self.config.idle_timeout.as_secs(),
			"reaper started"
		);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					self.sweep_once().await;
				}
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						break;
					}
				}
			}
		}
		debug!(target = "putfile.reaper", "reaper stopped");
	}

	/// One sweep. Returns the number of evicted entries.
	pub async fn sweep_once(&self) -> usize {
		self.registry.for_each(|info| {
			debug!(
				target = "putfile.reaper",
				address = %info.address,
				busy = info.busy,
				idle_secs = info.idle_for.as_secs(),
				"checking session"
			);
		});
		let evicted = self.registry.sweep(self.config.idle_timeout).await;
		if evicted > 0 {
			info!(target = "putfile.reaper", evicted, remaining = self.registry.len(), "swept idle sessions");
		}
		evicted
	}
}
