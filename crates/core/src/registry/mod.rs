//! Address-keyed cache of live transfer sessions.
//!
//! One [`parking_lot::Mutex`] guards the whole map together with every entry's
//! bookkeeping (`leases`, `last_access`), so the reaper's "not busy and idle"
//! check and the removal that follows happen in a single critical section
//! relative to [`SessionRegistry::checkout`], [`SessionRegistry::mark_busy`]
//! and [`SessionRegistry::mark_idle`]. That lock is never held across an
//! `.await` or a blocking client call.
//!
//! The session itself sits behind a per-entry [`tokio::sync::Mutex`]. Requests
//! for the same address queue on it in FIFO order; requests for different
//! addresses never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{TransferClient, TransferSession};
use crate::error::{Error, Result};

#[cfg(test)]
mod tests;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Eviction timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
	/// Entries idle strictly longer than this are evicted.
	pub idle_timeout: Duration,
	/// How often the reaper sweeps.
	pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			idle_timeout: DEFAULT_IDLE_TIMEOUT,
			sweep_interval: DEFAULT_SWEEP_INTERVAL,
		}
	}
}

/// `None` once the session has been closed.
pub(crate) type SharedSession<S> = Arc<tokio::sync::Mutex<Option<S>>>;

struct SessionEntry<S> {
	/// Distinguishes this entry from a later one cached under the same address.
	id: u64,
	session: SharedSession<S>,
	last_access: Instant,
	/// Leases holding or waiting on the session. Busy while non-zero.
	leases: usize,
}

impl<S> SessionEntry<S> {
	fn is_busy(&self) -> bool {
		self.leases > 0
	}

	fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
		!self.is_busy() && now.saturating_duration_since(self.last_access) > idle_timeout
	}
}

/// Reference to one cached entry, as returned by [`SessionRegistry::acquire`].
pub struct SessionHandle<S> {
	address: String,
	id: u64,
	session: SharedSession<S>,
}

impl<S> SessionHandle<S> {
	pub fn address(&self) -> &str {
		&self.address
	}
}

impl<S> Clone for SessionHandle<S> {
	fn clone(&self) -> Self {
		Self {
			address: self.address.clone(),
			id: self.id,
			session: Arc::clone(&self.session),
		}
	}
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
	pub address: String,
	pub busy: bool,
	pub idle_for: Duration,
}

pub struct SessionRegistry<C: TransferClient> {
	client: Arc<C>,
	entries: Mutex<HashMap<String, SessionEntry<C::Session>>>,
	next_id: AtomicU64,
}

impl<C: TransferClient> SessionRegistry<C> {
	pub fn new(client: C) -> Self {
		Self {
			client: Arc::new(client),
			entries: Mutex::new(HashMap::new()),
			next_id: AtomicU64::new(1),
		}
	}

	pub fn client(&self) -> &C {
		&self.client
	}

	/// Returns the cached entry for `address`, connecting and logging in on a miss.
	///
	/// The entry is not marked busy; call [`mark_busy`](Self::mark_busy) before
	/// using it, or use [`checkout`](Self::checkout) to do both atomically.
	pub async fn acquire(&self, address: &str, user: &str, password: &str) -> Result<SessionHandle<C::Session>> {
		self.get_or_connect(address, user, password, false).await
	}

	/// Like [`acquire`](Self::acquire), but the entry is marked busy in the same
	/// critical section that finds or inserts it.
	pub async fn checkout(&self, address: &str, user: &str, password: &str) -> Result<Lease<'_, C>> {
		let handle = self.get_or_connect(address, user, password, true).await?;
		Ok(Lease {
			registry: self,
			handle,
			done: false,
		})
	}

	async fn get_or_connect(&self, address: &str, user: &str, password: &str, busy: bool) -> Result<SessionHandle<C::Session>> {
		if let Some(handle) = self.lookup(address, busy) {
			debug!(target = "putfile.registry", address, "reusing cached session");
			return Ok(handle);
		}

		let session = self.open_session(address, user, password).await?;

		let (handle, duplicate) = {
			let mut entries = self.entries.lock();
			if let Some(entry) = entries.get_mut(address) {
				// Another request for this address connected first; keep its session.
				if busy {
					entry.leases += 1;
				}
				(handle_for(address, entry), Some(session))
			} else {
				let entry = SessionEntry {
					id: self.next_id.fetch_add(1, Ordering::Relaxed),
					session: Arc::new(tokio::sync::Mutex::new(Some(session))),
					last_access: Instant::now(),
					leases: usize::from(busy),
				};
				let handle = handle_for(address, &entry);
				entries.insert(address.to_string(), entry);
				(handle, None)
			}
		};

		match duplicate {
			Some(extra) => {
				debug!(target = "putfile.registry", address, "lost connect race, closing duplicate session");
				close_detached(address, extra).await;
			}
			None => info!(target = "putfile.registry", address, "session cached"),
		}
		Ok(handle)
	}

	fn lookup(&self, address: &str, busy: bool) -> Option<SessionHandle<C::Session>> {
		let mut entries = self.entries.lock();
		let entry = entries.get_mut(address)?;
		if busy {
			entry.leases += 1;
		}
		Some(handle_for(address, entry))
	}

	async fn open_session(&self, address: &str, user: &str, password: &str) -> Result<C::Session> {
		let client = Arc::clone(&self.client);
		let address = address.to_string();
		let user = user.to_string();
		let password = password.to_string();

		tokio::task::spawn_blocking(move || {
			let mut session = client.connect(&address).map_err(|source| Error::Connect {
				address: address.clone(),
				source,
			})?;
			if let Err(source) = session.authenticate(&user, &password) {
				let _ = session.close();
				return Err(Error::Login { address, user, source });
			}
			Ok(session)
		})
		.await?
	}

	/// Marks the entry busy. Returns `false` if it was evicted or replaced since
	/// `handle` was obtained.
	pub fn mark_busy(&self, handle: &SessionHandle<C::Session>) -> bool {
		self.with_entry(handle, |entry| entry.leases += 1)
	}

	/// Ends one busy period and refreshes the access time.
	pub fn mark_idle(&self, handle: &SessionHandle<C::Session>) -> bool {
		self.with_entry(handle, |entry| {
			entry.leases = entry.leases.saturating_sub(1);
			entry.last_access = Instant::now();
		})
	}

	/// Ends one busy period without touching the access time.
	pub fn release(&self, handle: &SessionHandle<C::Session>) -> bool {
		self.with_entry(handle, |entry| entry.leases = entry.leases.saturating_sub(1))
	}

	fn with_entry(&self, handle: &SessionHandle<C::Session>, f: impl FnOnce(&mut SessionEntry<C::Session>)) -> bool {
		let mut entries = self.entries.lock();
		match entries.get_mut(&handle.address) {
			Some(entry) if entry.id == handle.id => {
				f(entry);
				true
			}
			_ => false,
		}
	}

	/// Drops the entry behind `handle` from the cache without closing it.
	/// The caller owns closing the session.
	pub(crate) fn forget(&self, handle: &SessionHandle<C::Session>) {
		let mut entries = self.entries.lock();
		if entries.get(&handle.address).is_some_and(|entry| entry.id == handle.id) {
			entries.remove(&handle.address);
		}
	}

	/// Closes and removes the entry for `address` if it is not busy and has been
	/// idle longer than `idle_timeout`.
	pub async fn evict_if_idle(&self, address: &str, idle_timeout: Duration) -> bool {
		let removed = {
			let mut entries = self.entries.lock();
			let now = Instant::now();
			match entries.get(address) {
				Some(entry) if entry.is_expired(now, idle_timeout) => entries.remove(address),
				_ => None,
			}
		};

		match removed {
			Some(entry) => {
				info!(target = "putfile.registry", address, "evicting idle session");
				close_shared(address, entry.session).await;
				true
			}
			None => false,
		}
	}

	/// Evicts every expired entry. Returns the number evicted.
	pub async fn sweep(&self, idle_timeout: Duration) -> usize {
		let expired: Vec<(String, SharedSession<C::Session>)> = {
			let mut entries = self.entries.lock();
			let now = Instant::now();
			let addresses: Vec<String> = entries
				.iter()
				.filter(|(_, entry)| entry.is_expired(now, idle_timeout))
				.map(|(address, _)| address.clone())
				.collect();
			addresses
				.into_iter()
				.filter_map(|address| entries.remove(&address).map(|entry| (address, entry.session)))
				.collect()
		};

		for (address, session) in &expired {
			info!(target = "putfile.registry", address = %address, "evicting idle session");
			close_shared(address, Arc::clone(session)).await;
		}
		expired.len()
	}

	/// Closes and removes every entry regardless of state.
	pub async fn close_all(&self) {
		let drained: Vec<(String, SharedSession<C::Session>)> =
			self.entries.lock().drain().map(|(address, entry)| (address, entry.session)).collect();
		for (address, session) in drained {
			close_shared(&address, session).await;
		}
	}

	/// Calls `visitor` once per entry with a snapshot taken under the lock.
	///
	/// The visitor runs after the lock is released, so it may call back into
	/// the registry.
	pub fn for_each(&self, visitor: impl FnMut(&SessionInfo)) {
		self.snapshot().iter().for_each(visitor);
	}

	pub fn snapshot(&self) -> Vec<SessionInfo> {
		let entries = self.entries.lock();
		let now = Instant::now();
		let mut infos: Vec<SessionInfo> = entries
			.iter()
			.map(|(address, entry)| SessionInfo {
				address: address.clone(),
				busy: entry.is_busy(),
				idle_for: now.saturating_duration_since(entry.last_access),
			})
			.collect();
		infos.sort_by(|a, b| a.address.cmp(&b.address));
		infos
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn contains(&self, address: &str) -> bool {
		self.entries.lock().contains_key(address)
	}
}

fn handle_for<S>(address: &str, entry: &SessionEntry<S>) -> SessionHandle<S> {
	SessionHandle {
		address: address.to_string(),
		id: entry.id,
		session: Arc::clone(&entry.session),
	}
}

/// Takes the session out of its slot and closes it on the blocking pool.
async fn close_shared<S: TransferSession>(address: &str, session: SharedSession<S>) {
	let taken = session.lock_owned().await.take();
	if let Some(session) = taken {
		close_detached(address, session).await;
	}
}

pub(crate) async fn close_detached<S: TransferSession>(address: &str, mut session: S) {
	match tokio::task::spawn_blocking(move || session.close()).await {
		Ok(Ok(())) => debug!(target = "putfile.registry", address, "session closed"),
		Ok(Err(err)) => debug!(target = "putfile.registry", address, error = %err, "session close reported an error"),
		Err(err) => warn!(target = "putfile.registry", address, error = %err, "session close task failed"),
	}
}

/// Busy claim on one entry, obtained from [`SessionRegistry::checkout`].
///
/// Dropping the lease without calling [`finish`](Self::finish) releases the
/// entry without refreshing its access time.
pub struct Lease<'a, C: TransferClient> {
	registry: &'a SessionRegistry<C>,
	handle: SessionHandle<C::Session>,
	done: bool,
}

impl<'a, C: TransferClient> Lease<'a, C> {
	pub fn address(&self) -> &str {
		self.handle.address()
	}

	pub fn registry(&self) -> &'a SessionRegistry<C> {
		self.registry
	}

	pub(crate) fn handle(&self) -> &SessionHandle<C::Session> {
		&self.handle
	}

	/// Waits for exclusive use of the session.
	///
	/// The guard holds `None` if the session was closed while waiting.
	pub async fn lock(&self) -> OwnedMutexGuard<Option<C::Session>> {
		Arc::clone(&self.handle.session).lock_owned().await
	}

	/// Ends the busy period after a successful operation, refreshing the
	/// entry's access time.
	pub fn finish(mut self) {
		self.done = true;
		self.registry.mark_idle(&self.handle);
	}
}

impl<C: TransferClient> Drop for Lease<'_, C> {
	fn drop(&mut self) {
		if !self.done {
			self.registry.release(&self.handle);
		}
	}
}
