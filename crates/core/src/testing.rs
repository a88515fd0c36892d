//! Recording test double for the transfer boundary.
//!
//! [`MockClient`] hands out in-memory sessions and logs every call they
//! receive, keyed by address, so tests can assert on reuse (one `Connect` per
//! address) and on per-session ordering. Faults are injected per address or
//! per remote directory.
//!
//! ```ignore
//! let client = MockClient::new();
//! client.refuse("10.0.0.9:21");
//! let registry = SessionRegistry::new(client.clone());
//! ```

use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::{ClientError, TransferClient, TransferSession};

/// One call observed by a mock session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Connect,
	Authenticate { user: String },
	ChangeDir(String),
	Store { path: String },
	Close,
}

#[derive(Default)]
struct MockState {
	/// (address, session id, call) in the order calls were made.
	log: Vec<(String, u64, Call)>,
	stored: HashMap<String, Vec<(String, Vec<u8>)>>,
	refused: HashSet<String>,
	bad_login: HashSet<String>,
	missing_dirs: HashSet<String>,
	broken_store: HashSet<String>,
	store_delay: Option<Duration>,
	next_session: u64,
}

#[derive(Clone, Default)]
pub struct MockClient {
	state: Arc<Mutex<MockState>>,
}

impl MockClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// `connect` to `address` fails with `ConnectionRefused`.
	pub fn refuse(&self, address: &str) {
		self.state.lock().refused.insert(address.to_string());
	}

	/// `authenticate` on sessions to `address` is rejected with a 530 reply.
	pub fn reject_login(&self, address: &str) {
		self.state.lock().bad_login.insert(address.to_string());
	}

	/// `change_dir(path)` is rejected with a 550 reply on every session.
	pub fn missing_dir(&self, path: &str) {
		self.state.lock().missing_dirs.insert(path.to_string());
	}

	/// `store` on sessions to `address` fails with a transport error.
	pub fn drop_connection_on_store(&self, address: &str) {
		self.state.lock().broken_store.insert(address.to_string());
	}

	/// Every `store` sleeps this long before returning, widening race windows.
	pub fn set_store_delay(&self, delay: Duration) {
		self.state.lock().store_delay = Some(delay);
	}

	/// All calls made on sessions to `address`, in order.
	pub fn calls(&self, address: &str) -> Vec<Call> {
		self.state
			.lock()
			.log
			.iter()
			.filter(|(addr, _, _)| addr == address)
			.map(|(_, _, call)| call.clone())
			.collect()
	}

	/// Calls grouped per session to `address`, in session creation order.
	pub fn calls_by_session(&self, address: &str) -> Vec<Vec<Call>> {
		let state = self.state.lock();
		let mut sessions: Vec<(u64, Vec<Call>)> = Vec::new();
		for (_, id, call) in state.log.iter().filter(|(addr, _, _)| addr == address) {
			match sessions.iter_mut().find(|(sid, _)| sid == id) {
				Some((_, calls)) => calls.push(call.clone()),
				None => sessions.push((*id, vec![call.clone()])),
			}
		}
		sessions.into_iter().map(|(_, calls)| calls).collect()
	}

	pub fn connects(&self, address: &str) -> usize {
		self.count(address, |call| matches!(call, Call::Connect))
	}

	pub fn closed(&self, address: &str) -> usize {
		self.count(address, |call| matches!(call, Call::Close))
	}

	/// `(remote path, bytes)` for every successful store to `address`.
	pub fn stored(&self, address: &str) -> Vec<(String, Vec<u8>)> {
		self.state.lock().stored.get(address).cloned().unwrap_or_default()
	}

	fn count(&self, address: &str, pred: impl Fn(&Call) -> bool) -> usize {
		self.state
			.lock()
			.log
			.iter()
			.filter(|(addr, _, call)| addr == address && pred(call))
			.count()
	}
}

impl TransferClient for MockClient {
	type Session = MockSession;

	fn connect(&self, address: &str) -> Result<MockSession, ClientError> {
		let mut state = self.state.lock();
		if state.refused.contains(address) {
			return Err(io::Error::new(io::ErrorKind::ConnectionRefused, format!("dial tcp {address}: connection refused")).into());
		}
		state.next_session += 1;
		let id = state.next_session;
		state.log.push((address.to_string(), id, Call::Connect));
		Ok(MockSession {
			address: address.to_string(),
			id,
			state: Arc::clone(&self.state),
		})
	}
}

pub struct MockSession {
	address: String,
	id: u64,
	state: Arc<Mutex<MockState>>,
}

impl MockSession {
	fn record(&self, call: Call) {
		self.state.lock().log.push((self.address.clone(), self.id, call));
	}
}

impl TransferSession for MockSession {
	fn authenticate(&mut self, user: &str, _password: &str) -> Result<(), ClientError> {
		self.record(Call::Authenticate { user: user.to_string() });
		if self.state.lock().bad_login.contains(&self.address) {
			return Err(ClientError::Rejected("530 Login incorrect.".into()));
		}
		Ok(())
	}

	fn change_dir(&mut self, path: &str) -> Result<(), ClientError> {
		self.record(Call::ChangeDir(path.to_string()));
		if self.state.lock().missing_dirs.contains(path) {
			return Err(ClientError::Rejected(format!("550 {path}: No such file or directory")));
		}
		Ok(())
	}

	fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, ClientError> {
		self.record(Call::Store { path: remote_path.to_string() });
		let (delay, broken) = {
			let state = self.state.lock();
			(state.store_delay, state.broken_store.contains(&self.address))
		};
		if let Some(delay) = delay {
			std::thread::sleep(delay);
		}
		if broken {
			return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe").into());
		}

		let mut body = Vec::new();
		reader.read_to_end(&mut body)?;
		let len = body.len() as u64;
		self.state
			.lock()
			.stored
			.entry(self.address.clone())
			.or_default()
			.push((remote_path.to_string(), body));
		Ok(len)
	}

	fn close(&mut self) -> Result<(), ClientError> {
		self.record(Call::Close);
		Ok(())
	}
}
