//! Transfer-protocol boundary.
//!
//! Both traits are blocking: implementations perform network I/O on the
//! calling thread. The registry and executor only invoke them from tokio's
//! blocking pool.

use std::io::Read;

use thiserror::Error;

/// Error reported by a transfer client or session.
#[derive(Debug, Error)]
pub enum ClientError {
	/// Transport failure; the connection should be considered gone.
	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// The server answered but refused the command.
	#[error("{0}")]
	Rejected(String),
}

impl ClientError {
	/// Whether the underlying connection can no longer be used.
	pub fn is_connection_lost(&self) -> bool {
		matches!(self, ClientError::Io(_))
	}
}

/// Opens connections to remote transfer servers.
pub trait TransferClient: Send + Sync + 'static {
	type Session: TransferSession;

	/// Opens an unauthenticated connection to `address` (`host:port`).
	fn connect(&self, address: &str) -> Result<Self::Session, ClientError>;
}

/// A single live connection to a transfer server.
pub trait TransferSession: Send + 'static {
	fn authenticate(&mut self, user: &str, password: &str) -> Result<(), ClientError>;

	/// Changes the remote working directory.
	fn change_dir(&mut self, path: &str) -> Result<(), ClientError>;

	/// Streams `reader` to `remote_path`, returning the number of bytes written.
	fn store(&mut self, remote_path: &str, reader: &mut dyn Read) -> Result<u64, ClientError>;

	/// Ends the session. Called at most once per session.
	fn close(&mut self) -> Result<(), ClientError>;
}
