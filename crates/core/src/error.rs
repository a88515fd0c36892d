use std::path::PathBuf;

use thiserror::Error;

use crate::client::ClientError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("connect to {address} failed: {source}")]
	Connect {
		address: String,
		#[source]
		source: ClientError,
	},

	#[error("login to {address} as {user} failed: {source}")]
	Login {
		address: String,
		user: String,
		#[source]
		source: ClientError,
	},

	#[error("change remote directory to {path} failed: {source}")]
	Directory {
		path: String,
		#[source]
		source: ClientError,
	},

	#[error("open local file {} failed: {source}", path.display())]
	LocalFile {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("store {path} failed: {source}")]
	Transfer {
		path: String,
		#[source]
		source: ClientError,
	},

	/// A queued request found its session invalidated by the request ahead of it.
	#[error("session to {address} was closed")]
	SessionClosed { address: String },

	#[error("transfer task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Coarse classification used in logs and by callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Connect,
	Directory,
	LocalFile,
	Transfer,
	SessionClosed,
	Internal,
}

impl ErrorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Connect => "connect",
			ErrorKind::Directory => "directory",
			ErrorKind::LocalFile => "local_file",
			ErrorKind::Transfer => "transfer",
			ErrorKind::SessionClosed => "session_closed",
			ErrorKind::Internal => "internal",
		}
	}
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::Connect { .. } | Error::Login { .. } => ErrorKind::Connect,
			Error::Directory { .. } => ErrorKind::Directory,
			Error::LocalFile { .. } => ErrorKind::LocalFile,
			Error::Transfer { .. } => ErrorKind::Transfer,
			Error::SessionClosed { .. } => ErrorKind::SessionClosed,
			Error::Join(_) => ErrorKind::Internal,
		}
	}

	/// True when a session-level step failed because the connection dropped.
	pub fn is_connection_lost(&self) -> bool {
		match self {
			Error::Directory { source, .. } | Error::Transfer { source, .. } => source.is_connection_lost(),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io;

	use super::*;

	#[test]
	fn login_failures_classify_as_connect() {
		let err = Error::Login {
			address: "h:21".into(),
			user: "u".into(),
			source: ClientError::Rejected("530 Login incorrect".into()),
		};
		assert_eq!(err.kind(), ErrorKind::Connect);
		assert_eq!(err.to_string(), "login to h:21 as u failed: 530 Login incorrect");
	}

	#[test]
	fn only_io_failures_mean_connection_lost() {
		let dropped = Error::Transfer {
			path: "/in/a.bin".into(),
			source: ClientError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")),
		};
		let refused = Error::Directory {
			path: "/missing".into(),
			source: ClientError::Rejected("550 No such directory".into()),
		};
		assert!(dropped.is_connection_lost());
		assert!(!refused.is_connection_lost());
	}
}
