//! FTP implementation of the transfer boundary, backed by `suppaftp`.

use std::io::{self, Read};
use std::net::ToSocketAddrs;
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

use crate::client::{ClientError, TransferClient, TransferSession};

impl From<FtpError> for ClientError {
	fn from(err: FtpError) -> Self {
		match err {
			FtpError::ConnectionError(io) => ClientError::Io(io),
			other => ClientError::Rejected(other.to_string()),
		}
	}
}

/// Plain-FTP client. Sessions use binary transfer mode.
#[derive(Debug, Clone, Default)]
pub struct FtpClient {
	connect_timeout: Option<Duration>,
}

impl FtpClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Bounds the TCP connect to each resolved address.
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = Some(timeout);
		self
	}

	fn open(&self, address: &str) -> Result<FtpStream, ClientError> {
		let Some(timeout) = self.connect_timeout else {
			return Ok(FtpStream::connect(address)?);
		};

		let mut last_err = None;
		for addr in address.to_socket_addrs()? {
			match FtpStream::connect_timeout(addr, timeout) {
				Ok(stream) => return Ok(stream),
				Err(err) => last_err = Some(err),
			}
		}
		match last_err {
			Some(err) => Err(err.into()),
			None => Err(io::Error::new(io::ErrorKind::NotFound, format!("no address resolved for {address}")).into()),
		}
	}
}

impl TransferClient for FtpClient {
	type Session = FtpSession;

	fn connect(&self, address: &str) -> Result<FtpSession, ClientError> {
		debug!(target = "putfile.ftp", address, "dialing");
		let stream = self.open(address)?;
		Ok(FtpSession { stream })
	}
}

pub struct FtpSession {
	stream: FtpStream,
}

impl TransferSession for FtpSession {
	fn authenticate(&mut self, user: &str, password: &str) -> Result<(), ClientError> {
		self.stream.login(user, password)?;
		self.stream.transfer_type(FileType::Binary)?;
		Ok(())
	}

	fn change_dir(&mut self, path: &str) -> Result<(), ClientError> {
		self.stream.cwd(path)?;
		Ok(())
	}

	fn store(&mut self, remote_path: &str, mut reader: &mut dyn Read) -> Result<u64, ClientError> {
		Ok(self.stream.put_file(remote_path, &mut reader)?)
	}

	fn close(&mut self) -> Result<(), ClientError> {
		self.stream.quit()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_errors_map_to_io() {
		let err: ClientError = FtpError::ConnectionError(io::Error::new(io::ErrorKind::ConnectionReset, "reset")).into();
		assert!(err.is_connection_lost());
	}

	#[test]
	fn refused_connection_maps_to_transport_error() {
		// Port 1 on loopback is closed on any sane test host.
		let client = FtpClient::new().with_connect_timeout(Duration::from_secs(2));
		let err = client.connect("127.0.0.1:1").err().expect("connect should fail");
		assert!(err.is_connection_lost(), "got {err:?}");
	}
}
