//! Inbound transfer request.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to turn a raw query string into a [`TransferRequest`].
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("empty request")]
	Empty,

	#[error("invalid url encoding: {0}")]
	Unescape(#[from] std::string::FromUtf8Error),

	#[error("invalid request json: {0}")]
	Json(#[from] serde_json::Error),

	#[error("field `{0}` must not be empty")]
	EmptyField(&'static str),
}

/// One upload job: where to connect, how to log in, and which file to send where.
///
/// Field names on the wire follow the legacy gateway (`ftpaddr`, `locatedir`, ...).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
	/// Remote server as `host:port`, also the session cache key.
	#[serde(rename = "ftpaddr")]
	pub address: String,
	#[serde(rename = "ftpuser")]
	pub user: String,
	#[serde(rename = "ftppasswd")]
	pub password: String,
	/// Directory on the server to change into before storing.
	#[serde(rename = "remotedir")]
	pub remote_dir: String,
	#[serde(rename = "locatedir")]
	pub local_dir: String,
	/// File name, used both locally and on the server.
	#[serde(rename = "locatefile")]
	pub local_file: String,
}

impl TransferRequest {
	/// Decodes a raw (still URL-encoded) query string.
	///
	/// `+` is read as a space and `%XX` escapes are resolved before the
	/// remainder is parsed as a JSON object.
	pub fn decode(raw_query: &str) -> Result<Self, DecodeError> {
		if raw_query.trim().is_empty() {
			return Err(DecodeError::Empty);
		}
		let spaced = raw_query.replace('+', " ");
		let json = urlencoding::decode(&spaced)?;
		Self::from_json(&json)
	}

	/// Parses an already unescaped JSON document.
	pub fn from_json(json: &str) -> Result<Self, DecodeError> {
		let request: Self = serde_json::from_str(json)?;
		request.validate()?;
		Ok(request)
	}

	fn validate(&self) -> Result<(), DecodeError> {
		if self.address.trim().is_empty() {
			return Err(DecodeError::EmptyField("ftpaddr"));
		}
		if self.local_file.trim().is_empty() {
			return Err(DecodeError::EmptyField("locatefile"));
		}
		Ok(())
	}

	/// Local path of the file to upload: `local_dir/local_file`.
	pub fn local_path(&self) -> PathBuf {
		PathBuf::from(&self.local_dir).join(&self.local_file)
	}

	/// Remote path the file is stored under: `remote_dir/local_file`.
	pub fn remote_path(&self) -> String {
		format!("{}/{}", self.remote_dir.trim_end_matches('/'), self.local_file)
	}
}

impl fmt::Debug for TransferRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransferRequest")
			.field("address", &self.address)
			.field("user", &self.user)
			.field("password", &"<redacted>")
			.field("remote_dir", &self.remote_dir)
			.field("local_dir", &self.local_dir)
			.field("local_file", &self.local_file)
			.finish()
	}
}
