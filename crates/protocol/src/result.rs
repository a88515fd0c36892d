use serde::{Deserialize, Serialize};

pub const FLAG_SUCCESS: i32 = 0;
pub const FLAG_FAILURE: i32 = -1;

/// Outcome envelope returned to the caller.
///
/// `error` is omitted from the JSON entirely on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
	pub flag: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl TransferResult {
	pub fn success() -> Self {
		Self {
			flag: FLAG_SUCCESS,
			error: None,
		}
	}

	pub fn failure(message: impl Into<String>) -> Self {
		Self {
			flag: FLAG_FAILURE,
			error: Some(message.into()),
		}
	}

	pub fn is_success(&self) -> bool {
		self.flag == FLAG_SUCCESS
	}
}
