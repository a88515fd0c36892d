//! Wire types for the putfile gateway.
//!
//! This crate holds the shapes of data crossing the HTTP boundary:
//! - [`TransferRequest`]: decoded from the URL-encoded JSON query of `GET /putfile`
//! - [`TransferResult`]: the `{ flag, error }` envelope sent back to the caller
//!
//! Types here are pure data. Session handling lives in `putfile-rs`.

pub mod request;
pub mod result;

pub use request::{DecodeError, TransferRequest};
pub use result::{FLAG_FAILURE, FLAG_SUCCESS, TransferResult};
