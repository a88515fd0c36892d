//! Session-lifecycle core of the putfile gateway.
//!
//! A caller hands over a [`TransferRequest`]; the [`TransferService`] finds or
//! opens a session to the remote server through the [`SessionRegistry`],
//! serializes work per address, and uploads the file with the executor. A
//! [`Reaper`] task closes sessions that stay idle past the configured timeout.
//!
//! # Main Types
//!
//! - [`TransferClient`] / [`TransferSession`]: blocking transfer-protocol boundary
//! - [`FtpClient`]: FTP implementation of that boundary
//! - [`SessionRegistry`]: address-keyed session cache with busy/idle bookkeeping
//! - [`Reaper`]: periodic idle-session eviction
//! - [`TransferService`]: request-level entry point

pub mod client;
pub mod error;
pub mod executor;
pub mod ftp;
pub mod reaper;
pub mod registry;
pub mod service;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ClientError, TransferClient, TransferSession};
pub use error::{Error, ErrorKind, Result};
pub use ftp::{FtpClient, FtpSession};
pub use putfile_protocol::{TransferRequest, TransferResult};
pub use reaper::Reaper;
pub use registry::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, Lease, RegistryConfig, SessionHandle, SessionInfo, SessionRegistry};
pub use service::TransferService;
