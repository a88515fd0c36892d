//! HTTP front end for the putfile session core.
//!
//! Exposes `GET /putfile`, runs the idle-session reaper next to the server,
//! and closes every cached session on shutdown.

pub mod cli;
pub mod gateway;
pub mod logging;
pub mod server;
