//! Local socket IPC for pmd.
//!
//! A daemon binds one Unix socket under a per-user base directory and answers
//! method + path requests with a status code and an optional JSON body, one
//! JSON document per line in each direction.

pub mod paths;
pub mod protocol;
pub mod server;
pub mod client;
pub mod daemon;

pub use paths::DaemonPaths;
pub use protocol::{Method, Request, Response};
pub use client::{ClientError, DaemonClient};
pub use daemon::Daemon;
