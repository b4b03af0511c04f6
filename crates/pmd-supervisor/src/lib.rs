//! # pmd-supervisor
//!
//! Keeps a persisted set of programs alive.
//!
//! Entries live in a [`ConfigStore`] (one pretty-printed JSON file). For each
//! enabled entry the [`Supervisor`] runs a loop that spawns the program with
//! exactly its declared environment, appends its output to per-entry log
//! files, and respawns it: immediately after a clean exit, after an
//! exponential backoff after a crash.
//!
//! ```rust,no_run
//! use pmd_supervisor::{BackoffPolicy, ConfigStore, ProcessEntry, Supervisor, SupervisorConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), pmd_supervisor::Error> {
//! let store = Arc::new(ConfigStore::load("/tmp/pmd/pmd.json").await?);
//! store
//!     .add(ProcessEntry::new("web", "/usr/bin/node", vec!["server.js".into()], "/srv"))
//!     .await?;
//! store.enable("web").await?;
//!
//! let shutdown = CancellationToken::new();
//! let sup = Supervisor::new(
//!     store,
//!     SupervisorConfig {
//!         log_dir: "/tmp/pmd/logs".into(),
//!         backoff: BackoffPolicy::default(),
//!         stop_grace: Duration::from_secs(3),
//!     },
//!     shutdown.clone(),
//! );
//! sup.activate("web").await;
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod error;
pub mod backoff;
pub mod logs;
pub mod store;
pub mod supervisor;

pub use types::*;
pub use error::{Error, Result};
pub use backoff::{Backoff, BackoffPolicy, Exit};
pub use store::ConfigStore;
pub use supervisor::{EntryLoop, RuntimeHandle, Supervisor, SupervisorConfig};
