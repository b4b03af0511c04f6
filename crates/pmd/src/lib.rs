//! The pmd daemon: control routes over the local socket, supervision of
//! every enabled entry, and coordinated shutdown.

pub mod control;
pub mod paths;
pub mod settings;
pub mod shutdown;

use std::fmt;
use std::io;
use std::sync::Arc;

use pmd_ipc::{Daemon, DaemonPaths};
use pmd_supervisor::{ConfigStore, Supervisor};

pub use control::{ControlServer, Route};
pub use shutdown::ShutdownCoordinator;

#[derive(Debug)]
pub enum DaemonError {
	/// The store file could not be loaded.
	Store(pmd_supervisor::Error),
	/// Preparing the base directory or binding the socket failed.
	Io(io::Error),
}

impl fmt::Display for DaemonError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DaemonError::Store(e) => write!(f, "{}", e),
			DaemonError::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

impl std::error::Error for DaemonError {}

impl From<io::Error> for DaemonError {
	fn from(e: io::Error) -> Self {
		DaemonError::Io(e)
	}
}

impl From<pmd_supervisor::Error> for DaemonError {
	fn from(e: pmd_supervisor::Error) -> Self {
		DaemonError::Store(e)
	}
}

/// Runs the daemon until `coordinator` is triggered, then drains loops and
/// connections and removes the socket.
pub async fn run(paths: DaemonPaths, coordinator: ShutdownCoordinator) -> Result<(), DaemonError> {
	let settings = settings::load_settings(&paths::settings_path(&paths));
	let store = Arc::new(ConfigStore::load(paths::store_path(&paths)).await?);
	tracing::info!(
		"loaded {} entries from {}",
		store.entries().await.len(),
		store.path().display()
	);

	let supervisor = Supervisor::new(
		store,
		settings.supervisor_config(paths::log_dir(&paths)),
		coordinator.token(),
	);

	let daemon = Daemon::new(paths);
	daemon.prepare()?;

	supervisor.resume_enabled().await;

	let control = ControlServer::new(Arc::clone(&supervisor));
	let served = daemon.serve(control.handler(), coordinator.token()).await;

	coordinator.finish(&supervisor, &daemon).await;
	served.map_err(DaemonError::from)
}
