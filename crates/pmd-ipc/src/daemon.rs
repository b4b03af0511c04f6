use std::future::Future;
use std::io;

use tokio_util::sync::CancellationToken;

use crate::paths::DaemonPaths;
use crate::protocol::{Request, Response};
use crate::{client, server};

pub struct Daemon {
	pub paths: DaemonPaths,
}

impl Daemon {
	pub fn new(paths: DaemonPaths) -> Self {
		Self { paths }
	}

	/// Creates the base directory, records our pid and clears a stale socket.
	/// Fails if another daemon is already answering on the socket.
	pub fn prepare(&self) -> io::Result<()> {
		std::fs::create_dir_all(self.paths.base_dir())?;

		let socket_path = self.paths.socket_path();
		if client::is_running(&self.paths) {
			return Err(io::Error::new(
				io::ErrorKind::AddrInUse,
				format!("daemon already running on {}", socket_path.display()),
			));
		}
		if socket_path.exists() {
			std::fs::remove_file(&socket_path)?;
		}

		std::fs::write(self.paths.pid_path(), std::process::id().to_string())?;
		Ok(())
	}

	pub async fn serve<F, Fut>(&self, handler: F, shutdown: CancellationToken) -> io::Result<()>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Response> + Send + 'static,
	{
		tracing::info!("daemon started (pid {})", std::process::id());
		server::run_socket_server(&self.paths, handler, shutdown).await
	}

	/// `prepare`, `serve` until `shutdown`, then `cleanup`.
	pub async fn run<F, Fut>(&self, handler: F, shutdown: CancellationToken) -> io::Result<()>
	where
		F: Fn(Request) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Response> + Send + 'static,
	{
		self.prepare()?;
		let served = self.serve(handler, shutdown).await;
		self.cleanup();
		served
	}

	pub fn cleanup(&self) {
		let _ = std::fs::remove_file(self.paths.socket_path());
		let _ = std::fs::remove_file(self.paths.pid_path());
	}
}
