use std::io;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pmd_ipc::Daemon;
use pmd_supervisor::Supervisor;

/// Owns the single cancellation signal of a daemon run.
///
/// Supervision loops hold child tokens of it and the socket server watches it
/// directly, so one `trigger` reaches every waiting task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
	token: CancellationToken,
}

impl ShutdownCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn token(&self) -> CancellationToken {
		self.token.clone()
	}

	pub fn trigger(&self) {
		if !self.token.is_cancelled() {
			tracing::info!("shutting down");
		}
		self.token.cancel();
	}

	pub fn is_triggered(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Triggers shutdown on the first SIGINT or SIGTERM.
	pub fn listen_for_signals(&self) -> io::Result<JoinHandle<()>> {
		let mut sigint = signal(SignalKind::interrupt())?;
		let mut sigterm = signal(SignalKind::terminate())?;
		let coordinator = self.clone();

		Ok(tokio::spawn(async move {
			tokio::select! {
				_ = sigint.recv() => tracing::info!("received SIGINT"),
				_ = sigterm.recv() => tracing::info!("received SIGTERM"),
				_ = coordinator.token.cancelled() => return,
			}
			coordinator.trigger();
		}))
	}

	/// Waits for every supervision loop to exit, then releases the socket.
	/// Call once the socket server has drained.
	pub async fn finish(&self, supervisor: &Supervisor, daemon: &Daemon) {
		self.trigger();
		supervisor.drain().await;
		daemon.cleanup();
		tracing::info!("shutdown complete");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn trigger_reaches_child_tokens() {
		let coordinator = ShutdownCoordinator::new();
		let child = coordinator.token().child_token();
		assert!(!coordinator.is_triggered());

		coordinator.clone().trigger();
		assert!(coordinator.is_triggered());
		tokio::time::timeout(std::time::Duration::from_millis(100), child.cancelled())
			.await
			.unwrap();

		coordinator.trigger();
		assert!(coordinator.is_triggered());
	}

	#[tokio::test]
	async fn signal_listener_exits_on_trigger() {
		let coordinator = ShutdownCoordinator::new();
		let listener = coordinator.listen_for_signals().unwrap();
		coordinator.trigger();
		tokio::time::timeout(std::time::Duration::from_secs(1), listener)
			.await
			.unwrap()
			.unwrap();
	}
}
