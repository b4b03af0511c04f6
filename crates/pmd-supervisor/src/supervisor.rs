use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backoff::{Backoff, BackoffPolicy, Exit};
use crate::logs;
use crate::store::ConfigStore;
use crate::types::{EntryStatus, ProcessEntry};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	pub log_dir: PathBuf,
	pub backoff: BackoffPolicy,
	/// How long a terminated child gets between SIGTERM and SIGKILL.
	pub stop_grace: Duration,
}

/// Live state of one supervision loop. Written only by that loop.
#[derive(Debug, Clone, Default)]
pub struct RuntimeHandle {
	pub pid: Option<u32>,
	pub spawned_at: Option<Instant>,
	pub failures: u32,
	/// Spawn attempts since this activation began.
	pub spawns: u32,
	pub alive: bool,
}

impl RuntimeHandle {
	pub fn restarts(&self) -> u32 {
		self.spawns.saturating_sub(1)
	}

	pub fn live_pid(&self) -> Option<u32> {
		if self.alive {
			self.pid
		} else {
			None
		}
	}

	pub fn uptime(&self) -> Option<Duration> {
		if self.alive {
			self.spawned_at.map(|t| t.elapsed())
		} else {
			None
		}
	}
}

struct Activation {
	stop: CancellationToken,
	runtime: Arc<RwLock<RuntimeHandle>>,
	task: JoinHandle<()>,
}

impl Activation {
	fn is_active(&self) -> bool {
		!self.stop.is_cancelled() && !self.task.is_finished()
	}

	async fn retire(self) {
		self.stop.cancel();
		let _ = self.task.await;
	}
}

/// Owns one supervision loop per enabled entry.
///
/// Entries themselves live in the [`ConfigStore`]; loops look their entry up
/// by name before every spawn, so env edits apply from the next respawn on.
pub struct Supervisor {
	store: Arc<ConfigStore>,
	config: SupervisorConfig,
	shutdown: CancellationToken,
	activations: Mutex<HashMap<String, Activation>>,
}

impl Supervisor {
	pub fn new(store: Arc<ConfigStore>, config: SupervisorConfig, shutdown: CancellationToken) -> Arc<Self> {
		Arc::new(Self {
			store,
			config,
			shutdown,
			activations: Mutex::new(HashMap::new()),
		})
	}

	pub fn store(&self) -> &Arc<ConfigStore> {
		&self.store
	}

	pub fn log_dir(&self) -> &Path {
		&self.config.log_dir
	}

	/// Starts loops for every entry persisted as enabled.
	pub async fn resume_enabled(self: &Arc<Self>) {
		for entry in self.store.entries().await {
			if entry.enabled {
				self.activate(&entry.name).await;
			}
		}
	}

	/// Begins a new supervision loop for `name` unless one is already active.
	///
	/// The new activation is registered right away, so a stop issued while a
	/// previous loop is still winding down cancels it. The new loop awaits that
	/// previous loop before its first spawn; two children of one entry never
	/// overlap.
	pub async fn activate(self: &Arc<Self>, name: &str) -> bool {
		if self.shutdown.is_cancelled() {
			return false;
		}

		let mut activations = self.activations.lock().await;
		let previous = match activations.remove(name) {
			Some(activation) if activation.is_active() => {
				activations.insert(name.to_string(), activation);
				return false;
			}
			previous => previous,
		};
		activations.insert(name.to_string(), self.spawn_loop(name, previous));
		true
	}

	/// Signals the loop for `name` to stop. Its live child is terminated
	/// right away; the loop exits without respawning.
	pub async fn deactivate(&self, name: &str) -> bool {
		let activations = self.activations.lock().await;
		match activations.get(name) {
			Some(activation) => {
				activation.stop.cancel();
				tracing::info!("{}: stop requested", name);
				true
			}
			None => false,
		}
	}

	/// Stops the loop for `name` and waits until its child is gone.
	pub async fn retire(&self, name: &str) {
		let activation = self.activations.lock().await.remove(name);
		if let Some(activation) = activation {
			activation.retire().await;
		}
	}

	pub async fn runtime(&self, name: &str) -> Option<RuntimeHandle> {
		let activations = self.activations.lock().await;
		match activations.get(name) {
			Some(activation) if !activation.task.is_finished() => {
				Some(activation.runtime.read().await.clone())
			}
			_ => None,
		}
	}

	pub async fn list(&self) -> Vec<EntryStatus> {
		let entries = self.store.entries().await;
		let mut result = Vec::with_capacity(entries.len());
		for entry in entries {
			let runtime = self.runtime(&entry.name).await;
			result.push(entry_status(entry, runtime.as_ref()));
		}
		result
	}

	/// Stops every loop and waits for all of them to finish.
	pub async fn drain(&self) {
		let activations: Vec<(String, Activation)> = self.activations.lock().await.drain().collect();
		tracing::info!("waiting for {} supervision loop(s)", activations.len());
		for (name, activation) in activations {
			activation.retire().await;
			tracing::debug!("{}: loop finished", name);
		}
	}

	fn spawn_loop(&self, name: &str, previous: Option<Activation>) -> Activation {
		let stop = self.shutdown.child_token();
		let runtime = Arc::new(RwLock::new(RuntimeHandle::default()));
		let entry_loop = EntryLoop {
			name: name.to_string(),
			store: Arc::clone(&self.store),
			log_dir: self.config.log_dir.clone(),
			backoff: Backoff::new(self.config.backoff),
			stop_grace: self.config.stop_grace,
			runtime: Arc::clone(&runtime),
			stop: stop.clone(),
		};
		tracing::info!("{}: supervision started", name);
		let task = tokio::spawn(async move {
			if let Some(previous) = previous {
				previous.retire().await;
			}
			entry_loop.run().await;
		});
		Activation { stop, runtime, task }
	}
}

pub fn entry_status(entry: ProcessEntry, runtime: Option<&RuntimeHandle>) -> EntryStatus {
	EntryStatus {
		bin: entry.command_line(),
		name: entry.name,
		enabled: entry.enabled,
		pid: runtime.and_then(|r| r.live_pid()),
		cwd: entry.cwd,
		restarts: runtime.map(|r| r.restarts()),
		uptime_ms: runtime.and_then(|r| r.uptime()).map(|d| d.as_millis() as u64),
		env: entry.env,
	}
}

/// Spawn / await-exit / respawn cycle for a single entry.
///
/// `stop` fires on an explicit stop request or on daemon shutdown, being a
/// child of the supervisor's shutdown token. It is checked before every spawn.
pub struct EntryLoop {
	pub name: String,
	pub store: Arc<ConfigStore>,
	pub log_dir: PathBuf,
	pub backoff: Backoff,
	pub stop_grace: Duration,
	pub runtime: Arc<RwLock<RuntimeHandle>>,
	pub stop: CancellationToken,
}

impl EntryLoop {
	pub async fn run(mut self) {
		loop {
			if self.stop.is_cancelled() {
				break;
			}

			let entry = match self.store.get(&self.name).await {
				Some(entry) => entry,
				None => break,
			};

			let exit = self.run_once(&entry).await;

			if self.stop.is_cancelled() || !self.store.is_enabled(&self.name).await {
				tracing::info!("{}: stopped ({})", self.name, exit);
				break;
			}

			let delay = self.backoff.record(exit);
			self.runtime.write().await.failures = self.backoff.failures();

			match delay {
				None => {
					tracing::info!("{}: exited cleanly, respawning", self.name);
				}
				Some(delay) => {
					tracing::warn!(
						"{}: crashed ({}), respawning in {}ms (failure {})",
						self.name,
						exit,
						delay.as_millis(),
						self.backoff.failures()
					);
					tokio::select! {
						_ = tokio::time::sleep(delay) => {}
						_ = self.stop.cancelled() => {
							tracing::info!("{}: stopped during backoff", self.name);
							break;
						}
					}
				}
			}
		}

		let mut runtime = self.runtime.write().await;
		runtime.alive = false;
		runtime.pid = None;
	}

	async fn run_once(&mut self, entry: &ProcessEntry) -> Exit {
		self.runtime.write().await.spawns += 1;

		let mut child = match spawn_child(entry, &self.log_dir) {
			Ok(child) => child,
			Err(e) => {
				let msg = format!("failed to spawn {}: {}", entry.bin.display(), e);
				tracing::warn!("{}: {}", entry.name, msg);
				logs::append_note(&self.log_dir, &entry.name, &msg);
				return Exit::Failed;
			}
		};

		let pid = child.id();
		{
			let mut runtime = self.runtime.write().await;
			runtime.pid = pid;
			runtime.spawned_at = Some(Instant::now());
			runtime.alive = true;
		}
		tracing::info!("{}: spawned (pid {})", entry.name, pid.unwrap_or(0));

		let status = tokio::select! {
			status = child.wait() => status,
			_ = self.stop.cancelled() => terminate(&mut child, self.stop_grace).await,
		};

		self.runtime.write().await.alive = false;

		match status {
			Ok(status) => Exit::from(status),
			Err(e) => {
				tracing::warn!("{}: failed to wait on child: {}", entry.name, e);
				Exit::Failed
			}
		}
	}
}

/// Spawns exactly what the entry declares, with no inherited environment.
/// Output goes straight to the entry's log files.
fn spawn_child(entry: &ProcessEntry, log_dir: &Path) -> io::Result<Child> {
	let (stdout, stderr) = logs::open_logs(log_dir, &entry.name)?;

	let mut cmd = Command::new(&entry.bin);
	cmd.args(&entry.args)
		.current_dir(&entry.cwd)
		.env_clear()
		.envs(&entry.env)
		.stdin(Stdio::null())
		.stdout(Stdio::from(stdout))
		.stderr(Stdio::from(stderr))
		.process_group(0)
		.kill_on_drop(true);

	cmd.spawn()
}

/// SIGTERM to the child's process group, SIGKILL if it outlives `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
	if let Some(pid) = child.id() {
		signal_group(pid, nix::sys::signal::Signal::SIGTERM);
	}

	match tokio::time::timeout(grace, child.wait()).await {
		Ok(status) => status,
		Err(_) => {
			if let Some(pid) = child.id() {
				tracing::warn!("pid {} ignored SIGTERM for {:?}, killing", pid, grace);
				signal_group(pid, nix::sys::signal::Signal::SIGKILL);
			}
			child.kill().await?;
			child.wait().await
		}
	}
}

fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
	use nix::sys::signal::killpg;
	use nix::unistd::Pid;
	if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
		tracing::debug!("killpg {} {:?}: {}", pid, signal, e);
	}
}
