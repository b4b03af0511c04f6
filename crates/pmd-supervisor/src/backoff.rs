use serde::Deserialize;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

/// How one run of a child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
	Code(i32),
	Signal(i32),
	/// The child could not be spawned or waited on.
	Failed,
}

impl Exit {
	pub fn is_success(&self) -> bool {
		matches!(self, Exit::Code(0))
	}
}

impl From<ExitStatus> for Exit {
	fn from(status: ExitStatus) -> Self {
		match (status.code(), status.signal()) {
			(Some(code), _) => Exit::Code(code),
			(None, Some(signal)) => Exit::Signal(signal),
			(None, None) => Exit::Failed,
		}
	}
}

impl std::fmt::Display for Exit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Exit::Code(code) => write!(f, "exit {}", code),
			Exit::Signal(signal) => write!(f, "signal {}", signal),
			Exit::Failed => write!(f, "failed"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
	pub base_ms: u64,
	pub max_ms: u64,
	pub max_failures: u32,
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self {
			base_ms: 1000,
			max_ms: 60_000,
			max_failures: 6,
		}
	}
}

impl BackoffPolicy {
	/// `min(base * 2^failures, max)`.
	pub fn delay(&self, failures: u32) -> Duration {
		let factor = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
		Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
	}
}

/// Consecutive-failure counter for one supervision loop.
#[derive(Debug, Clone)]
pub struct Backoff {
	policy: BackoffPolicy,
	failures: u32,
}

impl Backoff {
	pub fn new(policy: BackoffPolicy) -> Self {
		Self { policy, failures: 0 }
	}

	pub fn failures(&self) -> u32 {
		self.failures
	}

	/// Records an exit and returns how long to wait before respawning.
	/// A clean exit resets the counter and respawns immediately.
	pub fn record(&mut self, exit: Exit) -> Option<Duration> {
		if exit.is_success() {
			self.failures = 0;
			return None;
		}
		self.failures = (self.failures + 1).min(self.policy.max_failures);
		Some(self.policy.delay(self.failures))
	}
}
