use pmd_supervisor::{BackoffPolicy, SupervisorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Daemon settings (<base>/config.toml) ────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub supervisor: SupervisorSettings,
	#[serde(default)]
	pub backoff: BackoffPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
	#[serde(default = "default_stop_grace_secs")]
	pub stop_grace_secs: u64,
}

impl Default for SupervisorSettings {
	fn default() -> Self {
		Self { stop_grace_secs: default_stop_grace_secs() }
	}
}

fn default_stop_grace_secs() -> u64 { 3 }

impl Settings {
	pub fn supervisor_config(&self, log_dir: PathBuf) -> SupervisorConfig {
		SupervisorConfig {
			log_dir,
			backoff: self.backoff,
			stop_grace: Duration::from_secs(self.supervisor.stop_grace_secs),
		}
	}
}

pub fn load_settings(path: &Path) -> Settings {
	if path.exists() {
		match std::fs::read_to_string(path) {
			Ok(content) => match toml::from_str(&content) {
				Ok(settings) => return settings,
				Err(e) => tracing::warn!("failed to parse {}: {}", path.display(), e),
			},
			Err(e) => tracing::warn!("failed to read {}: {}", path.display(), e),
		}
	}
	Settings::default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_backoff_schedule() {
		let settings = Settings::default();
		assert_eq!(settings.supervisor.stop_grace_secs, 3);
		assert_eq!(settings.backoff, BackoffPolicy { base_ms: 1000, max_ms: 60_000, max_failures: 6 });
	}

	#[test]
	fn partial_file_keeps_other_defaults() {
		let settings: Settings = toml::from_str("[backoff]\nmax_ms = 5000\n").unwrap();
		assert_eq!(settings.backoff.max_ms, 5000);
		assert_eq!(settings.backoff.base_ms, 1000);
		assert_eq!(settings.supervisor.stop_grace_secs, 3);

		let config = settings.supervisor_config("/tmp/logs".into());
		assert_eq!(config.stop_grace, Duration::from_secs(3));
	}

	#[test]
	fn unreadable_or_invalid_file_falls_back() {
		let missing = load_settings(Path::new("/nonexistent/pmd/config.toml"));
		assert_eq!(missing.backoff, BackoffPolicy::default());

		let path = std::env::temp_dir().join(format!("pmd-settings-{}.toml", std::process::id()));
		std::fs::write(&path, "[supervisor\nnope").unwrap();
		assert_eq!(load_settings(&path).supervisor.stop_grace_secs, 3);
		let _ = std::fs::remove_file(&path);
	}
}
