use std::path::PathBuf;

/// Locations of everything a daemon keeps on disk, all under one base directory.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
	pub app_name: String,
	base_dir: Option<PathBuf>,
}

impl DaemonPaths {
	pub fn new(app_name: impl Into<String>) -> Self {
		Self {
			app_name: app_name.into(),
			base_dir: None,
		}
	}

	pub fn with_base_dir(app_name: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
		Self {
			app_name: app_name.into(),
			base_dir: Some(base_dir.into()),
		}
	}

	pub fn base_dir(&self) -> PathBuf {
		if let Some(dir) = &self.base_dir {
			dir.clone()
		} else if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
			PathBuf::from(dir).join(&self.app_name)
		} else if let Some(home) = home_dir() {
			home.join(".config").join(&self.app_name)
		} else {
			PathBuf::from("/tmp").join(&self.app_name)
		}
	}

	pub fn socket_path(&self) -> PathBuf {
		self.base_dir().join(format!("{}.sock", self.app_name))
	}

	pub fn pid_path(&self) -> PathBuf {
		self.base_dir().join(format!("{}.pid", self.app_name))
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}
