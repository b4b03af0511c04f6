use pmd_ipc::DaemonPaths;
use std::path::PathBuf;

pub const APP_NAME: &str = "pmd";

pub fn store_path(paths: &DaemonPaths) -> PathBuf {
	paths.base_dir().join(format!("{}.json", paths.app_name))
}

pub fn log_dir(paths: &DaemonPaths) -> PathBuf {
	paths.base_dir().join("logs")
}

pub fn settings_path(paths: &DaemonPaths) -> PathBuf {
	paths.base_dir().join("config.toml")
}
