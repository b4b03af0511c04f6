use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn stdout_log_path(log_dir: &Path, name: &str) -> PathBuf {
	log_dir.join(format!("{}.log", name))
}

pub fn stderr_log_path(log_dir: &Path, name: &str) -> PathBuf {
	log_dir.join(format!("{}.err", name))
}

/// Opens both log destinations for append, creating them if needed.
/// Content accumulates across restarts; nothing is ever truncated here.
pub fn open_logs(log_dir: &Path, name: &str) -> io::Result<(File, File)> {
	fs::create_dir_all(log_dir)?;
	let stdout = open_append(&stdout_log_path(log_dir, name))?;
	let stderr = open_append(&stderr_log_path(log_dir, name))?;
	Ok((stdout, stderr))
}

/// Appends a supervisor line to the entry's error log.
pub fn append_note(log_dir: &Path, name: &str, message: &str) {
	let path = stderr_log_path(log_dir, name);
	let written = fs::create_dir_all(log_dir)
		.and_then(|_| open_append(&path))
		.and_then(|mut file| writeln!(file, "[pmd] {}", message));
	if let Err(e) = written {
		tracing::warn!("failed to write {}: {}", path.display(), e);
	}
}

pub fn remove_logs(log_dir: &Path, name: &str) -> io::Result<()> {
	for path in [stdout_log_path(log_dir, name), stderr_log_path(log_dir, name)] {
		match fs::remove_file(&path) {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(e),
		}
	}
	Ok(())
}

fn open_append(path: &Path) -> io::Result<File> {
	OpenOptions::new().create(true).append(true).open(path)
}
