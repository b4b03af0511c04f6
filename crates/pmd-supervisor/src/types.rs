use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One declared managed process, as persisted in the store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
	pub name: String,
	pub bin: PathBuf,
	#[serde(default)]
	pub args: Vec<String>,
	pub cwd: PathBuf,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	/// Desired running state.
	#[serde(default)]
	pub enabled: bool,
}

impl ProcessEntry {
	pub fn new(
		name: impl Into<String>,
		bin: impl Into<PathBuf>,
		args: Vec<String>,
		cwd: impl Into<PathBuf>,
	) -> Self {
		Self {
			name: name.into(),
			bin: bin.into(),
			args,
			cwd: cwd.into(),
			env: BTreeMap::new(),
			enabled: false,
		}
	}

	/// Executable followed by its arguments, space separated.
	pub fn command_line(&self) -> String {
		let mut line = self.bin.display().to_string();
		for arg in &self.args {
			line.push(' ');
			line.push_str(arg);
		}
		line
	}
}

/// An entry joined with the live state of its supervision loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryStatus {
	pub name: String,
	pub enabled: bool,
	pub pid: Option<u32>,
	pub bin: String,
	pub cwd: PathBuf,
	pub restarts: Option<u32>,
	pub uptime_ms: Option<u64>,
	pub env: BTreeMap<String, String>,
}
