use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::ProcessEntry;

/// The ordered set of entries, persisted as one pretty-printed JSON file.
///
/// Every mutation runs on a copy of the entries under the store lock, the copy
/// is written out in full, and only then replaces the in-memory state. A
/// failed write leaves memory exactly as it was on disk.
pub struct ConfigStore {
	path: PathBuf,
	entries: Mutex<Vec<ProcessEntry>>,
}

impl ConfigStore {
	/// Reads the store file. A missing file is an empty store.
	pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let entries = match tokio::fs::read_to_string(&path).await {
			Ok(content) => serde_json::from_str(&content)
				.map_err(|e| Error::Storage(format!("failed to parse {}: {}", path.display(), e)))?,
			Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
			Err(e) => {
				return Err(Error::Storage(format!("failed to read {}: {}", path.display(), e)));
			}
		};

		Ok(Self {
			path,
			entries: Mutex::new(entries),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub async fn entries(&self) -> Vec<ProcessEntry> {
		self.entries.lock().await.clone()
	}

	pub async fn get(&self, name: &str) -> Option<ProcessEntry> {
		self.entries.lock().await.iter().find(|e| e.name == name).cloned()
	}

	pub async fn is_enabled(&self, name: &str) -> bool {
		self.get(name).await.map(|e| e.enabled).unwrap_or(false)
	}

	pub async fn resolve(&self, query: &str) -> Result<ProcessEntry> {
		let entries = self.entries.lock().await;
		resolve_index(&entries, query)
			.map(|i| entries[i].clone())
			.ok_or_else(|| not_found(query))
	}

	/// Applies `f` and persists the result as a single transaction.
	pub async fn mutate<T, F>(&self, f: F) -> Result<T>
	where
		F: FnOnce(&mut Vec<ProcessEntry>) -> Result<T>,
	{
		let mut entries = self.entries.lock().await;
		let mut next = entries.clone();
		let value = f(&mut next)?;
		persist(&self.path, &next).await?;
		*entries = next;
		Ok(value)
	}

	/// Appends a new, disabled entry.
	pub async fn add(&self, mut entry: ProcessEntry) -> Result<()> {
		validate_name(&entry.name)?;
		entry.enabled = false;
		self.mutate(|entries| {
			if entries.iter().any(|e| e.name == entry.name) {
				return Err(Error::Conflict(format!("{} already exists", entry.name)));
			}
			entries.push(entry);
			Ok(())
		})
		.await
	}

	pub async fn remove(&self, query: &str) -> Result<ProcessEntry> {
		self.mutate(|entries| {
			let index = resolve_index(entries, query).ok_or_else(|| not_found(query))?;
			Ok(entries.remove(index))
		})
		.await
	}

	/// Marks an entry enabled. Already-enabled entries are a conflict.
	pub async fn enable(&self, query: &str) -> Result<ProcessEntry> {
		self.mutate(|entries| {
			let entry = resolve_mut(entries, query)?;
			if entry.enabled {
				return Err(Error::Conflict(format!("{} is already enabled", entry.name)));
			}
			entry.enabled = true;
			Ok(entry.clone())
		})
		.await
	}

	/// Marks an entry disabled. An entry that is not enabled counts as not found.
	pub async fn disable(&self, query: &str) -> Result<ProcessEntry> {
		self.mutate(|entries| {
			let entry = resolve_mut(entries, query)?;
			if !entry.enabled {
				return Err(Error::NotFound(format!("{} is not enabled", entry.name)));
			}
			entry.enabled = false;
			Ok(entry.clone())
		})
		.await
	}

	pub async fn env_set(&self, query: &str, key: &str, value: &str) -> Result<ProcessEntry> {
		self.mutate(|entries| {
			let entry = resolve_mut(entries, query)?;
			entry.env.insert(key.to_string(), value.to_string());
			Ok(entry.clone())
		})
		.await
	}

	pub async fn env_unset(&self, query: &str, key: &str) -> Result<ProcessEntry> {
		self.mutate(|entries| {
			let entry = resolve_mut(entries, query)?;
			entry.env.remove(key);
			Ok(entry.clone())
		})
		.await
	}
}

/// Position of the first entry whose name equals `query` or whose 1-based
/// position equals `query` read as a number. Both are tested per entry in one
/// left-to-right pass, so an earlier positional match beats a later name match.
pub fn resolve_index(entries: &[ProcessEntry], query: &str) -> Option<usize> {
	let position = numeric_value(query);
	entries
		.iter()
		.enumerate()
		.position(|(i, e)| e.name == query || position == Some((i + 1) as f64))
}

/// Reads `query` as a number: decimal or exponent notation, or an integer
/// with a `0x`, `0o` or `0b` prefix. Surrounding whitespace is ignored.
fn numeric_value(query: &str) -> Option<f64> {
	let query = query.trim();
	let radix = match query.get(..2) {
		Some("0x") | Some("0X") => 16,
		Some("0o") | Some("0O") => 8,
		Some("0b") | Some("0B") => 2,
		_ => return query.parse::<f64>().ok(),
	};
	u64::from_str_radix(&query[2..], radix).ok().map(|n| n as f64)
}

fn resolve_mut<'a>(entries: &'a mut [ProcessEntry], query: &str) -> Result<&'a mut ProcessEntry> {
	let index = resolve_index(entries, query).ok_or_else(|| not_found(query))?;
	Ok(&mut entries[index])
}

fn not_found(query: &str) -> Error {
	Error::NotFound(format!("no entry matches {:?}", query))
}

/// Names double as log file names, so they must be a single path component.
pub fn validate_name(name: &str) -> Result<()> {
	if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
		return Err(Error::Validation(format!("invalid entry name {:?}", name)));
	}
	Ok(())
}

async fn persist(path: &Path, entries: &[ProcessEntry]) -> Result<()> {
	let data = serde_json::to_string_pretty(entries)
		.map_err(|e| Error::Storage(format!("failed to encode entries: {}", e)))?;

	let tmp = path.with_extension("json.tmp");
	let written = async {
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(&tmp, data.as_bytes()).await?;
		tokio::fs::rename(&tmp, path).await
	}
	.await;

	written.map_err(|e| {
		tracing::error!("failed to write {}: {}", path.display(), e);
		Error::Storage(format!("failed to write {}: {}", path.display(), e))
	})
}
