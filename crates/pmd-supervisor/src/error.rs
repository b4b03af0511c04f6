use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// No entry matched a query.
	NotFound(String),
	/// Duplicate name, or an entry already in the requested state.
	Conflict(String),
	/// Input rejected before anything was persisted.
	Validation(String),
	/// Reading or writing the store file failed.
	Storage(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NotFound(msg) => write!(f, "not found: {}", msg),
			Error::Conflict(msg) => write!(f, "conflict: {}", msg),
			Error::Validation(msg) => write!(f, "invalid: {}", msg),
			Error::Storage(msg) => write!(f, "storage error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
