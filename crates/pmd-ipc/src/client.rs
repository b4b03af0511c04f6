use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use serde_json::Value;

use crate::paths::DaemonPaths;
use crate::protocol::{Method, Request, Response};

#[derive(Debug)]
pub enum ClientError {
	/// Nothing is listening on the socket.
	NotRunning(PathBuf),
	Io(io::Error),
	Encode(serde_json::Error),
	/// The daemon answered with something that is not a response line.
	Decode(serde_json::Error),
	/// The daemon closed the connection before answering.
	Closed,
	/// A well-formed response carrying a non-2xx status.
	Rejected { status: u16, message: String },
}

impl fmt::Display for ClientError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ClientError::NotRunning(path) => write!(f, "pmd is not running ({})", path.display()),
			ClientError::Io(e) => write!(f, "socket error: {}", e),
			ClientError::Encode(e) => write!(f, "failed to encode request: {}", e),
			ClientError::Decode(e) => write!(f, "malformed response: {}", e),
			ClientError::Closed => write!(f, "connection closed by pmd"),
			ClientError::Rejected { status, message } => write!(f, "{} ({})", message, status),
		}
	}
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
	fn from(e: io::Error) -> Self {
		ClientError::Io(e)
	}
}

/// Synchronous client for the daemon socket. One connection can carry any
/// number of requests; each `send` waits for its response line.
pub struct DaemonClient {
	writer: UnixStream,
	reader: BufReader<UnixStream>,
}

impl DaemonClient {
	pub fn connect(paths: &DaemonPaths) -> Result<Self, ClientError> {
		let socket = paths.socket_path();
		let writer = UnixStream::connect(&socket).map_err(|_| ClientError::NotRunning(socket))?;
		let reader = BufReader::new(writer.try_clone()?);
		Ok(Self { writer, reader })
	}

	pub fn send(&mut self, request: &Request) -> Result<Response, ClientError> {
		let mut frame = serde_json::to_vec(request).map_err(ClientError::Encode)?;
		frame.push(b'\n');
		self.writer.write_all(&frame)?;

		let mut line = String::new();
		if self.reader.read_line(&mut line)? == 0 {
			return Err(ClientError::Closed);
		}
		serde_json::from_str(&line).map_err(ClientError::Decode)
	}

	/// Like [`request`](Self::request), but a non-2xx status becomes
	/// [`ClientError::Rejected`] and only the body is returned.
	pub fn call(
		&mut self,
		method: Method,
		path: &str,
		body: Option<Value>,
	) -> Result<Option<Value>, ClientError> {
		let response = self.request(method, path, body)?;
		if response.is_success() {
			return Ok(response.body);
		}
		let message = response
			.error_message()
			.map(str::to_string)
			.unwrap_or_else(|| format!("{} {} failed", method, path));
		Err(ClientError::Rejected {
			status: response.status,
			message,
		})
	}

	pub fn request(
		&mut self,
		method: Method,
		path: &str,
		body: Option<Value>,
	) -> Result<Response, ClientError> {
		self.send(&Request {
			method,
			path: path.to_string(),
			body,
		})
	}

	pub fn get(&mut self, path: &str) -> Result<Response, ClientError> {
		self.send(&Request::get(path))
	}

	pub fn post(&mut self, path: &str, body: Value) -> Result<Response, ClientError> {
		self.send(&Request::post(path, body))
	}
}

/// True when something accepts connections on the socket.
pub fn is_running(paths: &DaemonPaths) -> bool {
	UnixStream::connect(paths.socket_path()).is_ok()
}

pub fn read_pid(paths: &DaemonPaths) -> Option<u32> {
	std::fs::read_to_string(paths.pid_path())
		.ok()
		.and_then(|s| s.trim().parse().ok())
}
