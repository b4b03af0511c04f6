use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OK: u16 = 200;
pub const NO_CONTENT: u16 = 204;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	Get,
	Post,
}

impl std::fmt::Display for Method {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Method::Get => write!(f, "GET"),
			Method::Post => write!(f, "POST"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	pub method: Method,
	pub path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
}

impl Request {
	pub fn get(path: impl Into<String>) -> Self {
		Self {
			method: Method::Get,
			path: path.into(),
			body: None,
		}
	}

	pub fn post(path: impl Into<String>, body: Value) -> Self {
		Self {
			method: Method::Post,
			path: path.into(),
			body: Some(body),
		}
	}

	/// Decodes the body into `T`. A missing body decodes as JSON `null`.
	pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, String> {
		let body = self.body.clone().unwrap_or(Value::Null);
		serde_json::from_value(body).map_err(|e| format!("invalid body: {}", e))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub status: u16,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
}

impl Response {
	pub fn empty(status: u16) -> Self {
		Self { status, body: None }
	}

	pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
		match serde_json::to_value(body) {
			Ok(body) => Self {
				status,
				body: Some(body),
			},
			Err(e) => Self::error(INTERNAL_ERROR, format!("failed to encode response: {}", e)),
		}
	}

	pub fn error(status: u16, message: impl Into<String>) -> Self {
		Self {
			status,
			body: Some(serde_json::json!({ "error": message.into() })),
		}
	}

	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	pub fn error_message(&self) -> Option<&str> {
		self.body.as_ref()?.get("error")?.as_str()
	}
}
