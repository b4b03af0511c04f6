use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use pmd_ipc::protocol::{self, Method, Request, Response};
use pmd_supervisor::{logs, Error, ProcessEntry, Supervisor};
use serde::Deserialize;

/// Every operation the control socket understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
	Ping,
	List,
	Add,
	Remove,
	Start,
	Stop,
	EnvSet,
	EnvUnset,
	EnvList,
}

impl Route {
	pub fn from_request(method: Method, path: &str) -> Option<Self> {
		match (method, path) {
			(Method::Get, "/ping") => Some(Route::Ping),
			(Method::Get, "/list") => Some(Route::List),
			(Method::Post, "/add") => Some(Route::Add),
			(Method::Post, "/rm") => Some(Route::Remove),
			(Method::Post, "/start") => Some(Route::Start),
			(Method::Post, "/stop") => Some(Route::Stop),
			(Method::Post, "/env_set") => Some(Route::EnvSet),
			(Method::Post, "/env_unset") => Some(Route::EnvUnset),
			(Method::Post, "/env_list") => Some(Route::EnvList),
			_ => None,
		}
	}
}

#[derive(Debug, Deserialize)]
struct AddBody {
	name: String,
	bin: String,
	#[serde(default)]
	args: Vec<String>,
	cwd: PathBuf,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
	query: String,
}

#[derive(Debug, Deserialize)]
struct EnvSetBody {
	query: String,
	key: String,
	value: String,
}

#[derive(Debug, Deserialize)]
struct EnvUnsetBody {
	query: String,
	key: String,
}

pub type Handler =
	Box<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// Maps control requests onto the store and the supervisor.
///
/// Mutating routes commit through the store before touching any loop, so a
/// success response always describes persisted state.
pub struct ControlServer {
	supervisor: Arc<Supervisor>,
}

impl ControlServer {
	pub fn new(supervisor: Arc<Supervisor>) -> Arc<Self> {
		Arc::new(Self { supervisor })
	}

	/// Request handler for the socket server.
	pub fn handler(self: &Arc<Self>) -> Handler {
		let control = Arc::clone(self);
		Box::new(move |request| {
			let control = Arc::clone(&control);
			Box::pin(async move { control.handle(request).await })
		})
	}

	pub async fn handle(&self, request: Request) -> Response {
		let route = match Route::from_request(request.method, &request.path) {
			Some(route) => route,
			None => {
				return Response::error(
					protocol::NOT_FOUND,
					format!("no route for {} {}", request.method, request.path),
				);
			}
		};

		match self.dispatch(route, &request).await {
			Ok(response) => response,
			Err(e) => {
				let status = status_for(&e);
				if status == protocol::INTERNAL_ERROR {
					tracing::error!("{} {}: {}", request.method, request.path, e);
				} else {
					tracing::debug!("{} {}: {}", request.method, request.path, e);
				}
				Response::error(status, e.to_string())
			}
		}
	}

	async fn dispatch(&self, route: Route, request: &Request) -> Result<Response, Error> {
		let store = self.supervisor.store();

		match route {
			Route::Ping => Ok(Response::json(protocol::OK, &"pong")),
			Route::List => Ok(Response::json(protocol::OK, &self.supervisor.list().await)),
			Route::Add => {
				let body: AddBody = parse(request)?;
				let bin = resolve_executable(&body.bin)?;
				if !body.cwd.is_absolute() {
					return Err(Error::Validation(format!(
						"cwd must be absolute: {}",
						body.cwd.display()
					)));
				}
				store.add(ProcessEntry::new(&body.name, bin, body.args, body.cwd)).await?;
				tracing::info!("{}: added", body.name);
				Ok(Response::empty(protocol::NO_CONTENT))
			}
			Route::Remove => {
				let body: QueryBody = parse(request)?;
				let entry = store.remove(&body.query).await?;
				self.supervisor.retire(&entry.name).await;
				if let Err(e) = logs::remove_logs(self.supervisor.log_dir(), &entry.name) {
					tracing::warn!("{}: failed to remove logs: {}", entry.name, e);
				}
				tracing::info!("{}: removed", entry.name);
				Ok(Response::empty(protocol::NO_CONTENT))
			}
			Route::Start => {
				let body: QueryBody = parse(request)?;
				let entry = store.enable(&body.query).await?;
				self.supervisor.activate(&entry.name).await;
				Ok(Response::empty(protocol::NO_CONTENT))
			}
			Route::Stop => {
				let body: QueryBody = parse(request)?;
				let entry = store.disable(&body.query).await?;
				self.supervisor.deactivate(&entry.name).await;
				Ok(Response::empty(protocol::NO_CONTENT))
			}
			Route::EnvSet => {
				let body: EnvSetBody = parse(request)?;
				store.env_set(&body.query, &body.key, &body.value).await?;
				Ok(Response::empty(protocol::NO_CONTENT))
			}
			Route::EnvUnset => {
				let body: EnvUnsetBody = parse(request)?;
				store.env_unset(&body.query, &body.key).await?;
				Ok(Response::empty(protocol::NO_CONTENT))
			}
			Route::EnvList => {
				let body: QueryBody = parse(request)?;
				let entry = store.resolve(&body.query).await?;
				Ok(Response::json(protocol::OK, &entry.env))
			}
		}
	}
}

pub fn status_for(error: &Error) -> u16 {
	match error {
		Error::NotFound(_) => protocol::NOT_FOUND,
		Error::Conflict(_) => protocol::CONFLICT,
		Error::Validation(_) => protocol::BAD_REQUEST,
		Error::Storage(_) => protocol::INTERNAL_ERROR,
	}
}

fn parse<T: serde::de::DeserializeOwned>(request: &Request) -> Result<T, Error> {
	request.parse_body().map_err(Error::Validation)
}

/// Absolute path of `bin` in the daemon's search path.
fn resolve_executable(bin: &str) -> Result<PathBuf, Error> {
	which::which(bin).map_err(|_| Error::Validation(format!("{} not found in PATH", bin)))
}
