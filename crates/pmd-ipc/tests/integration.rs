use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use pmd_ipc::client::{self, ClientError, DaemonClient};
use pmd_ipc::protocol::{self, Method, Request, Response};
use pmd_ipc::{Daemon, DaemonPaths};
use serde_json::json;
use tokio_util::sync::CancellationToken;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_paths(name: &str) -> DaemonPaths {
	let n = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
	// Stay directly under /tmp so socket paths fit in SUN_LEN
	let dir = std::path::PathBuf::from("/tmp").join(format!("pmdi{}-{}-{}", std::process::id(), n, name));
	let _ = std::fs::create_dir_all(&dir);
	DaemonPaths::with_base_dir("pmd", dir)
}

fn cleanup_paths(paths: &DaemonPaths) {
	let _ = std::fs::remove_dir_all(paths.base_dir());
}

async fn echo_handler(req: Request) -> Response {
	match (req.method, req.path.as_str()) {
		(Method::Get, "/ping") => Response::json(protocol::OK, &"pong"),
		(Method::Post, "/echo") => Response::json(protocol::OK, &req.body),
		(Method::Post, "/taken") => Response::error(protocol::CONFLICT, "already exists"),
		(Method::Post, "/slow") => {
			tokio::time::sleep(Duration::from_millis(300)).await;
			Response::empty(protocol::NO_CONTENT)
		}
		_ => Response::empty(protocol::NOT_FOUND),
	}
}

fn spawn_server(paths: &DaemonPaths, shutdown: CancellationToken) -> tokio::task::JoinHandle<std::io::Result<()>> {
	let server_paths = paths.clone();
	tokio::spawn(async move {
		pmd_ipc::server::run_socket_server(&server_paths, echo_handler, shutdown).await
	})
}

// --- Paths ---

#[test]
fn paths_explicit_base_dir() {
	let paths = DaemonPaths::with_base_dir("pmd", "/srv/pmd");
	assert_eq!(paths.base_dir(), std::path::PathBuf::from("/srv/pmd"));
	assert_eq!(paths.socket_path(), std::path::PathBuf::from("/srv/pmd/pmd.sock"));
	assert_eq!(paths.pid_path(), std::path::PathBuf::from("/srv/pmd/pmd.pid"));
}

#[test]
fn paths_socket_and_pid_under_base() {
	let paths = DaemonPaths::new("myapp");
	let base = paths.base_dir();
	assert!(base.ends_with("myapp"));
	assert!(paths.socket_path().starts_with(&base));
	assert!(paths.pid_path().starts_with(&base));
}

// --- Protocol ---

#[test]
fn request_wire_format() {
	let req = Request::post("/start", json!({ "query": "web" }));
	let line = serde_json::to_string(&req).unwrap();
	assert_eq!(line, r#"{"method":"POST","path":"/start","body":{"query":"web"}}"#);

	let get: Request = serde_json::from_str(r#"{"method":"GET","path":"/list"}"#).unwrap();
	assert_eq!(get, Request::get("/list"));
}

#[test]
fn response_helpers() {
	assert!(Response::empty(protocol::NO_CONTENT).is_success());
	assert!(!Response::empty(protocol::CONFLICT).is_success());

	let err = Response::error(protocol::NOT_FOUND, "no such entry");
	assert_eq!(err.error_message(), Some("no such entry"));
	assert_eq!(serde_json::to_string(&Response::empty(204)).unwrap(), r#"{"status":204}"#);
}

#[test]
fn request_parse_body() {
	#[derive(serde::Deserialize)]
	struct Query {
		query: String,
	}

	let req = Request::post("/stop", json!({ "query": "2" }));
	let body: Query = req.parse_body().unwrap();
	assert_eq!(body.query, "2");

	let missing = Request::get("/stop");
	assert!(missing.parse_body::<Query>().is_err());
}

// --- Client helpers ---

#[test]
fn is_running_false_when_no_socket() {
	let paths = temp_paths("no-socket");
	assert!(!client::is_running(&paths));
	cleanup_paths(&paths);
}

#[test]
fn read_pid_parses_file() {
	let paths = temp_paths("pid-file");
	assert_eq!(client::read_pid(&paths), None);
	std::fs::write(paths.pid_path(), "12345\n").unwrap();
	assert_eq!(client::read_pid(&paths), Some(12345));
	std::fs::write(paths.pid_path(), "not-a-number").unwrap();
	assert_eq!(client::read_pid(&paths), None);
	cleanup_paths(&paths);
}

#[test]
fn client_connect_returns_not_running() {
	let paths = temp_paths("no-server");
	match DaemonClient::connect(&paths) {
		Err(ClientError::NotRunning(socket)) => assert_eq!(socket, paths.socket_path()),
		Err(other) => panic!("expected NotRunning, got {:?}", other),
		Ok(_) => panic!("expected error, got Ok"),
	}
	cleanup_paths(&paths);
}

#[test]
fn client_error_display() {
	let not_running = ClientError::NotRunning("/tmp/pmd/pmd.sock".into());
	assert_eq!(not_running.to_string(), "pmd is not running (/tmp/pmd/pmd.sock)");
	assert_eq!(ClientError::Closed.to_string(), "connection closed by pmd");
	let rejected = ClientError::Rejected {
		status: protocol::CONFLICT,
		message: "web already exists".into(),
	};
	assert_eq!(rejected.to_string(), "web already exists (409)");
}

// --- Client + Server ---

#[tokio::test]
async fn server_client_roundtrip() {
	let paths = temp_paths("roundtrip");
	let shutdown = CancellationToken::new();
	let server = spawn_server(&paths, shutdown.clone());

	tokio::time::sleep(Duration::from_millis(100)).await;

	let client_paths = paths.clone();
	tokio::task::spawn_blocking(move || {
		let mut client = DaemonClient::connect(&client_paths).unwrap();

		let pong = client.get("/ping").unwrap();
		assert_eq!(pong.status, protocol::OK);
		assert_eq!(pong.body, Some(json!("pong")));

		let echo = client.post("/echo", json!({ "a": 1 })).unwrap();
		assert_eq!(echo.body, Some(json!({ "a": 1 })));

		let missing = client.request(Method::Post, "/nope", None).unwrap();
		assert_eq!(missing.status, protocol::NOT_FOUND);

		let body = client.call(Method::Post, "/echo", Some(json!([1, 2]))).unwrap();
		assert_eq!(body, Some(json!([1, 2])));
		match client.call(Method::Post, "/taken", None) {
			Err(ClientError::Rejected { status, message }) => {
				assert_eq!(status, protocol::CONFLICT);
				assert_eq!(message, "already exists");
			}
			other => panic!("expected Rejected, got {:?}", other),
		}
		match client.call(Method::Post, "/nope", None) {
			Err(ClientError::Rejected { status, message }) => {
				assert_eq!(status, protocol::NOT_FOUND);
				assert_eq!(message, "POST /nope failed");
			}
			other => panic!("expected Rejected, got {:?}", other),
		}
	})
	.await
	.unwrap();

	shutdown.cancel();
	server.await.unwrap().unwrap();
	cleanup_paths(&paths);
}

#[tokio::test]
async fn server_handles_multiple_clients() {
	let paths = temp_paths("multi-client");
	let shutdown = CancellationToken::new();
	let server = spawn_server(&paths, shutdown.clone());

	tokio::time::sleep(Duration::from_millis(100)).await;

	let mut handles = vec![];
	for i in 0..5 {
		let cp = paths.clone();
		handles.push(tokio::task::spawn_blocking(move || {
			let mut client = DaemonClient::connect(&cp).unwrap();
			let resp = client.post("/echo", json!(i)).unwrap();
			assert_eq!(resp.body, Some(json!(i)));
		}));
	}

	for h in handles {
		h.await.unwrap();
	}

	shutdown.cancel();
	server.await.unwrap().unwrap();
	cleanup_paths(&paths);
}

#[tokio::test]
async fn server_answers_malformed_line_with_bad_request() {
	let paths = temp_paths("malformed");
	let shutdown = CancellationToken::new();
	let server = spawn_server(&paths, shutdown.clone());

	tokio::time::sleep(Duration::from_millis(100)).await;

	let client_paths = paths.clone();
	tokio::task::spawn_blocking(move || {
		let stream = UnixStream::connect(client_paths.socket_path()).unwrap();
		stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
		let mut writer = stream.try_clone().unwrap();
		let mut reader = BufReader::new(stream);

		writer.write_all(b"this is not json\n").unwrap();
		let mut line = String::new();
		reader.read_line(&mut line).unwrap();
		let resp: Response = serde_json::from_str(&line).unwrap();
		assert_eq!(resp.status, protocol::BAD_REQUEST);
		assert!(resp.error_message().unwrap().contains("invalid request"));

		// The connection survives the bad line
		let req = serde_json::to_string(&Request::get("/ping")).unwrap();
		writer.write_all(format!("{}\n", req).as_bytes()).unwrap();
		line.clear();
		reader.read_line(&mut line).unwrap();
		let resp: Response = serde_json::from_str(&line).unwrap();
		assert_eq!(resp.status, protocol::OK);
	})
	.await
	.unwrap();

	shutdown.cancel();
	server.await.unwrap().unwrap();
	cleanup_paths(&paths);
}

#[tokio::test]
async fn shutdown_lets_in_flight_request_finish() {
	let paths = temp_paths("drain");
	let shutdown = CancellationToken::new();
	let server = spawn_server(&paths, shutdown.clone());

	tokio::time::sleep(Duration::from_millis(100)).await;

	let client_paths = paths.clone();
	let in_flight = tokio::task::spawn_blocking(move || {
		let mut client = DaemonClient::connect(&client_paths).unwrap();
		client.post("/slow", json!({})).unwrap()
	});

	tokio::time::sleep(Duration::from_millis(100)).await;
	shutdown.cancel();

	let resp = in_flight.await.unwrap();
	assert_eq!(resp.status, protocol::NO_CONTENT);

	tokio::time::timeout(Duration::from_secs(2), server)
		.await
		.expect("server did not drain")
		.unwrap()
		.unwrap();

	assert!(!client::is_running(&paths));
	cleanup_paths(&paths);
}

// --- Daemon lifecycle ---

#[tokio::test]
async fn daemon_run_removes_socket_and_pid_on_shutdown() {
	let paths = temp_paths("lifecycle");
	let shutdown = CancellationToken::new();

	let daemon_paths = paths.clone();
	let daemon_shutdown = shutdown.clone();
	let daemon = tokio::spawn(async move {
		Daemon::new(daemon_paths).run(echo_handler, daemon_shutdown).await
	});

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(paths.socket_path().exists());
	assert_eq!(client::read_pid(&paths), Some(std::process::id()));

	shutdown.cancel();
	daemon.await.unwrap().unwrap();

	assert!(!paths.socket_path().exists());
	assert!(!paths.pid_path().exists());
	cleanup_paths(&paths);
}

#[tokio::test]
async fn daemon_prepare_clears_stale_socket() {
	let paths = temp_paths("stale");
	std::fs::write(paths.socket_path(), "stale").unwrap();

	let daemon = Daemon::new(paths.clone());
	daemon.prepare().unwrap();
	assert!(!paths.socket_path().exists());
	assert!(paths.pid_path().exists());

	daemon.cleanup();
	assert!(!paths.pid_path().exists());
	cleanup_paths(&paths);
}
