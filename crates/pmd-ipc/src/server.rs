use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::paths::DaemonPaths;
use crate::protocol::{self, Request, Response};

/// Binds the daemon socket and answers requests until `shutdown` is cancelled.
///
/// After cancellation no new connections are accepted; connections finish the
/// request they are handling and the call returns once all of them are gone.
pub async fn run_socket_server<F, Fut>(
	paths: &DaemonPaths,
	handler: F,
	shutdown: CancellationToken,
) -> io::Result<()>
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Response> + Send + 'static,
{
	let socket_path = paths.socket_path();

	let listener = UnixListener::bind(&socket_path).map_err(|e| {
		tracing::error!("failed to bind socket {}: {}", socket_path.display(), e);
		e
	})?;

	tracing::info!("listening on {}", socket_path.display());

	let handler = Arc::new(handler);
	let connections = TaskTracker::new();

	loop {
		let accepted = tokio::select! {
			_ = shutdown.cancelled() => break,
			accepted = listener.accept() => accepted,
		};

		let (stream, _) = match accepted {
			Ok(s) => s,
			Err(e) => {
				tracing::error!("accept error: {}", e);
				continue;
			}
		};

		let handler = Arc::clone(&handler);
		let shutdown = shutdown.clone();
		connections.spawn(async move {
			handle_connection(stream, handler, shutdown).await;
		});
	}

	drop(listener);
	connections.close();
	tracing::debug!("waiting for {} connection(s) to drain", connections.len());
	connections.wait().await;
	tracing::info!("socket server stopped");

	Ok(())
}

async fn handle_connection<F, Fut>(stream: UnixStream, handler: Arc<F>, shutdown: CancellationToken)
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Response> + Send + 'static,
{
	let (reader, mut writer) = stream.into_split();
	let mut lines = BufReader::new(reader).lines();

	loop {
		let line = tokio::select! {
			_ = shutdown.cancelled() => break,
			line = lines.next_line() => line,
		};

		let line = match line {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				tracing::debug!("connection read error: {}", e);
				break;
			}
		};

		if line.trim().is_empty() {
			continue;
		}

		let response = match serde_json::from_str::<Request>(&line) {
			Ok(request) => {
				tracing::debug!("{} {}", request.method, request.path);
				handler(request).await
			}
			Err(e) => {
				tracing::warn!("invalid request: {}", e);
				Response::error(protocol::BAD_REQUEST, format!("invalid request: {}", e))
			}
		};

		if write_response(&mut writer, &response).await.is_err() {
			break;
		}
	}
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> io::Result<()> {
	let mut data = serde_json::to_vec(response)?;
	data.push(b'\n');
	writer.write_all(&data).await
}
