use std::path::PathBuf;

use pmd::paths::APP_NAME;
use pmd::ShutdownCoordinator;
use pmd_ipc::DaemonPaths;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
	let args: Vec<String> = std::env::args().skip(1).collect();

	match args.first().map(|s| s.as_str()) {
		Some("daemon") | Some("service") => {}
		Some("version") | Some("--version") | Some("-V") => {
			println!("pmd {}", env!("CARGO_PKG_VERSION"));
			return;
		}
		None | Some("help") | Some("--help") | Some("-h") => {
			print_usage();
			return;
		}
		Some(other) => {
			eprintln!("unknown command: {}", other);
			print_usage();
			std::process::exit(1);
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let paths = match flag_value(&args, "--base-dir") {
		Some(dir) => DaemonPaths::with_base_dir(APP_NAME, PathBuf::from(dir)),
		None => DaemonPaths::new(APP_NAME),
	};

	let coordinator = ShutdownCoordinator::new();
	if let Err(e) = coordinator.listen_for_signals() {
		tracing::error!("failed to install signal handlers: {}", e);
		std::process::exit(1);
	}

	if let Err(e) = pmd::run(paths, coordinator).await {
		tracing::error!("{}", e);
		std::process::exit(1);
	}
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
	args.iter()
		.position(|a| a == flag)
		.and_then(|i| args.get(i + 1))
		.map(|s| s.as_str())
}

fn print_usage() {
	eprintln!("pmd {}: process manager daemon", env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: pmd daemon [--base-dir <dir>]");
	eprintln!();
	eprintln!("  daemon, service     Run the supervisor in the foreground");
	eprintln!("  help                Show this message");
	eprintln!("  version             Show version");
	eprintln!();
	eprintln!("state lives in $XDG_CONFIG_HOME/pmd (default ~/.config/pmd):");
	eprintln!("  pmd.json            managed entries");
	eprintln!("  pmd.sock            control socket");
	eprintln!("  logs/<name>.log     stdout, logs/<name>.err stderr");
	eprintln!("  config.toml         optional settings");
}
