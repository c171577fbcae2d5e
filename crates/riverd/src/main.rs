mod channels;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use forkvisor::{JobRegistry, Supervisor};
use tracing_subscriber::EnvFilter;

use channels::ChannelRegistry;

fn main() -> ExitCode {
	let args: Vec<String> = std::env::args().skip(1).collect();

	match args.first().map(String::as_str) {
		None => {}
		Some("help" | "--help" | "-h") => {
			print_usage();
			return ExitCode::SUCCESS;
		}
		Some("version" | "--version" | "-V") => {
			println!("riverd {}", env!("CARGO_PKG_VERSION"));
			return ExitCode::SUCCESS;
		}
		Some(other) => {
			eprintln!("riverd: unknown argument '{}'", other);
			print_usage();
			return ExitCode::from(2);
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let path = config::config_path();
	let mut global_config = match config::load_config(&path) {
		Ok(c) => c,
		Err(e) => {
			tracing::error!("{}", e);
			return ExitCode::FAILURE;
		}
	};
	if let Err(e) = config::apply_env(&mut global_config) {
		tracing::error!("{}", e);
		return ExitCode::FAILURE;
	}

	let registry = ChannelRegistry::new(&global_config.channels);
	let supervisor_config = global_config.supervisor_config();
	tracing::info!(
		"riverd {} (pid {}), queue {}, channels: {}",
		env!("CARGO_PKG_VERSION"),
		std::process::id(),
		supervisor_config.endpoint,
		registry.job_names().into_iter().collect::<Vec<_>>().join(", ")
	);
	if !gearbox::client::is_reachable(&supervisor_config.endpoint) {
		tracing::warn!(
			"queue at {} is not reachable, workers will exit",
			supervisor_config.endpoint
		);
	}

	let supervisor = Supervisor::new(supervisor_config, Arc::new(registry));
	// run() logs its own failures
	match supervisor.run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(_) => ExitCode::FAILURE,
	}
}

fn print_usage() {
	println!("riverd {}", env!("CARGO_PKG_VERSION"));
	println!();
	println!("Starts one queue worker process per enabled channel and waits for them to exit.");
	println!();
	println!("usage: riverd [--help | --version]");
	println!();
	println!("config:  {}", config::config_path().display());
	println!("env:     RIVERD_CONFIG  config file path");
	println!("         RIVERD_QUEUE   queue endpoint (host:port), overrides the config");
	println!("         RUST_LOG       log filter (default: info)");
}
