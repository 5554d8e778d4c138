use std::io;

use clap::Parser;
use mstream_engine::config::CliArgs;
use mstream_engine::server::ClusterServer;
use mstream_engine::transport::NdjsonTransport;

fn main() {
	let args = CliArgs::parse();

	// stdout carries the protocol, so logs go to stderr
	tracing_subscriber::fmt()
		.with_writer(io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let config = args.clusterer_config();
	if let Err(e) = config.validate() {
		tracing::error!("Invalid default configuration: {}", e);
		std::process::exit(2);
	}

	let mut server = ClusterServer::new(NdjsonTransport::new(), config);

	tracing::info!("mstream-engine ready");

	if let Err(e) = server.run(io::stdin().lock()) {
		tracing::error!("Server error: {}", e);
		std::process::exit(1);
	}
}
