use clap::Parser;

use crate::cluster_vector::check_hyperparameter;
use crate::error::ClusterError;

pub const DEFAULT_ALPHA: f64 = 0.03;
pub const DEFAULT_BETA: f64 = 0.03;
pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_TOP_TERMS: usize = 50;

/// Hyperparameters of a [`StreamClusterer`](crate::clusterer::StreamClusterer).
#[derive(Debug, Clone, PartialEq)]
pub struct ClustererConfig {
	/// Concentration of the new-cluster option.
	pub alpha: f64,
	/// Term smoothing pseudocount.
	pub beta: f64,
	/// Sampling passes per batch, the first pass included.
	pub iteration_count: usize,
	/// Words reported per topic by `default_top_terms`.
	pub top_terms: usize,
	/// Seed for the sampling RNG; `None` draws one from the OS.
	pub seed: Option<u64>,
}

impl Default for ClustererConfig {
	fn default() -> Self {
		Self {
			alpha: DEFAULT_ALPHA,
			beta: DEFAULT_BETA,
			iteration_count: DEFAULT_ITERATIONS,
			top_terms: DEFAULT_TOP_TERMS,
			seed: None,
		}
	}
}

impl ClustererConfig {
	pub fn validate(&self) -> Result<(), ClusterError> {
		check_hyperparameter("alpha", self.alpha)?;
		check_hyperparameter("beta", self.beta)?;
		if self.iteration_count == 0 {
			return Err(ClusterError::InvalidHyperparameter {
				name: "iteration_count",
				value: 0.0,
			});
		}
		Ok(())
	}
}

#[derive(Parser, Debug)]
#[command(name = "mstream-engine", about = "Streaming short-text clustering over JSON-RPC 2.0 / NDJSON stdio")]
pub struct CliArgs {
	/// Default new-cluster concentration
	#[arg(long, default_value_t = DEFAULT_ALPHA, env = "MSTREAM_ALPHA")]
	pub alpha: f64,

	/// Default term smoothing pseudocount
	#[arg(long, default_value_t = DEFAULT_BETA, env = "MSTREAM_BETA")]
	pub beta: f64,

	/// Default sampling passes per batch
	#[arg(long, default_value_t = DEFAULT_ITERATIONS, env = "MSTREAM_ITERATIONS")]
	pub iterations: usize,

	/// Default number of words reported per topic
	#[arg(long, default_value_t = DEFAULT_TOP_TERMS, env = "MSTREAM_TOP_TERMS")]
	pub top_terms: usize,

	/// Default RNG seed (random when unset)
	#[arg(long, env = "MSTREAM_SEED")]
	pub seed: Option<u64>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "info", env = "MSTREAM_LOG_LEVEL")]
	pub log_level: String,
}

impl CliArgs {
	pub fn clusterer_config(&self) -> ClustererConfig {
		ClustererConfig {
			alpha: self.alpha,
			beta: self.beta,
			iteration_count: self.iterations,
			top_terms: self.top_terms,
			seed: self.seed,
		}
	}
}
