// ---------------------------------------------------------------------------
// ClusterServer: JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes incoming JSON-RPC 2.0 requests (one per line) to a StreamClusterer:
// a `run()` loop, a `dispatch()` match, `with_clusterer` /
// `with_clusterer_mut` helpers, and free-standing handlers per method.
// Requests are handled strictly one at a time.
// ---------------------------------------------------------------------------

use std::io::{self, BufRead, Write};

use crate::clusterer::StreamClusterer;
use crate::config::ClustererConfig;
use crate::error::ClusterError;
use crate::protocol::*;
use crate::transport::NdjsonTransport;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct ClusterServer<W: Write = io::Stdout> {
	transport: NdjsonTransport<W>,
	/// Fallback hyperparameters for `clusterer/initialize` and `model/import`.
	defaults: ClustererConfig,
	clusterer: Option<StreamClusterer>,
}

impl<W: Write> ClusterServer<W> {
	/// The clusterer is created lazily by `clusterer/initialize` or
	/// `model/import`.
	pub fn new(transport: NdjsonTransport<W>, defaults: ClustererConfig) -> Self {
		Self {
			transport,
			defaults,
			clusterer: None,
		}
	}

	/// Read requests line by line until EOF, answering each in turn.
	pub fn run<B: BufRead>(&mut self, reader: B) -> Result<(), ClusterError> {
		for line_result in reader.lines() {
			let line = line_result?;
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			self.dispatch(request);
		}

		Ok(())
	}

	pub fn into_transport(self) -> NdjsonTransport<W> {
		self.transport
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		tracing::debug!(id, method = %req.method, "request");
		let result = match req.method.as_str() {
			// -- Lifecycle -----------------------------------------------
			"clusterer/initialize" => self.handle_initialize(req.params),
			"model/import" => self.handle_import(req.params),
			"model/export" => self.with_clusterer(|c| {
				let snapshot = c.export();
				Ok(serde_json::json!({ "snapshot": snapshot }))
			}),

			// -- Ingestion -----------------------------------------------
			"clusterer/ingest" => self.with_clusterer_mut(|c| handle_ingest(c, req.params)),

			// -- Queries -------------------------------------------------
			"clusterer/topicCount" => {
				self.with_clusterer(|c| Ok(serde_json::json!({ "count": c.topic_count() })))
			}
			"clusterer/vocabularySize" => self.with_clusterer(|c| {
				Ok(serde_json::json!({ "size": c.vocabulary().size() }))
			}),
			"clusterer/topicTermDistribution" => self.with_clusterer(|c| {
				let distribution = c.topic_term_distribution();
				Ok(serde_json::json!({ "distribution": distribution }))
			}),
			"clusterer/topTerms" => self.with_clusterer(|c| handle_top_terms(c, req.params)),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				let code = match e {
					ClusterError::Serialization(_) => INVALID_PARAMS,
					ClusterError::Io(_) => INTERNAL_ERROR,
					_ => CLUSTER_ERROR,
				};
				self.transport
					.write_error(id, code, e.to_string(), Some(e.to_json_rpc_error()));
			}
		}
	}

	// ── Clusterer accessors ───────────────────────────────────────────────

	fn with_clusterer<F>(&self, f: F) -> Result<serde_json::Value, ClusterError>
	where
		F: FnOnce(&StreamClusterer) -> Result<serde_json::Value, ClusterError>,
	{
		match &self.clusterer {
			Some(c) => f(c),
			None => Err(ClusterError::NotInitialized),
		}
	}

	fn with_clusterer_mut<F>(&mut self, f: F) -> Result<serde_json::Value, ClusterError>
	where
		F: FnOnce(&mut StreamClusterer) -> Result<serde_json::Value, ClusterError>,
	{
		match &mut self.clusterer {
			Some(c) => f(c),
			None => Err(ClusterError::NotInitialized),
		}
	}

	// ── Lifecycle ─────────────────────────────────────────────────────────

	fn handle_initialize(
		&mut self,
		params: serde_json::Value,
	) -> Result<serde_json::Value, ClusterError> {
		let p: InitializeParams = if params.is_null() {
			InitializeParams::default()
		} else {
			parse_params(params)?
		};
		let config = resolve_config(&p, &self.defaults);
		let clusterer = StreamClusterer::new(config)?;
		tracing::info!(config = ?clusterer.config(), "clusterer initialized");
		self.clusterer = Some(clusterer);
		Ok(serde_json::json!({}))
	}

	fn handle_import(&mut self, params: serde_json::Value) -> Result<serde_json::Value, ClusterError> {
		let p: ImportParams = parse_params(params)?;
		let config = resolve_config(&p.config, &self.defaults);
		let clusterer = StreamClusterer::import(config, &p.snapshot)?;
		let count = clusterer.topic_count();
		self.clusterer = Some(clusterer);
		Ok(serde_json::json!({ "topicCount": count }))
	}
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, ClusterError> {
	serde_json::from_value(params)
		.map_err(|e| ClusterError::Serialization(format!("Invalid params: {}", e)))
}

fn resolve_config(p: &InitializeParams, defaults: &ClustererConfig) -> ClustererConfig {
	ClustererConfig {
		alpha: p.alpha.unwrap_or(defaults.alpha),
		beta: p.beta.unwrap_or(defaults.beta),
		iteration_count: p.iteration_count.unwrap_or(defaults.iteration_count),
		top_terms: p.top_terms.unwrap_or(defaults.top_terms),
		seed: p.seed.or(defaults.seed),
	}
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_ingest(
	clusterer: &mut StreamClusterer,
	params: serde_json::Value,
) -> Result<serde_json::Value, ClusterError> {
	let p: IngestParams = parse_params(params)?;
	let cluster_ids = clusterer.ingest(&p.documents)?;
	Ok(serde_json::json!({ "clusterIds": cluster_ids }))
}

fn handle_top_terms(
	clusterer: &StreamClusterer,
	params: serde_json::Value,
) -> Result<serde_json::Value, ClusterError> {
	let p: TopTermsParams = if params.is_null() {
		TopTermsParams::default()
	} else {
		parse_params(params)?
	};
	let topics = match p.k {
		Some(k) => clusterer.top_terms(k)?,
		None => clusterer.default_top_terms()?,
	};
	Ok(serde_json::json!({ "topics": topics }))
}
