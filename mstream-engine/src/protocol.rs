use serde::Deserialize;

use crate::snapshot::ModelSnapshot;
use crate::types::BatchDocument;

// JSON-RPC 2.0 error codes
pub const INTERNAL_ERROR: i32 = -32603;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const CLUSTER_ERROR: i32 = -32000;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: serde_json::Value,
}

/// Hyperparameter overrides; unset fields fall back to the server defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
	pub alpha: Option<f64>,
	pub beta: Option<f64>,
	pub iteration_count: Option<usize>,
	pub top_terms: Option<usize>,
	pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestParams {
	pub documents: Vec<BatchDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopTermsParams {
	pub k: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportParams {
	pub snapshot: ModelSnapshot,
	#[serde(flatten)]
	pub config: InitializeParams,
}
