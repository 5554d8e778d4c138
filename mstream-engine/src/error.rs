use thiserror::Error;

use crate::types::ClusterId;

#[derive(Debug, Error)]
pub enum ClusterError {
	#[error("Invalid hyperparameter: {name} = {value}")]
	InvalidHyperparameter { name: &'static str, value: f64 },
	#[error("Unknown term: {0}")]
	UnknownTerm(String),
	#[error("Invalid {kind} id: {id}")]
	InvalidId { kind: &'static str, id: usize },
	#[error("Document {0} is not a member of any cluster")]
	DoubleRemoval(String),
	#[error("Cluster id {0} is already free")]
	DoubleRelease(ClusterId),
	#[error("Document {document} is already assigned to cluster {cluster}")]
	AlreadyAssigned { document: String, cluster: ClusterId },
	#[error("Invalid snapshot: {0}")]
	InvalidSnapshot(String),
	#[error("Clusterer not initialized: call clusterer/initialize first")]
	NotInitialized,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl ClusterError {
	pub fn code(&self) -> &str {
		match self {
			Self::InvalidHyperparameter { .. } => "CLUSTER_INVALID_HYPERPARAMETER",
			Self::UnknownTerm(_) => "CLUSTER_UNKNOWN_TERM",
			Self::InvalidId { .. } => "CLUSTER_INVALID_ID",
			Self::DoubleRemoval(_) => "CLUSTER_DOUBLE_REMOVAL",
			Self::DoubleRelease(_) => "CLUSTER_DOUBLE_RELEASE",
			Self::AlreadyAssigned { .. } => "CLUSTER_ALREADY_ASSIGNED",
			Self::InvalidSnapshot(_) => "CLUSTER_INVALID_SNAPSHOT",
			Self::NotInitialized => "CLUSTER_NOT_INITIALIZED",
			Self::Serialization(_) => "CLUSTER_SERIALIZATION",
			Self::Io(_) => "CLUSTER_IO",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"clusterCode": self.code(),
			"message": self.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		assert_eq!(
			ClusterError::UnknownTerm("x".into()).code(),
			"CLUSTER_UNKNOWN_TERM"
		);
		assert_eq!(
			ClusterError::DoubleRemoval("doc-1".into()).code(),
			"CLUSTER_DOUBLE_REMOVAL"
		);
	}

	#[test]
	fn json_rpc_error_carries_code_and_message() {
		let err = ClusterError::InvalidId { kind: "cluster", id: 7 };
		let value = err.to_json_rpc_error();
		assert_eq!(value["clusterCode"], "CLUSTER_INVALID_ID");
		assert_eq!(value["message"], "Invalid cluster id: 7");
	}
}
