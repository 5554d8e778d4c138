// ---------------------------------------------------------------------------
// Model snapshot: the export/import tuple
// ---------------------------------------------------------------------------
//
// Captures everything needed to rebuild a clusterer's weight distributions:
// the vocabulary in id order and, per live cluster, its id, document count
// and sparse term frequencies. Hyperparameters travel separately in the
// importer's config. Encoding the snapshot to bytes is left to the caller;
// it derives serde for whichever format they pick.
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::cluster_feature::ClusterFeature;
use crate::types::{ClusterId, TermId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
	pub id: ClusterId,
	#[serde(rename = "docCount")]
	pub doc_count: usize,
	/// (term id, aggregate frequency), ascending by term id
	pub terms: Vec<(TermId, usize)>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSnapshot {
	/// Terms in id order.
	pub vocabulary: Vec<String>,
	/// Live clusters ascending by id.
	pub clusters: Vec<ClusterSnapshot>,
}

impl From<&ClusterFeature> for ClusterSnapshot {
	fn from(cluster: &ClusterFeature) -> Self {
		Self {
			id: cluster.id(),
			doc_count: cluster.num_docs(),
			terms: cluster.iter().collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::document::Document;
	use crate::vocabulary::Vocabulary;

	#[test]
	fn cluster_snapshot_lists_terms_by_id() {
		let mut vocab = Vocabulary::new();
		let mut doc = Document::new("d1", &["b", "a", "b"], &mut vocab);
		let mut cluster = ClusterFeature::new(2);
		cluster.add(&mut doc, 0);

		let snapshot = ClusterSnapshot::from(&cluster);
		assert_eq!(snapshot.id, 2);
		assert_eq!(snapshot.doc_count, 1);
		// "b" was registered first, so it has id 0
		assert_eq!(snapshot.terms, vec![(0, 2), (1, 1)]);
	}

	#[test]
	fn snapshot_json_shape() {
		let snapshot = ModelSnapshot {
			vocabulary: vec!["x".into()],
			clusters: vec![ClusterSnapshot {
				id: 0,
				doc_count: 3,
				terms: vec![(0, 3)],
			}],
		};
		let value = serde_json::to_value(&snapshot).unwrap();
		assert_eq!(value["vocabulary"][0], "x");
		assert_eq!(value["clusters"][0]["docCount"], 3);
		assert_eq!(value["clusters"][0]["terms"][0][1], 3);

		let back: ModelSnapshot = serde_json::from_value(value).unwrap();
		assert_eq!(back, snapshot);
	}
}
