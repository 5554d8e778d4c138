use serde::{Deserialize, Serialize};

/// Dense integer id of a vocabulary term.
pub type TermId = usize;

/// Recyclable integer id of a live cluster.
pub type ClusterId = usize;

/// One raw item of an ingested batch: an external id plus its terms in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDocument {
	pub id: String,
	pub terms: Vec<String>,
}

impl BatchDocument {
	pub fn new<I, S>(id: impl Into<String>, terms: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			id: id.into(),
			terms: terms.into_iter().map(Into::into).collect(),
		}
	}
}

/// A surface term with its (renormalised) probability inside one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermWeight {
	pub term: String,
	pub probability: f64,
}

/// The top terms of one topic, most probable first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicTerms {
	#[serde(rename = "clusterId")]
	pub cluster_id: ClusterId,
	pub terms: Vec<TermWeight>,
}
