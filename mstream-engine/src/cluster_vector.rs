// ---------------------------------------------------------------------------
// ClusterFeatureVector: live cluster set + CRP-weighted assignment
// ---------------------------------------------------------------------------
//
// Owns every live ClusterFeature in a dense arena indexed by cluster id.
// Retired slots are left empty and their ids go back to the pool, so an id
// can be reissued as soon as its cluster empties.
//
// Assignment uses the collapsed Dirichlet-multinomial mixture weights:
//
//   existing z:  m_z  * prod_w prod_{j<f_w} (n_zw + beta + j)
//                     / prod_{i<L} (n_z + V*beta + i)
//   new:       alpha*D * prod_w prod_{j<f_w} (beta + j)
//                     / prod_{i<L} (V*beta + i)
//
// with D the document total before the add. The shared denominator
// (D - 1 + alpha*D) cancels and is omitted. Products are accumulated as sums
// of logs and normalised with log-sum-exp.
// ---------------------------------------------------------------------------

use rand::Rng;

use crate::cluster_feature::ClusterFeature;
use crate::document::Document;
use crate::error::ClusterError;
use crate::id_pool::ClusterIdPool;
use crate::sampling::{argmax, normalize_log_weights, sample_categorical};
use crate::types::ClusterId;
use crate::vocabulary::Vocabulary;

/// One outcome of the assignment distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterChoice {
	Existing(ClusterId),
	New,
}

#[derive(Debug, Clone)]
pub struct ClusterFeatureVector {
	/// cluster id -> live cluster, `None` for retired or never-used slots
	slots: Vec<Option<ClusterFeature>>,
	pool: ClusterIdPool,
	live: usize,
	/// D: documents across all live clusters
	total_docs: usize,
	/// next membership ticket; never reused
	next_ticket: u64,
	alpha: f64,
	beta: f64,
}

/// Reject non-positive or non-finite hyperparameters.
pub(crate) fn check_hyperparameter(name: &'static str, value: f64) -> Result<(), ClusterError> {
	if value.is_finite() && value > 0.0 {
		Ok(())
	} else {
		Err(ClusterError::InvalidHyperparameter { name, value })
	}
}

impl ClusterFeatureVector {
	pub fn new(alpha: f64, beta: f64) -> Result<Self, ClusterError> {
		check_hyperparameter("alpha", alpha)?;
		check_hyperparameter("beta", beta)?;
		Ok(Self {
			slots: Vec::new(),
			pool: ClusterIdPool::new(),
			live: 0,
			total_docs: 0,
			next_ticket: 0,
			alpha,
			beta,
		})
	}

	/// Rebuild from rehydrated clusters. Ids must be unique and every cluster
	/// must hold at least one document.
	pub(crate) fn from_clusters(
		alpha: f64,
		beta: f64,
		clusters: Vec<ClusterFeature>,
	) -> Result<Self, ClusterError> {
		let mut vector = Self::new(alpha, beta)?;
		let mut live_ids = Vec::with_capacity(clusters.len());

		for cluster in clusters {
			let id = cluster.id();
			if cluster.is_empty() {
				return Err(ClusterError::InvalidSnapshot(format!(
					"cluster {} has no documents",
					id
				)));
			}
			if vector.slots.len() <= id {
				vector.slots.resize_with(id + 1, || None);
			}
			if vector.slots[id].is_some() {
				return Err(ClusterError::InvalidSnapshot(format!(
					"duplicate cluster id {}",
					id
				)));
			}
			vector.total_docs += cluster.num_docs();
			vector.live += 1;
			vector.slots[id] = Some(cluster);
			live_ids.push(id);
		}

		vector.pool = ClusterIdPool::with_live_ids(&live_ids);
		Ok(vector)
	}

	// -- Assignment --------------------------------------------------------

	/// Sample a cluster for `doc` from the assignment distribution, add the
	/// document to it, and return its id.
	///
	/// With no documents in the model the new-cluster option is taken
	/// outright and `rng` is left untouched.
	pub fn sample_and_add<R: Rng + ?Sized>(
		&mut self,
		doc: &mut Document,
		vocabulary: &Vocabulary,
		rng: &mut R,
	) -> Result<ClusterId, ClusterError> {
		self.ensure_unassigned(doc)?;
		let choice = if self.total_docs == 0 {
			ClusterChoice::New
		} else {
			let (choices, probs) = self.choices_and_probs(doc, vocabulary);
			choices[sample_categorical(&probs, rng)]
		};
		tracing::trace!(document = doc.id(), ?choice, "sampled cluster");
		self.commit(doc, choice)
	}

	/// Add `doc` to its most probable cluster and return its id. Ties go to
	/// the lowest cluster id; a new cluster is only opened when it is
	/// strictly more probable than every existing one.
	pub fn pick_max_and_add(
		&mut self,
		doc: &mut Document,
		vocabulary: &Vocabulary,
	) -> Result<ClusterId, ClusterError> {
		self.ensure_unassigned(doc)?;
		let choice = if self.total_docs == 0 {
			ClusterChoice::New
		} else {
			let (choices, probs) = self.choices_and_probs(doc, vocabulary);
			choices[argmax(&probs)]
		};
		tracing::trace!(document = doc.id(), ?choice, "picked cluster");
		self.commit(doc, choice)
	}

	/// Take `doc` out of its cluster, retiring the cluster if it empties.
	pub fn remove(&mut self, doc: &mut Document) -> Result<(), ClusterError> {
		let id = doc
			.cluster()
			.ok_or_else(|| ClusterError::DoubleRemoval(doc.id().to_string()))?;
		let cluster = self
			.slots
			.get_mut(id)
			.and_then(Option::as_mut)
			.ok_or(ClusterError::InvalidId { kind: "cluster", id })?;

		cluster.remove(doc)?;
		let emptied = cluster.is_empty();
		self.total_docs -= 1;

		if emptied {
			self.slots[id] = None;
			self.live -= 1;
			self.pool.release(id)?;
			tracing::debug!(cluster = id, "retired empty cluster");
		}
		Ok(())
	}

	/// The normalised assignment distribution for `doc`: existing clusters
	/// ascending by id, then the new-cluster option.
	pub fn distribution(
		&self,
		doc: &Document,
		vocabulary: &Vocabulary,
	) -> Vec<(ClusterChoice, f64)> {
		if self.total_docs == 0 {
			return vec![(ClusterChoice::New, 1.0)];
		}
		let (choices, probs) = self.choices_and_probs(doc, vocabulary);
		choices.into_iter().zip(probs).collect()
	}

	// -- Queries -----------------------------------------------------------

	/// Number of live clusters.
	pub fn size(&self) -> usize {
		self.live
	}

	pub fn is_empty(&self) -> bool {
		self.live == 0
	}

	/// D: documents across all live clusters.
	pub fn total_docs(&self) -> usize {
		self.total_docs
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn beta(&self) -> f64 {
		self.beta
	}

	pub fn get(&self, id: ClusterId) -> Option<&ClusterFeature> {
		self.slots.get(id).and_then(Option::as_ref)
	}

	/// Live clusters ascending by id.
	pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &ClusterFeature)> + '_ {
		self.slots
			.iter()
			.filter_map(Option::as_ref)
			.map(|cluster| (cluster.id(), cluster))
	}

	pub fn id_pool(&self) -> &ClusterIdPool {
		&self.pool
	}

	// -- Internals ---------------------------------------------------------

	fn ensure_unassigned(&self, doc: &Document) -> Result<(), ClusterError> {
		match doc.cluster() {
			Some(cluster) => Err(ClusterError::AlreadyAssigned {
				document: doc.id().to_string(),
				cluster,
			}),
			None => Ok(()),
		}
	}

	fn choices_and_probs(
		&self,
		doc: &Document,
		vocabulary: &Vocabulary,
	) -> (Vec<ClusterChoice>, Vec<f64>) {
		let v_beta = vocabulary.size() as f64 * self.beta;
		let mut choices = Vec::with_capacity(self.live + 1);
		let mut log_weights = Vec::with_capacity(self.live + 1);

		for (id, cluster) in self.iter() {
			choices.push(ClusterChoice::Existing(id));
			log_weights.push(self.existing_log_weight(doc, cluster, v_beta));
		}
		choices.push(ClusterChoice::New);
		log_weights.push(self.new_log_weight(doc, v_beta));

		(choices, normalize_log_weights(&log_weights))
	}

	fn existing_log_weight(&self, doc: &Document, cluster: &ClusterFeature, v_beta: f64) -> f64 {
		let mut log_weight = (cluster.num_docs() as f64).ln();
		for (term_id, freq) in doc.iter() {
			let n_zw = cluster.term_frequency(term_id) as f64;
			for j in 0..freq {
				log_weight += (n_zw + self.beta + j as f64).ln();
			}
		}
		let n_z = cluster.num_terms() as f64;
		for i in 0..doc.total_length() {
			log_weight -= (n_z + v_beta + i as f64).ln();
		}
		log_weight
	}

	fn new_log_weight(&self, doc: &Document, v_beta: f64) -> f64 {
		let mut log_weight = (self.alpha * self.total_docs as f64).ln();
		for (_, freq) in doc.iter() {
			for j in 0..freq {
				log_weight += (self.beta + j as f64).ln();
			}
		}
		for i in 0..doc.total_length() {
			log_weight -= (v_beta + i as f64).ln();
		}
		log_weight
	}

	fn open_cluster(&mut self) -> ClusterId {
		let id = self.pool.acquire();
		if self.slots.len() <= id {
			self.slots.resize_with(id + 1, || None);
		}
		self.slots[id] = Some(ClusterFeature::new(id));
		self.live += 1;
		tracing::debug!(cluster = id, live = self.live, "opened cluster");
		id
	}

	fn commit(&mut self, doc: &mut Document, choice: ClusterChoice) -> Result<ClusterId, ClusterError> {
		let id = match choice {
			ClusterChoice::Existing(id) => id,
			ClusterChoice::New => self.open_cluster(),
		};
		let cluster = self
			.slots
			.get_mut(id)
			.and_then(Option::as_mut)
			.ok_or(ClusterError::InvalidId { kind: "cluster", id })?;
		cluster.add(doc, self.next_ticket);
		self.next_ticket += 1;
		self.total_docs += 1;
		Ok(id)
	}
}
