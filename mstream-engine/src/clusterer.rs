// ---------------------------------------------------------------------------
// StreamClusterer: batch orchestration and posterior queries
// ---------------------------------------------------------------------------
//
// Each batch runs three phases over its documents, always in input order:
//
// 1. First pass: sample an initial cluster for every document.
// 2. Refinement: `iteration_count - 1` collapsed Gibbs sweeps restricted
//    to the current batch (remove, then resample).
// 3. Finalization: one sweep that moves each document to its most probable
//    cluster, leaving a deterministic assignment.
//
// Documents are discarded afterwards; only the cluster aggregates persist.
// A batch runs against a checkpoint of vocabulary, clusters and RNG which
// replaces the live state only once the whole batch has succeeded.
// ---------------------------------------------------------------------------

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cluster_feature::ClusterFeature;
use crate::cluster_vector::{ClusterChoice, ClusterFeatureVector};
use crate::config::ClustererConfig;
use crate::document::Document;
use crate::error::ClusterError;
use crate::snapshot::{ClusterSnapshot, ModelSnapshot};
use crate::types::{BatchDocument, ClusterId, TermId, TermWeight, TopicTerms};
use crate::vocabulary::Vocabulary;

pub struct StreamClusterer<R = StdRng> {
	config: ClustererConfig,
	vocabulary: Vocabulary,
	clusters: ClusterFeatureVector,
	rng: R,
	batches_ingested: usize,
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
	match seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_os_rng(),
	}
}

impl StreamClusterer<StdRng> {
	/// Create an empty clusterer whose RNG is seeded from `config.seed`.
	pub fn new(config: ClustererConfig) -> Result<Self, ClusterError> {
		let rng = seeded_rng(config.seed);
		Self::with_rng(config, rng)
	}

	/// Rehydrate a clusterer from an exported snapshot.
	pub fn import(config: ClustererConfig, snapshot: &ModelSnapshot) -> Result<Self, ClusterError> {
		let rng = seeded_rng(config.seed);
		Self::import_with_rng(config, snapshot, rng)
	}
}

impl<R: Rng + Clone> StreamClusterer<R> {
	pub fn with_rng(config: ClustererConfig, rng: R) -> Result<Self, ClusterError> {
		config.validate()?;
		let clusters = ClusterFeatureVector::new(config.alpha, config.beta)?;
		Ok(Self {
			config,
			vocabulary: Vocabulary::new(),
			clusters,
			rng,
			batches_ingested: 0,
		})
	}

	pub fn import_with_rng(
		config: ClustererConfig,
		snapshot: &ModelSnapshot,
		rng: R,
	) -> Result<Self, ClusterError> {
		config.validate()?;
		let vocabulary = Vocabulary::from_terms(&snapshot.vocabulary)?;

		let mut features = Vec::with_capacity(snapshot.clusters.len());
		for cluster in &snapshot.clusters {
			features.push(rehydrate_cluster(cluster, vocabulary.size())?);
		}
		let clusters = ClusterFeatureVector::from_clusters(config.alpha, config.beta, features)?;

		tracing::info!(
			topics = clusters.size(),
			documents = clusters.total_docs(),
			vocabulary = vocabulary.size(),
			"imported model"
		);

		Ok(Self {
			config,
			vocabulary,
			clusters,
			rng,
			batches_ingested: 0,
		})
	}

	// -- Ingestion ---------------------------------------------------------

	/// Cluster one batch and return each document's final cluster id, in
	/// input order. On error no vocabulary, cluster or RNG state changes.
	pub fn ingest(&mut self, batch: &[BatchDocument]) -> Result<Vec<ClusterId>, ClusterError> {
		self.transact(batch, run_batch::<R>)
	}

	/// Run `step` against a checkpoint of vocabulary, clusters and RNG and
	/// commit the checkpoint only if it succeeds.
	fn transact<F>(&mut self, batch: &[BatchDocument], step: F) -> Result<Vec<ClusterId>, ClusterError>
	where
		F: FnOnce(
			usize,
			&[BatchDocument],
			&mut Vocabulary,
			&mut ClusterFeatureVector,
			&mut R,
		) -> Result<Vec<ClusterId>, ClusterError>,
	{
		let mut vocabulary = self.vocabulary.clone();
		let mut clusters = self.clusters.clone();
		let mut rng = self.rng.clone();

		let assignments = step(
			self.config.iteration_count,
			batch,
			&mut vocabulary,
			&mut clusters,
			&mut rng,
		)
		.inspect_err(|e| {
			tracing::warn!(error = %e, documents = batch.len(), "batch rolled back");
		})?;

		self.vocabulary = vocabulary;
		self.clusters = clusters;
		self.rng = rng;
		self.batches_ingested += 1;

		tracing::info!(
			batch = self.batches_ingested,
			documents = batch.len(),
			topics = self.clusters.size(),
			vocabulary = self.vocabulary.size(),
			"ingested batch"
		);
		Ok(assignments)
	}

	// -- Queries -----------------------------------------------------------

	pub fn topic_count(&self) -> usize {
		self.clusters.size()
	}

	/// Smoothed term distribution of every live cluster, restricted to terms
	/// the cluster has seen: `(n_zw + beta) / (n_z + V * beta)`.
	///
	/// Unseen terms are omitted, so the values of one cluster do not sum to
	/// one; normalising over the full vocabulary is up to the caller.
	pub fn topic_term_distribution(&self) -> BTreeMap<ClusterId, BTreeMap<TermId, f64>> {
		let beta = self.config.beta;
		let v_beta = self.vocabulary.size() as f64 * beta;
		self.clusters
			.iter()
			.map(|(id, cluster)| {
				let denominator = cluster.num_terms_with_repetition() as f64 + v_beta;
				let terms = cluster
					.iter()
					.map(|(term_id, freq)| (term_id, (freq as f64 + beta) / denominator))
					.collect();
				(id, terms)
			})
			.collect()
	}

	/// The `k` most probable terms of every cluster, renormalised to sum to
	/// one within the truncated list. Equal probabilities keep term-id order.
	pub fn top_terms(&self, k: usize) -> Result<Vec<TopicTerms>, ClusterError> {
		let mut topics = Vec::with_capacity(self.clusters.size());
		for (cluster_id, distribution) in self.topic_term_distribution() {
			let mut ranked: Vec<(TermId, f64)> = distribution.into_iter().collect();
			ranked.sort_by(|a, b| {
				b.1.partial_cmp(&a.1)
					.unwrap_or(Ordering::Equal)
					.then(a.0.cmp(&b.0))
			});
			ranked.truncate(k);

			let total: f64 = ranked.iter().map(|(_, p)| p).sum();
			let mut terms = Vec::with_capacity(ranked.len());
			for (term_id, probability) in ranked {
				terms.push(TermWeight {
					term: self.vocabulary.term_of(term_id)?.to_string(),
					probability: if total > 0.0 { probability / total } else { 0.0 },
				});
			}
			topics.push(TopicTerms { cluster_id, terms });
		}
		Ok(topics)
	}

	/// `top_terms` with the configured number of words per topic.
	pub fn default_top_terms(&self) -> Result<Vec<TopicTerms>, ClusterError> {
		self.top_terms(self.config.top_terms)
	}

	/// Assignment distribution a document made of `words` would see right
	/// now. The model is left untouched; unseen words count towards `V` as
	/// they would during ingestion.
	pub fn assignment_distribution<S: AsRef<str>>(&self, words: &[S]) -> Vec<(ClusterChoice, f64)> {
		let mut vocabulary = self.vocabulary.clone();
		let probe = Document::new("probe", words, &mut vocabulary);
		self.clusters.distribution(&probe, &vocabulary)
	}

	// -- Export ------------------------------------------------------------

	pub fn export(&self) -> ModelSnapshot {
		ModelSnapshot {
			vocabulary: self.vocabulary.terms().map(String::from).collect(),
			clusters: self
				.clusters
				.iter()
				.map(|(_, cluster)| ClusterSnapshot::from(cluster))
				.collect(),
		}
	}

	// -- Accessors ---------------------------------------------------------

	pub fn config(&self) -> &ClustererConfig {
		&self.config
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}

	pub fn clusters(&self) -> &ClusterFeatureVector {
		&self.clusters
	}

	pub fn batches_ingested(&self) -> usize {
		self.batches_ingested
	}
}

fn run_batch<R: Rng + ?Sized>(
	iteration_count: usize,
	batch: &[BatchDocument],
	vocabulary: &mut Vocabulary,
	clusters: &mut ClusterFeatureVector,
	rng: &mut R,
) -> Result<Vec<ClusterId>, ClusterError> {
	let mut docs: Vec<Document> = batch
		.iter()
		.map(|item| Document::new(item.id.as_str(), &item.terms, vocabulary))
		.collect();

	for doc in docs.iter_mut() {
		clusters.sample_and_add(doc, vocabulary, rng)?;
	}
	tracing::debug!(topics = clusters.size(), "first pass done");

	for sweep in 1..iteration_count {
		for doc in docs.iter_mut() {
			clusters.remove(doc)?;
			clusters.sample_and_add(doc, vocabulary, rng)?;
		}
		tracing::trace!(sweep, topics = clusters.size(), "refinement sweep done");
	}

	let mut assignments = Vec::with_capacity(docs.len());
	for doc in docs.iter_mut() {
		clusters.remove(doc)?;
		assignments.push(clusters.pick_max_and_add(doc, vocabulary)?);
	}
	Ok(assignments)
}

fn rehydrate_cluster(
	snapshot: &ClusterSnapshot,
	vocabulary_size: usize,
) -> Result<ClusterFeature, ClusterError> {
	let mut seen = HashSet::with_capacity(snapshot.terms.len());
	for &(term_id, freq) in &snapshot.terms {
		if term_id >= vocabulary_size {
			return Err(ClusterError::InvalidSnapshot(format!(
				"cluster {} references unknown term id {}",
				snapshot.id, term_id
			)));
		}
		if freq == 0 {
			return Err(ClusterError::InvalidSnapshot(format!(
				"cluster {} has zero frequency for term id {}",
				snapshot.id, term_id
			)));
		}
		if !seen.insert(term_id) {
			return Err(ClusterError::InvalidSnapshot(format!(
				"cluster {} lists term id {} twice",
				snapshot.id, term_id
			)));
		}
	}
	Ok(ClusterFeature::from_parts(
		snapshot.id,
		snapshot.doc_count,
		snapshot.terms.iter().copied(),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config(alpha: f64, beta: f64, iteration_count: usize, seed: u64) -> ClustererConfig {
		ClustererConfig {
			alpha,
			beta,
			iteration_count,
			top_terms: 10,
			seed: Some(seed),
		}
	}

	fn repeated(prefix: &str, count: usize, words: &[&str]) -> Vec<BatchDocument> {
		(0..count)
			.map(|i| BatchDocument::new(format!("{}-{}", prefix, i), words.iter().copied()))
			.collect()
	}

	fn assert_model_invariants<R: Rng + Clone>(clusterer: &StreamClusterer<R>) {
		let clusters = clusterer.clusters();
		let mut docs = 0;
		let mut ids = HashSet::new();
		for (id, cluster) in clusters.iter() {
			assert!(ids.insert(id), "duplicate live id {}", id);
			assert!(cluster.num_docs() > 0);
			assert_eq!(cluster.num_terms(), cluster.num_terms_with_repetition());
			docs += cluster.num_docs();
		}
		assert_eq!(docs, clusters.total_docs());
	}

	#[test]
	fn new_rejects_invalid_config() {
		assert!(matches!(
			StreamClusterer::new(config(0.0, 0.03, 1, 0)),
			Err(ClusterError::InvalidHyperparameter { name: "alpha", .. })
		));
		assert!(matches!(
			StreamClusterer::new(config(0.03, 0.0, 1, 0)),
			Err(ClusterError::InvalidHyperparameter { name: "beta", .. })
		));
	}

	#[test]
	fn identical_documents_share_one_topic() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.03, 1, 42)).unwrap();
		let batch = repeated("a", 3, &["a"]);
		let ids = clusterer.ingest(&batch).unwrap();

		assert_eq!(ids.len(), 3);
		assert_eq!(ids[0], 0);
		assert!(ids.iter().all(|&id| id == ids[0]));
		assert_eq!(clusterer.topic_count(), 1);
		assert_model_invariants(&clusterer);
	}

	#[test]
	fn failed_batch_leaves_model_untouched() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.03, 3, 9)).unwrap();
		clusterer.ingest(&repeated("warm", 3, &["a", "b"])).unwrap();

		let vocabulary_size = clusterer.vocabulary().size();
		let snapshot = clusterer.export();
		let next_draw = clusterer.rng.clone().random::<u64>();

		let batch = repeated("late", 2, &["c", "d"]);
		let result = clusterer.transact(&batch, |iterations, batch, vocabulary, clusters, rng| {
			let assignments = run_batch(iterations, batch, vocabulary, clusters, rng)?;
			// a document that is still assigned cannot be added again
			let mut straggler = Document::new("straggler", &["e"], vocabulary);
			clusters.sample_and_add(&mut straggler, vocabulary, rng)?;
			clusters.sample_and_add(&mut straggler, vocabulary, rng)?;
			Ok(assignments)
		});

		assert!(matches!(
			result,
			Err(ClusterError::AlreadyAssigned { ref document, .. }) if document == "straggler"
		));
		assert_eq!(clusterer.vocabulary().size(), vocabulary_size);
		assert!(!clusterer.vocabulary().contains("c"));
		assert_eq!(clusterer.export(), snapshot);
		assert_eq!(clusterer.batches_ingested(), 1);
		assert_eq!(clusterer.rng.clone().random::<u64>(), next_draw);
		assert_model_invariants(&clusterer);

		// still usable afterwards
		clusterer.ingest(&batch).unwrap();
		assert_eq!(clusterer.vocabulary().size(), vocabulary_size + 2);
	}

	#[test]
	fn first_document_opens_cluster_zero() {
		for alpha in [1e-9, 0.03, 50.0] {
			let mut clusterer = StreamClusterer::new(config(alpha, 0.03, 3, 1)).unwrap();
			let ids = clusterer
				.ingest(&[BatchDocument::new("only", ["a", "b"])])
				.unwrap();
			assert_eq!(ids, vec![0]);
			assert_eq!(clusterer.topic_count(), 1);
		}
	}

	#[test]
	fn separate_batches_of_disjoint_terms_form_pure_topics() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.03, 5, 7)).unwrap();
		let x_ids = clusterer
			.ingest(&repeated("x", 6, &["x", "x", "x", "x"]))
			.unwrap();
		let y_ids = clusterer
			.ingest(&repeated("y", 6, &["y", "y", "y", "y"]))
			.unwrap();

		assert_eq!(clusterer.topic_count(), 2);
		assert!(x_ids.iter().all(|&id| id == x_ids[0]));
		assert!(y_ids.iter().all(|&id| id == y_ids[0]));
		assert_ne!(x_ids[0], y_ids[0]);

		let x = clusterer.vocabulary().id_of("x").unwrap();
		let y = clusterer.vocabulary().id_of("y").unwrap();
		let x_cluster = clusterer.clusters().get(x_ids[0]).unwrap();
		let y_cluster = clusterer.clusters().get(y_ids[0]).unwrap();
		assert_eq!(x_cluster.term_frequency(x), 24);
		assert_eq!(x_cluster.term_frequency(y), 0);
		assert_eq!(y_cluster.term_frequency(y), 24);
		assert_eq!(y_cluster.term_frequency(x), 0);
		assert_model_invariants(&clusterer);
	}

	#[test]
	fn top_term_of_single_term_cluster_is_certain() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.03, 3, 0)).unwrap();
		clusterer
			.ingest(&[BatchDocument::new("z", vec!["z"; 10])])
			.unwrap();

		let topics = clusterer.top_terms(1).unwrap();
		assert_eq!(topics.len(), 1);
		assert_eq!(
			topics[0].terms,
			vec![TermWeight {
				term: "z".into(),
				probability: 1.0,
			}]
		);
	}

	#[test]
	fn top_terms_are_sorted_and_renormalised() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.1, 2, 3)).unwrap();
		clusterer
			.ingest(&[BatchDocument::new(
				"d",
				["a", "b", "b", "c", "c", "c", "d"],
			)])
			.unwrap();

		let topics = clusterer.top_terms(2).unwrap();
		let terms: Vec<&str> = topics[0].terms.iter().map(|t| t.term.as_str()).collect();
		assert_eq!(terms, vec!["c", "b"]);
		let sum: f64 = topics[0].terms.iter().map(|t| t.probability).sum();
		assert!((sum - 1.0).abs() < 1e-12);
		// (3 + b) : (2 + b)
		let expected = 3.1 / (3.1 + 2.1);
		assert!((topics[0].terms[0].probability - expected).abs() < 1e-12);

		// Ties between "a" and "d" keep vocabulary order.
		let all = clusterer.top_terms(10).unwrap();
		let order: Vec<&str> = all[0].terms.iter().map(|t| t.term.as_str()).collect();
		assert_eq!(order, vec!["c", "b", "a", "d"]);
		assert!(clusterer.top_terms(0).unwrap()[0].terms.is_empty());
	}

	#[test]
	fn topic_term_distribution_uses_smoothed_counts() {
		let (alpha, beta) = (0.03, 0.5);
		let mut clusterer = StreamClusterer::new(config(alpha, beta, 1, 9)).unwrap();
		clusterer
			.ingest(&[BatchDocument::new("d", ["p", "p", "q"])])
			.unwrap();
		let p = clusterer.vocabulary().id_of("p").unwrap();
		let q = clusterer.vocabulary().id_of("q").unwrap();

		let dist = clusterer.topic_term_distribution();
		let cluster = &dist[&0];
		let denominator = 3.0 + 2.0 * beta;
		assert_eq!(cluster.len(), 2);
		assert!((cluster[&p] - (2.0 + beta) / denominator).abs() < 1e-12);
		assert!((cluster[&q] - (1.0 + beta) / denominator).abs() < 1e-12);
	}

	#[test]
	fn empty_documents_are_accepted() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.03, 4, 5)).unwrap();
		let empty: Vec<String> = Vec::new();
		let batch = vec![
			BatchDocument::new("words", ["a", "b"]),
			BatchDocument::new("blank-1", empty.clone()),
			BatchDocument::new("blank-2", empty),
		];
		let ids = clusterer.ingest(&batch).unwrap();
		assert_eq!(ids.len(), 3);
		assert_eq!(clusterer.clusters().total_docs(), 3);
		assert_model_invariants(&clusterer);
	}

	#[test]
	fn empty_batch_returns_no_assignments() {
		let mut clusterer = StreamClusterer::new(config(0.03, 0.03, 4, 5)).unwrap();
		assert!(clusterer.ingest(&[]).unwrap().is_empty());
		assert_eq!(clusterer.topic_count(), 0);
		assert_eq!(clusterer.batches_ingested(), 1);
	}

	#[test]
	fn vocabulary_never_shrinks() {
		let mut clusterer = StreamClusterer::new(config(0.1, 0.05, 3, 12)).unwrap();
		let batches = [
			vec![BatchDocument::new("1", ["a", "b"]), BatchDocument::new("2", ["c"])],
			vec![BatchDocument::new("3", ["a"])],
			vec![BatchDocument::new("4", ["d", "e", "a"])],
		];
		let mut last = 0;
		for batch in &batches {
			clusterer.ingest(batch).unwrap();
			assert!(clusterer.vocabulary().size() >= last);
			last = clusterer.vocabulary().size();
			assert_model_invariants(&clusterer);
		}
		assert_eq!(last, 5);
	}

	#[test]
	fn same_seed_gives_same_assignments() {
		let batch = vec![
			BatchDocument::new("1", ["rust", "cargo"]),
			BatchDocument::new("2", ["python", "pip"]),
			BatchDocument::new("3", ["rust", "borrow", "cargo"]),
			BatchDocument::new("4", ["pip", "venv"]),
			BatchDocument::new("5", ["soup", "salt"]),
		];
		let mut a = StreamClusterer::new(config(0.5, 0.05, 8, 31)).unwrap();
		let mut b = StreamClusterer::new(config(0.5, 0.05, 8, 31)).unwrap();
		assert_eq!(a.ingest(&batch).unwrap(), b.ingest(&batch).unwrap());
		assert_eq!(a.export(), b.export());
	}

	#[test]
	fn export_import_reproduces_distributions() {
		let mut original = StreamClusterer::new(config(0.2, 0.05, 6, 77)).unwrap();
		original
			.ingest(&[
				BatchDocument::new("1", ["rust", "cargo", "crate"]),
				BatchDocument::new("2", ["python", "pip"]),
				BatchDocument::new("3", ["rust", "borrow"]),
			])
			.unwrap();
		original
			.ingest(&[
				BatchDocument::new("4", ["soup", "salt", "salt"]),
				BatchDocument::new("5", ["python", "venv"]),
			])
			.unwrap();

		let snapshot = original.export();
		let restored = StreamClusterer::import(original.config().clone(), &snapshot).unwrap();

		assert_eq!(restored.topic_count(), original.topic_count());
		assert_eq!(restored.export(), snapshot);
		assert_eq!(
			restored.topic_term_distribution(),
			original.topic_term_distribution()
		);
		for probe in [
			vec!["rust", "cargo"],
			vec!["salt", "pepper"],
			vec!["unseen"],
			vec![],
		] {
			assert_eq!(
				restored.assignment_distribution(&probe),
				original.assignment_distribution(&probe)
			);
		}
	}

	#[test]
	fn import_restores_id_recycling() {
		let snapshot = ModelSnapshot {
			vocabulary: vec!["a".into(), "b".into()],
			clusters: vec![
				ClusterSnapshot {
					id: 0,
					doc_count: 2,
					terms: vec![(0, 2)],
				},
				ClusterSnapshot {
					id: 3,
					doc_count: 1,
					terms: vec![(1, 1)],
				},
			],
		};
		let restored = StreamClusterer::import(config(0.03, 0.03, 1, 0), &snapshot).unwrap();
		assert_eq!(restored.clusters().total_docs(), 3);
		assert_eq!(
			restored.clusters().id_pool().free_ids().collect::<Vec<_>>(),
			vec![1, 2]
		);
	}

	#[test]
	fn import_rejects_malformed_snapshots() {
		let base = ModelSnapshot {
			vocabulary: vec!["a".into()],
			clusters: vec![ClusterSnapshot {
				id: 0,
				doc_count: 1,
				terms: vec![(0, 1)],
			}],
		};
		let cfg = config(0.03, 0.03, 1, 0);
		assert!(StreamClusterer::import(cfg.clone(), &base).is_ok());

		let mut unknown_term = base.clone();
		unknown_term.clusters[0].terms = vec![(4, 1)];
		let mut zero_freq = base.clone();
		zero_freq.clusters[0].terms = vec![(0, 0)];
		let mut repeated_term = base.clone();
		repeated_term.clusters[0].terms = vec![(0, 1), (0, 2)];
		let mut no_docs = base.clone();
		no_docs.clusters[0].doc_count = 0;
		let mut duplicate_vocab = base.clone();
		duplicate_vocab.vocabulary.push("a".into());

		for bad in [unknown_term, zero_freq, repeated_term, no_docs, duplicate_vocab] {
			assert!(matches!(
				StreamClusterer::import(cfg.clone(), &bad),
				Err(ClusterError::InvalidSnapshot(_))
			));
		}
	}

	#[test]
	fn ingest_after_import_continues_clustering() {
		let mut original = StreamClusterer::new(config(0.03, 0.03, 5, 4)).unwrap();
		let x_ids = original
			.ingest(&repeated("x", 4, &["x", "x", "x"]))
			.unwrap();

		let mut restored = StreamClusterer::import(original.config().clone(), &original.export()).unwrap();
		let more = restored
			.ingest(&repeated("x-more", 2, &["x", "x", "x"]))
			.unwrap();
		assert_eq!(more, vec![x_ids[0], x_ids[0]]);
		assert_eq!(restored.clusters().total_docs(), 6);
	}
}
