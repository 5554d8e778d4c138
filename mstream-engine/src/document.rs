use std::collections::HashMap;

use crate::types::{ClusterId, TermId};
use crate::vocabulary::Vocabulary;

/// Proof that a document was added to a cluster: the cluster id plus the
/// ticket the cluster issued for this particular add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Membership {
	pub(crate) cluster: ClusterId,
	pub(crate) ticket: u64,
}

/// Sparse bag-of-words view of one ingested item.
///
/// Term frequencies are kept in first-encounter order so that every pass over
/// a document visits its terms identically, which keeps sampling reproducible
/// under a fixed seed.
#[derive(Debug, Clone)]
pub struct Document {
	id: String,
	/// (term id, frequency) in first-encounter order
	terms: Vec<(TermId, usize)>,
	/// term id -> position in `terms`
	positions: HashMap<TermId, usize>,
	total_length: usize,
	membership: Option<Membership>,
}

impl Document {
	/// Build a document, registering every unseen term in `vocabulary`.
	pub fn new<S: AsRef<str>>(id: impl Into<String>, words: &[S], vocabulary: &mut Vocabulary) -> Self {
		let mut terms: Vec<(TermId, usize)> = Vec::new();
		let mut positions: HashMap<TermId, usize> = HashMap::new();

		for word in words {
			let term_id = vocabulary.add(word.as_ref());
			match positions.get(&term_id) {
				Some(&pos) => terms[pos].1 += 1,
				None => {
					positions.insert(term_id, terms.len());
					terms.push((term_id, 1));
				}
			}
		}

		Self {
			id: id.into(),
			terms,
			positions,
			total_length: words.len(),
			membership: None,
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Sum of all term frequencies, repeats included.
	pub fn total_length(&self) -> usize {
		self.total_length
	}

	pub fn distinct_term_count(&self) -> usize {
		self.terms.len()
	}

	pub fn frequency(&self, term_id: TermId) -> usize {
		self.positions
			.get(&term_id)
			.map(|&pos| self.terms[pos].1)
			.unwrap_or(0)
	}

	/// `(term id, frequency)` pairs in first-encounter order.
	pub fn iter(&self) -> impl Iterator<Item = (TermId, usize)> + '_ {
		self.terms.iter().copied()
	}

	pub fn cluster(&self) -> Option<ClusterId> {
		self.membership.map(|m| m.cluster)
	}

	pub(crate) fn membership(&self) -> Option<Membership> {
		self.membership
	}

	pub(crate) fn set_membership(&mut self, membership: Option<Membership>) {
		self.membership = membership;
	}
}
