// ---------------------------------------------------------------------------
// ClusterFeature: sufficient statistics of one cluster
// ---------------------------------------------------------------------------
//
// Tracks the document count `m`, the per-term aggregate frequency `n_w` and
// the total term occurrences `n` of a cluster. Invariant: `n == sum(n_w)`.
// Terms whose aggregate drops to zero are dropped from `n_w`.
//
// Each add is stamped with a ticket that the document carries back on
// removal; only a document holding a live ticket of this cluster can be
// subtracted. Clusters rehydrated from a snapshot start with no tickets.
// ---------------------------------------------------------------------------

use crate::document::{Document, Membership};
use crate::error::ClusterError;
use crate::types::{ClusterId, TermId};

#[derive(Debug, Clone)]
pub struct ClusterFeature {
	id: ClusterId,
	/// m_z: number of documents
	num_docs: usize,
	/// n_z: number of term occurrences, repeats included
	num_terms: usize,
	/// n_{z,w}: term id -> aggregate frequency
	term_freqs: im::OrdMap<TermId, usize>,
	/// tickets of documents added since construction
	members: im::OrdSet<u64>,
}

impl ClusterFeature {
	pub fn new(id: ClusterId) -> Self {
		Self {
			id,
			num_docs: 0,
			num_terms: 0,
			term_freqs: im::OrdMap::new(),
			members: im::OrdSet::new(),
		}
	}

	/// Rehydrate a cluster from exported aggregates.
	pub(crate) fn from_parts(
		id: ClusterId,
		num_docs: usize,
		term_freqs: impl IntoIterator<Item = (TermId, usize)>,
	) -> Self {
		let mut cluster = Self::new(id);
		cluster.num_docs = num_docs;
		for (term_id, freq) in term_freqs {
			let current = cluster.term_freqs.get(&term_id).copied().unwrap_or(0);
			cluster.term_freqs.insert(term_id, current + freq);
			cluster.num_terms += freq;
		}
		cluster
	}

	pub fn id(&self) -> ClusterId {
		self.id
	}

	/// Add a document's term counts and stamp it with `ticket`. The caller
	/// guarantees the document is not already a member and that tickets are
	/// never reused.
	pub(crate) fn add(&mut self, doc: &mut Document, ticket: u64) {
		self.num_docs += 1;
		for (term_id, freq) in doc.iter() {
			let current = self.term_freqs.get(&term_id).copied().unwrap_or(0);
			self.term_freqs.insert(term_id, current + freq);
			self.num_terms += freq;
		}
		self.members.insert(ticket);
		doc.set_membership(Some(Membership {
			cluster: self.id,
			ticket,
		}));
	}

	/// Subtract a previously added document and clear its membership. Fails
	/// without touching any count unless the document carries a live ticket
	/// of this cluster.
	pub fn remove(&mut self, doc: &mut Document) -> Result<(), ClusterError> {
		let ticket = match doc.membership() {
			Some(m) if m.cluster == self.id && self.members.contains(&m.ticket) => m.ticket,
			_ => return Err(ClusterError::DoubleRemoval(doc.id().to_string())),
		};
		let counts_cover = self.num_docs > 0
			&& self.num_terms >= doc.total_length()
			&& doc
				.iter()
				.all(|(term_id, freq)| self.term_frequency(term_id) >= freq);
		if !counts_cover {
			return Err(ClusterError::DoubleRemoval(doc.id().to_string()));
		}

		self.num_docs -= 1;
		for (term_id, freq) in doc.iter() {
			let remaining = self.term_frequency(term_id) - freq;
			if remaining == 0 {
				self.term_freqs.remove(&term_id);
			} else {
				self.term_freqs.insert(term_id, remaining);
			}
			self.num_terms -= freq;
		}
		self.members.remove(&ticket);
		doc.set_membership(None);
		Ok(())
	}

	pub fn is_empty(&self) -> bool {
		self.num_docs == 0
	}

	pub fn num_docs(&self) -> usize {
		self.num_docs
	}

	pub fn num_terms(&self) -> usize {
		self.num_terms
	}

	pub fn term_frequency(&self, term_id: TermId) -> usize {
		self.term_freqs.get(&term_id).copied().unwrap_or(0)
	}

	/// Recomputed `sum(n_w)`; equal to `num_terms()` whenever the invariant
	/// holds.
	pub fn num_terms_with_repetition(&self) -> usize {
		self.term_freqs.iter().map(|(_, &freq)| freq).sum()
	}

	pub fn distinct_terms(&self) -> usize {
		self.term_freqs.len()
	}

	/// `(term id, aggregate frequency)` pairs, ascending by term id.
	pub fn iter(&self) -> impl Iterator<Item = (TermId, usize)> + '_ {
		self.term_freqs.iter().map(|(&term_id, &freq)| (term_id, freq))
	}
}
