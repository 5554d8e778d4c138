// ---------------------------------------------------------------------------
// Vocabulary: append-only term <-> id registry
// ---------------------------------------------------------------------------
//
// Ids are dense (0..N-1), assigned in insertion order, and never reused.
// Backed by persistent collections so a clone shares structure with the
// original; the clusterer checkpoints the vocabulary this way before every
// batch.
// ---------------------------------------------------------------------------

use crate::error::ClusterError;
use crate::types::TermId;

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
	/// id -> term
	id_to_term: im::Vector<String>,
	/// term -> id
	term_to_id: im::HashMap<String, TermId>,
}

impl Vocabulary {
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuild a vocabulary from terms listed in id order.
	///
	/// Fails if a term appears twice, since ids must stay a bijection.
	pub fn from_terms<I, S>(terms: I) -> Result<Self, ClusterError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut vocabulary = Self::new();
		for term in terms {
			let term = term.into();
			if vocabulary.contains(&term) {
				return Err(ClusterError::InvalidSnapshot(format!(
					"duplicate vocabulary term: {}",
					term
				)));
			}
			vocabulary.add(&term);
		}
		Ok(vocabulary)
	}

	/// Return the id of `term`, registering it with the next sequential id
	/// if it has not been seen before.
	pub fn add(&mut self, term: &str) -> TermId {
		if let Some(&id) = self.term_to_id.get(term) {
			return id;
		}
		let id = self.id_to_term.len();
		self.id_to_term.push_back(term.to_string());
		self.term_to_id.insert(term.to_string(), id);
		id
	}

	pub fn id_of(&self, term: &str) -> Result<TermId, ClusterError> {
		self.term_to_id
			.get(term)
			.copied()
			.ok_or_else(|| ClusterError::UnknownTerm(term.to_string()))
	}

	pub fn term_of(&self, id: TermId) -> Result<&str, ClusterError> {
		self.id_to_term
			.get(id)
			.map(String::as_str)
			.ok_or(ClusterError::InvalidId { kind: "term", id })
	}

	pub fn contains(&self, term: &str) -> bool {
		self.term_to_id.contains_key(term)
	}

	pub fn size(&self) -> usize {
		self.id_to_term.len()
	}

	pub fn is_empty(&self) -> bool {
		self.id_to_term.is_empty()
	}

	/// All terms in id order.
	pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
		self.id_to_term.iter().map(String::as_str)
	}
}
