use std::collections::{HashSet, VecDeque};

use crate::error::ClusterError;
use crate::types::ClusterId;

/// Issues cluster ids and recycles retired ones, oldest-retired first.
#[derive(Debug, Clone, Default)]
pub struct ClusterIdPool {
	/// next never-issued id
	high_water_mark: ClusterId,
	free: VecDeque<ClusterId>,
	/// mirror of `free` for membership checks
	free_set: HashSet<ClusterId>,
}

impl ClusterIdPool {
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuild a pool in which exactly `live` are issued. Every id below the
	/// resulting high-water mark that is not live becomes free, ascending.
	pub(crate) fn with_live_ids(live: &[ClusterId]) -> Self {
		let high_water_mark = live.iter().max().map(|&id| id + 1).unwrap_or(0);
		let live: HashSet<ClusterId> = live.iter().copied().collect();
		let free: VecDeque<ClusterId> = (0..high_water_mark)
			.filter(|id| !live.contains(id))
			.collect();
		let free_set = free.iter().copied().collect();
		Self {
			high_water_mark,
			free,
			free_set,
		}
	}

	pub fn acquire(&mut self) -> ClusterId {
		if let Some(id) = self.free.pop_front() {
			self.free_set.remove(&id);
			return id;
		}
		let id = self.high_water_mark;
		self.high_water_mark += 1;
		id
	}

	pub fn release(&mut self, id: ClusterId) -> Result<(), ClusterError> {
		if id >= self.high_water_mark {
			return Err(ClusterError::InvalidId { kind: "cluster", id });
		}
		if !self.free_set.insert(id) {
			return Err(ClusterError::DoubleRelease(id));
		}
		self.free.push_back(id);
		Ok(())
	}

	pub fn is_free(&self, id: ClusterId) -> bool {
		self.free_set.contains(&id)
	}

	pub fn high_water_mark(&self) -> ClusterId {
		self.high_water_mark
	}

	/// Free ids in reuse order.
	pub fn free_ids(&self) -> impl Iterator<Item = ClusterId> + '_ {
		self.free.iter().copied()
	}
}
