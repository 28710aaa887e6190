//! Hash-based record routing for partitioned execution
//!
//! Routes join inputs to partitions by join key, so both sides of a key
//! always meet in the same partition worker.

use crate::cdcflow::error::{PipelineError, PipelineResult};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Routes join keys to partitions using a stable hash
#[derive(Debug, Clone)]
pub struct HashRouter {
    num_partitions: usize,
}

impl HashRouter {
    pub fn new(num_partitions: usize) -> PipelineResult<Self> {
        if num_partitions == 0 {
            return Err(PipelineError::config("must have at least 1 partition"));
        }
        Ok(Self { num_partitions })
    }

    /// Partition for a join key, in `[0, num_partitions)`
    ///
    /// Records without a key go to partition 0, where they are counted and
    /// dropped.
    pub fn route(&self, key: Option<&str>) -> usize {
        match key {
            Some(key) => (Self::hash_key(key) % self.num_partitions as u64) as usize,
            None => 0,
        }
    }

    fn hash_key(key: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }
}
