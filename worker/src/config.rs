use std::num::NonZeroUsize;

/// Records per rayon task when reducing a partition.
// SAFETY: 256 is not zero.
const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(256).unwrap();

/// Immutable execution settings of a worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: usize,
    /// The seed of the replicate, shared with the master to derive the initial weights.
    pub seed: u64,
    /// The fraction of the partition held out for validation.
    pub cross_validation_rate: f32,
    pub chunk_size: NonZeroUsize,
}

impl WorkerConfig {
    /// Creates a new worker configuration with the default chunk size.
    ///
    /// # Args
    /// * `worker_id` - Identifier used for observability.
    /// * `seed` - The seed of the replicate the worker belongs to.
    /// * `cross_validation_rate` - The fraction of records held out for validation.
    pub fn new(worker_id: usize, seed: u64, cross_validation_rate: f32) -> Self {
        Self {
            worker_id,
            seed,
            cross_validation_rate,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// The seed of this worker's own random draws, distinct per worker of a replicate.
    pub fn split_seed(&self) -> u64 {
        self.seed.wrapping_add(self.worker_id as u64 + 1)
    }
}
