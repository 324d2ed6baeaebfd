use comms::specs::training::TrainingSpec;
use machine_learning::{arch::Topology, dataset::Partition};

use crate::{Result, Worker, WorkerConfig, WorkerUnit};

pub struct WorkerBuilder;

impl WorkerBuilder {
    /// Builds a `Worker` from the training specification.
    ///
    /// # Args
    /// * `spec` - The training specification shared by the whole replicate.
    /// * `worker_id` - Identifier used for observability.
    /// * `seed` - The seed of the replicate.
    /// * `partition` - The records owned by the worker.
    ///
    /// # Returns
    /// A fully initialized `Worker` instance or an error if the topology is invalid.
    pub fn build(spec: &TrainingSpec, worker_id: usize, seed: u64, partition: Partition) -> Result<Worker> {
        let topology = Topology::try_from(&spec.topology)?;
        let config = WorkerConfig::new(worker_id, seed, spec.cross_validation_rate);
        let unit = WorkerUnit::new(&config, topology, spec.loss.into(), partition);
        Ok(Worker::new(seed, unit))
    }
}
