use std::num::NonZeroUsize;

use log::{debug, error};
use machine_learning::{
    arch::{Sequential, Topology, loss::Loss},
    dataset::{Partition, Record, RecordBatch},
    training::IterationResult,
};
use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;

use crate::{Result, WorkerConfig, WorkerErr};

/// Where a unit is in its iteration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Computing,
    Reported { iteration: u32 },
    /// Terminal, the unit refuses to compute again.
    Failed,
}

/// The partial sums of a chunk of records.
struct Partial {
    gradient: Vec<f32>,
    loss: f32,
    weight: f32,
}

impl Partial {
    fn zero(len: usize) -> Self {
        Self {
            gradient: vec![0.; len],
            loss: 0.,
            weight: 0.,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.gradient
            .iter_mut()
            .zip(&other.gradient)
            .for_each(|(acc, g)| *acc += g);

        self.loss += other.loss;
        self.weight += other.weight;
        self
    }

    /// The loss averaged over the significance of the records, zero without records.
    fn error(&self) -> f32 {
        if self.weight > 0. {
            self.loss / self.weight
        } else {
            0.
        }
    }
}

/// Computes a worker's partial result of every iteration from a fixed partition of the
/// training data.
#[derive(Debug)]
pub struct WorkerUnit {
    worker_id: usize,
    topology: Topology,
    loss: Loss,
    train: Partition,
    validation: Partition,
    chunk_size: NonZeroUsize,
    state: WorkerState,
}

impl WorkerUnit {
    /// Creates a new `WorkerUnit`, holding out part of `partition` for validation.
    ///
    /// # Args
    /// * `config` - The worker's settings.
    /// * `topology` - The shape of the trained network.
    /// * `loss` - The loss to minimize.
    /// * `partition` - The records owned by this worker.
    pub fn new(config: &WorkerConfig, topology: Topology, loss: Loss, partition: Partition) -> Self {
        let mut rng = StdRng::seed_from_u64(config.split_seed());
        let (train, validation) = partition.split_validation(config.cross_validation_rate, &mut rng);

        debug!(
            worker_id = config.worker_id,
            train = train.len(),
            validation = validation.len();
            "partition split"
        );

        Self {
            worker_id: config.worker_id,
            topology,
            loss,
            train,
            validation,
            chunk_size: config.chunk_size,
            state: WorkerState::Idle,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Computes the partial result of `iteration` with the given weights.
    ///
    /// # Errors
    /// Any failure moves the unit to `WorkerState::Failed` for good: a weights length that
    /// doesn't match the topology, non finite values or malformed records.
    pub fn compute_iteration(&mut self, iteration: u32, weights: &[f32]) -> Result<IterationResult> {
        if self.state == WorkerState::Failed {
            return Err(WorkerErr::Failed);
        }

        self.state = WorkerState::Computing;

        match self.compute(iteration, weights) {
            Ok(result) => {
                self.state = WorkerState::Reported { iteration };
                Ok(result)
            }
            Err(e) => {
                error!(worker_id = self.worker_id, iteration = iteration; "computation failed: {e}");
                self.state = WorkerState::Failed;
                Err(e)
            }
        }
    }

    fn compute(&self, iteration: u32, weights: &[f32]) -> Result<IterationResult> {
        let expected = self.topology.param_count();
        if weights.len() != expected {
            return Err(WorkerErr::WeightsLengthMismatch {
                iteration,
                got: weights.len(),
                expected,
            });
        }

        if self.train.is_empty() && self.validation.is_empty() {
            return Ok(IterationResult::empty(iteration, expected));
        }

        let train = self.reduce(self.train.records(), weights, true)?;
        let validation = self.reduce(self.validation.records(), weights, false)?;

        let result = IterationResult {
            iteration,
            train_error: train.error(),
            validation_error: validation.error(),
            train_size: self.train.len() as u64,
            validation_size: self.validation.len() as u64,
            gradient: train.gradient,
        };

        if !result.train_error.is_finite() || !result.validation_error.is_finite() {
            return Err(WorkerErr::NonFinite {
                iteration,
                what: "error",
            });
        }

        if !result.gradient.iter().all(|g| g.is_finite()) {
            return Err(WorkerErr::NonFinite {
                iteration,
                what: "gradient",
            });
        }

        Ok(result)
    }

    /// Sums the loss of `records`, and their gradient if `backprop` is set, in parallel chunks.
    fn reduce(&self, records: &[Record], weights: &[f32], backprop: bool) -> Result<Partial> {
        let len = weights.len();
        let (inputs, outputs) = (self.topology.inputs(), self.topology.outputs());

        records
            .par_chunks(self.chunk_size.get())
            .map(|chunk| -> Result<Partial> {
                let batch = RecordBatch::new(chunk, inputs, outputs)?;
                let mut model = Sequential::new(&self.topology);
                let (x, y, s) = (batch.x.view(), batch.y.view(), batch.s.view());

                let mut partial = Partial::zero(if backprop { len } else { 0 });
                partial.weight = batch.weight();
                partial.loss = if backprop {
                    model.backprop(weights, &mut partial.gradient, &self.loss, x, y, s)?
                } else {
                    model.evaluate(weights, &self.loss, x, y, s)?
                };

                Ok(partial)
            })
            .try_reduce(
                || Partial::zero(if backprop { len } else { 0 }),
                |a, b| Ok(a.merge(b)),
            )
    }
}
