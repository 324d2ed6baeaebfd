use std::sync::Arc;

use comms::{OnoReceiver, OnoSender, specs::training::TrainingSpec};
use log::{debug, info, warn};
use machine_learning::{dataset::Dataset, model::TrainedModel};
use master::{Master, MasterCoordinator};
use pipeline::{TrainErr, Trainer};
use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    io::{self, DuplexStream, ReadHalf, WriteHalf},
    task::JoinSet,
};
use worker::WorkerBuilder;

use crate::{OrchestratorError, Result};

/// Bytes buffered by an in-process master to worker link.
const LINK_CAPACITY: usize = 1 << 16;

type Link = (
    OnoReceiver<ReadHalf<DuplexStream>>,
    OnoSender<WriteHalf<DuplexStream>>,
);

fn link() -> (Link, Link) {
    let (master_side, worker_side) = io::duplex(LINK_CAPACITY);
    let (master_rx, master_tx) = io::split(master_side);
    let (worker_rx, worker_tx) = io::split(worker_side);
    (
        comms::channel(master_rx, master_tx),
        comms::channel(worker_rx, worker_tx),
    )
}

/// Trains `bagging_count` independent replicates of the network, each one a master with its
/// own workers over a bootstrap sample of the training set.
#[derive(Debug, Clone)]
pub struct Ensemble {
    spec: Arc<TrainingSpec>,
    seed: u64,
}

impl Ensemble {
    /// Creates a new `Ensemble`, drawing a random seed when `seed` is unset.
    pub fn new(spec: TrainingSpec) -> Self {
        let seed = spec.seed.unwrap_or_else(rand::random);
        debug!(seed = seed; "ensemble seed resolved");

        Self {
            spec: Arc::new(spec),
            seed,
        }
    }

    pub fn spec(&self) -> &TrainingSpec {
        &self.spec
    }

    /// The seed shared by the master and the workers of `replicate`.
    pub fn replicate_seed(&self, replicate: usize) -> u64 {
        self.seed.wrapping_add(replicate as u64)
    }

    /// Trains every replicate in parallel over an already prepared dataset.
    ///
    /// This is the standalone entry point of the driver, for callers that bring their own
    /// `Dataset` instead of raw lines. A `RunContext` goes through the pipeline instead, whose
    /// train stage calls `Trainer::train` once per replicate.
    ///
    /// # Returns
    /// The models sorted by replicate, or the first failure, in which case the remaining
    /// replicates are aborted.
    pub async fn run(&self, dataset: Arc<Dataset>) -> Result<Vec<TrainedModel>> {
        let bagging = self.spec.bagging_count.get();
        let mut replicates = JoinSet::new();

        for replicate in 0..bagging {
            let spec = self.spec.clone();
            let seed = self.replicate_seed(replicate);
            let dataset = dataset.clone();

            replicates.spawn(run_replicate(spec, replicate, seed, dataset));
        }

        let mut models = Vec::with_capacity(bagging);
        while let Some(res) = replicates.join_next().await {
            let model = res
                .map_err(|e| OrchestratorError::Join(e.to_string()))
                .and_then(|model| model);

            match model {
                Ok(model) => models.push(model),
                Err(e) => {
                    warn!("aborting the ensemble: {e}");
                    replicates.abort_all();
                    return Err(e);
                }
            }
        }

        models.sort_by_key(|m| m.replicate);
        info!(replicates = models.len(); "ensemble trained");

        Ok(models)
    }
}

impl Trainer for Ensemble {
    async fn train(
        &self,
        replicate: usize,
        dataset: Arc<Dataset>,
    ) -> std::result::Result<TrainedModel, TrainErr> {
        let seed = self.replicate_seed(replicate);
        let model = run_replicate(self.spec.clone(), replicate, seed, dataset).await?;
        Ok(model)
    }
}

/// Trains a single replicate: bootstraps its sample, splits it among its workers and runs
/// the master until it terminates.
pub async fn run_replicate(
    spec: Arc<TrainingSpec>,
    replicate: usize,
    seed: u64,
    dataset: Arc<Dataset>,
) -> Result<TrainedModel> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sample = dataset.bootstrap(spec.sample_rate, spec.bagging_with_replacement, &mut rng)?;
    let partitions = sample.partitions(spec.workers_per_replicate);

    info!(
        replicate = replicate,
        records = sample.len(),
        workers = partitions.len();
        "starting replicate"
    );

    let mut workers = JoinSet::new();
    let mut links = Vec::with_capacity(partitions.len());

    for (worker_id, partition) in partitions.into_iter().enumerate() {
        let (master_side, (rx, tx)) = link();
        let worker = WorkerBuilder::build(&spec, worker_id, seed, partition)
            .map_err(|source| OrchestratorError::Worker { replicate, source })?;

        workers.spawn(async move { worker.run(rx, tx).await.map(|_| ()) });
        links.push(master_side);
    }

    let coordinator = MasterCoordinator::from_spec(&spec, seed)
        .map_err(|source| OrchestratorError::Setup { replicate, source })?;

    // Dropping `workers` on the error path aborts the ones still running.
    let outcome = Master::new(coordinator, links)
        .run()
        .await
        .map_err(|source| OrchestratorError::Run { replicate, source })?;

    while let Some(res) = workers.join_next().await {
        res.map_err(|e| OrchestratorError::Join(e.to_string()))?
            .map_err(|source| OrchestratorError::Worker { replicate, source })?;
    }

    info!(
        replicate = replicate,
        iterations = outcome.iterations,
        train_error = outcome.train_error,
        validation_error = outcome.validation_error;
        "replicate finished"
    );

    Ok(TrainedModel {
        replicate,
        topology: spec.topology.clone(),
        weights: outcome.weights,
        best_weights: outcome.best_weights,
        train_error: outcome.train_error,
        validation_error: outcome.validation_error,
        iterations: outcome.iterations,
    })
}
