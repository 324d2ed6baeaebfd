use std::sync::Arc;

use log::info;
use machine_learning::model::TrainedModel;
use pipeline::{ColumnScore, ColumnStats, Supervisor};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use crate::{Result, configs::ModelConfig, ensemble::Ensemble};

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub stats: Vec<ColumnStats>,
    pub models: Vec<TrainedModel>,
    pub scores: Vec<ColumnScore>,
}

/// The resources of exactly one run. The runtime and every task spawned on it are released
/// when the context is dropped.
pub struct RunContext {
    runtime: Runtime,
    supervisor: Supervisor,
    ensemble: Arc<Ensemble>,
}

impl RunContext {
    /// Creates a new `RunContext`.
    ///
    /// # Errors
    /// An `OrchestratorError` if the configuration is invalid or the runtime can't be built.
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;

        let ModelConfig {
            training,
            data,
            pools,
        } = config;

        let ensemble = Ensemble::new(training);
        let supervisor = Supervisor::new(data, pools, ensemble.spec().seed)?;
        let runtime = Runtime::new()?;

        Ok(Self {
            runtime,
            supervisor,
            ensemble: Arc::new(ensemble),
        })
    }

    /// Runs the stats, training and scoring pipelines over `lines`, blocking until done.
    pub fn run(&self, lines: Vec<String>) -> Result<RunReport> {
        self.runtime.block_on(self.run_async(lines))
    }

    async fn run_async(&self, lines: Vec<String>) -> Result<RunReport> {
        info!(lines = lines.len(); "computing column stats");
        let stats = self.supervisor.run_stats(lines.clone()).await?;

        let bagging = self.ensemble.spec().bagging_count;
        info!(replicates = bagging.get(); "training the ensemble");
        let models = self
            .supervisor
            .run_training(lines.clone(), &stats, self.ensemble.clone(), bagging)
            .await?;

        info!(models = models.len(); "scoring with the ensemble");
        let scores = self
            .supervisor
            .run_post_train(lines, &stats, &models)
            .await?;

        Ok(RunReport {
            stats,
            models,
            scores,
        })
    }
}
