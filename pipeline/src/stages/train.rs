use std::{error::Error, sync::Arc};

use log::info;
use machine_learning::{dataset::Dataset, model::TrainedModel};
use tokio::sync::mpsc;

use crate::{PipelineErr, Result, Stage, message::Event};

/// The error a `Trainer` fails with, kept opaque so any training backend fits.
pub type TrainErr = Box<dyn Error + Send + Sync>;

/// Trains one replicate of the ensemble out of the training set.
#[allow(unused)]
#[trait_variant::make(Trainer: Send)]
pub trait LocalTrainer: Sync + 'static {
    async fn train(
        &self,
        replicate: usize,
        dataset: Arc<Dataset>,
    ) -> std::result::Result<TrainedModel, TrainErr>;
}

/// A single replicate to train.
#[derive(Debug, Clone)]
pub struct TrainJob {
    pub replicate: usize,
    pub dataset: Arc<Dataset>,
}

pub struct TrainStage<T: Trainer> {
    trainer: Arc<T>,
    events: mpsc::UnboundedSender<Event>,
}

impl<T: Trainer> TrainStage<T> {
    pub fn new(trainer: Arc<T>, events: mpsc::UnboundedSender<Event>) -> Self {
        Self { trainer, events }
    }
}

impl<T: Trainer> Stage for TrainStage<T> {
    type Input = TrainJob;

    fn name(&self) -> &'static str {
        "train"
    }

    async fn process(&self, job: TrainJob) -> Result<()> {
        let model = self
            .trainer
            .train(job.replicate, job.dataset)
            .await
            .map_err(|e| PipelineErr::StageFailure {
                stage: self.name(),
                detail: format!("replicate {}: {e}", job.replicate),
            })?;

        info!(
            replicate = model.replicate,
            iterations = model.iterations,
            validation_error = model.validation_error;
            "replicate trained"
        );

        self.events
            .send(Event::Trained(model))
            .map_err(|_| PipelineErr::Closed { stage: self.name() })
    }
}
