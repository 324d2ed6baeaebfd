use std::{collections::BTreeMap, num::NonZeroUsize, sync::Arc};

use log::{debug, info};
use machine_learning::dataset::{Dataset, Record};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::TrainJob;
use crate::{
    Batch, Normalizer, Result, Sampler, Stage,
    message::RawRecord,
    pool::forward,
};

/// Samples the records of a batch and turns them into training records.
pub struct NormalizeStage {
    sampler: Sampler,
    normalizer: Normalizer,
    next: mpsc::Sender<Batch<Record>>,
}

impl NormalizeStage {
    pub fn new(sampler: Sampler, normalizer: Normalizer, next: mpsc::Sender<Batch<Record>>) -> Self {
        Self {
            sampler,
            normalizer,
            next,
        }
    }
}

impl Stage for NormalizeStage {
    type Input = Batch<RawRecord>;

    fn name(&self) -> &'static str {
        "normalize"
    }

    async fn process(&self, batch: Batch<RawRecord>) -> Result<()> {
        let records = {
            let mut rng = self.sampler.rng(batch.seq);

            batch
                .items
                .iter()
                .filter_map(|record| Some((record, self.sampler.tag(record)?)))
                .filter(|&(_, tag)| self.sampler.keep(tag, &mut rng))
                .map(|(record, tag)| self.normalizer.normalize(record, tag))
                .collect()
        };

        forward(&self.next, self.name(), batch.map(records)).await
    }
}

#[derive(Debug, Default)]
struct Collected {
    received: usize,
    parts: BTreeMap<usize, Vec<Record>>,
}

/// Gathers the normalized batches into the training set and hands one job per bagging index
/// to the train pool once every batch arrived.
pub struct TrainDataStage {
    bagging: NonZeroUsize,
    collected: Mutex<Collected>,
    next: mpsc::Sender<TrainJob>,
}

impl TrainDataStage {
    pub fn new(bagging: NonZeroUsize, next: mpsc::Sender<TrainJob>) -> Self {
        Self {
            bagging,
            collected: Mutex::new(Collected::default()),
            next,
        }
    }
}

impl Stage for TrainDataStage {
    type Input = Batch<Record>;

    fn name(&self) -> &'static str {
        "train_data"
    }

    async fn process(&self, batch: Batch<Record>) -> Result<()> {
        let finished = {
            let mut collected = self.collected.lock();
            collected.received += 1;
            collected.parts.insert(batch.seq, batch.items);
            debug!(seq = batch.seq, received = collected.received; "train data part received");

            if collected.received == batch.total_msg_cnt {
                Some(std::mem::take(&mut collected.parts))
            } else {
                None
            }
        };

        let Some(parts) = finished else {
            return Ok(());
        };

        // Batches are joined in stream order so a seeded run always sees the same dataset.
        let dataset = Arc::new(Dataset::new(parts.into_values().flatten().collect()));
        info!(records = dataset.len(), bagging = self.bagging.get(); "training set ready");

        for replicate in 0..self.bagging.get() {
            let job = TrainJob {
                replicate,
                dataset: dataset.clone(),
            };

            forward(&self.next, self.name(), job).await?;
        }

        Ok(())
    }
}
