use std::{num::NonZeroUsize, sync::Arc};

use comms::specs::pipeline::{DataSpec, PoolSpec};
use log::{debug, info, warn};
use machine_learning::model::TrainedModel;
use tokio::{sync::mpsc, task::JoinSet};

use crate::{
    Batch, ColumnRouter, ColumnScore, ColumnStats, KeyedPool, Normalizer, Parser, PipelineErr,
    Result, Sampler, WorkerPool,
    message::{Event, RawRecord},
    pool::forward,
    stages::{
        ColumnPrepareStage, ColumnStatsStage, LoadStage, NormalizeStage, ScoreAggregateStage,
        ScoreStage, TrainDataStage, TrainStage, Trainer,
    },
};

/// Wires the stage pools of a pipeline, feeds them and waits for the terminal stages.
///
/// Every run builds its own pools and drops them when it returns, nothing outlives a run.
#[derive(Debug, Clone)]
pub struct Supervisor {
    data: DataSpec,
    pools: PoolSpec,
    seed: Option<u64>,
    candidates: Vec<usize>,
}

impl Supervisor {
    /// Creates a new `Supervisor`.
    ///
    /// # Arguments
    /// * `data` - The layout of the raw lines.
    /// * `pools` - The concurrency degree of the stages.
    /// * `seed` - Makes sampling reproducible, OS entropy is used when absent.
    ///
    /// # Errors
    /// `PipelineErr::InvalidConfig` if the data layout is inconsistent.
    pub fn new(data: DataSpec, pools: PoolSpec, seed: Option<u64>) -> Result<Self> {
        let fields = data.columns.len();
        let invalid = |detail: String| Err(PipelineErr::InvalidConfig(detail));

        if data.target_column >= fields {
            return invalid(format!("target column {} out of {fields}", data.target_column));
        }

        if let Some(weight) = data.weight_column
            && (weight >= fields || weight == data.target_column)
        {
            return invalid(format!("invalid weight column {weight}"));
        }

        if data.pos_tags.is_empty() || data.neg_tags.is_empty() {
            return invalid("both positive and negative tags are needed".into());
        }

        if !(data.sample_rate > 0. && data.sample_rate <= 1.) {
            return invalid(format!("sample rate {} out of (0, 1]", data.sample_rate));
        }

        if !(data.std_dev_cutoff > 0.) {
            return invalid(format!("std dev cutoff {} must be positive", data.std_dev_cutoff));
        }

        let candidates = data.candidates();
        if candidates.is_empty() {
            return invalid("no candidate columns".into());
        }

        if let Some(&column) = candidates
            .iter()
            .find(|&&c| c >= fields || c == data.target_column)
        {
            return invalid(format!("invalid candidate column {column}"));
        }

        if let Some(column) = data.repeated_candidate() {
            return invalid(format!("candidate column {column} is repeated"));
        }

        Ok(Self {
            data,
            pools,
            seed,
            candidates,
        })
    }

    /// The columns fed to the models, in the order of their inputs.
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Computes the statistics of every candidate column.
    ///
    /// # Returns
    /// One `ColumnStats` per candidate column, sorted by column.
    pub async fn run_stats(&self, lines: Vec<String>) -> Result<Vec<ColumnStats>> {
        let (events_tx, events) = mpsc::unbounded_channel();
        let capacity = self.pools.queue_capacity;

        let router = Arc::new(ColumnRouter::new(
            &self.candidates,
            self.pools.column_workers.get(),
        ));
        let columns = router.columns().count();

        let stats = ColumnStatsStage::new(&self.data, events_tx.clone());
        let mut stats_pool = KeyedPool::spawn(Arc::new(stats), router, capacity, events_tx.clone());

        let prepare = ColumnPrepareStage::new(self.sampler(), stats_pool.sink());
        let mut prepare_pool = WorkerPool::spawn(
            Arc::new(prepare),
            self.pools.load_workers,
            capacity,
            events_tx.clone(),
        );

        let (mut load_pool, mut feeder) = self.start(lines, prepare_pool.sender(), events_tx);

        let result = collect(events, columns, |event| match event {
            Event::Stats(stats) => Some(stats),
            _ => None,
        })
        .await;

        if result.is_err() {
            feeder.abort_all();
            load_pool.abort();
            prepare_pool.abort();
            stats_pool.abort();
        }

        let mut stats = result?;
        stats.sort_by_key(|s| s.column);
        info!(columns = stats.len(); "column stats computed");

        Ok(stats)
    }

    /// Trains `bagging` replicates out of the normalized and sampled lines.
    ///
    /// # Returns
    /// The trained models, sorted by replicate.
    pub async fn run_training<T: Trainer>(
        &self,
        lines: Vec<String>,
        stats: &[ColumnStats],
        trainer: Arc<T>,
        bagging: NonZeroUsize,
    ) -> Result<Vec<TrainedModel>> {
        let normalizer = Normalizer::new(&self.data, stats)?;
        let (events_tx, events) = mpsc::unbounded_channel();
        let capacity = self.pools.queue_capacity;

        let train = TrainStage::new(trainer, events_tx.clone());
        let mut train_pool = WorkerPool::spawn(Arc::new(train), bagging, capacity, events_tx.clone());

        let data = TrainDataStage::new(bagging, train_pool.sender());
        let mut data_pool = WorkerPool::spawn(
            Arc::new(data),
            NonZeroUsize::MIN,
            capacity,
            events_tx.clone(),
        );

        let normalize = NormalizeStage::new(self.sampler(), normalizer, data_pool.sender());
        let mut normalize_pool = WorkerPool::spawn(
            Arc::new(normalize),
            self.pools.load_workers,
            capacity,
            events_tx.clone(),
        );

        let (mut load_pool, mut feeder) = self.start(lines, normalize_pool.sender(), events_tx);

        let result = collect(events, bagging.get(), |event| match event {
            Event::Trained(model) => Some(model),
            _ => None,
        })
        .await;

        if result.is_err() {
            feeder.abort_all();
            load_pool.abort();
            normalize_pool.abort();
            data_pool.abort();
            train_pool.abort();
        }

        let mut models = result?;
        models.sort_by_key(|m| m.replicate);

        Ok(models)
    }

    /// Scores every line with the ensemble and bins the scores by raw value per candidate
    /// column.
    pub async fn run_post_train(
        &self,
        lines: Vec<String>,
        stats: &[ColumnStats],
        models: &[TrainedModel],
    ) -> Result<Vec<ColumnScore>> {
        let normalizer = Normalizer::new(&self.data, stats)?;
        let (events_tx, events) = mpsc::unbounded_channel();
        let capacity = self.pools.queue_capacity;

        let router = Arc::new(ColumnRouter::new(
            &self.candidates,
            self.pools.column_workers.get(),
        ));
        let columns = router.columns().count();

        let aggregate = ScoreAggregateStage::new(&self.data, events_tx.clone());
        let mut aggregate_pool =
            KeyedPool::spawn(Arc::new(aggregate), router, capacity, events_tx.clone());

        let score = ScoreStage::new(normalizer, models, aggregate_pool.sink())?;
        let mut score_pool = WorkerPool::spawn(
            Arc::new(score),
            self.pools.load_workers,
            capacity,
            events_tx.clone(),
        );

        let (mut load_pool, mut feeder) = self.start(lines, score_pool.sender(), events_tx);

        let result = collect(events, columns, |event| match event {
            Event::Scored(score) => Some(score),
            _ => None,
        })
        .await;

        if result.is_err() {
            feeder.abort_all();
            load_pool.abort();
            score_pool.abort();
            aggregate_pool.abort();
        }

        let mut scores = result?;
        scores.sort_by_key(|s| s.column);

        Ok(scores)
    }

    fn sampler(&self) -> Sampler {
        Sampler::new(&self.data, self.seed)
    }

    /// Spawns the load pool in front of `next` and the task feeding it `lines`.
    ///
    /// Takes the last events sender so the channel closes once every stage is gone.
    fn start(
        &self,
        lines: Vec<String>,
        next: mpsc::Sender<Batch<RawRecord>>,
        events: mpsc::UnboundedSender<Event>,
    ) -> (WorkerPool<LoadStage>, JoinSet<Result<()>>) {
        let load = LoadStage::new(Parser::new(&self.data), next);
        let load_pool = WorkerPool::spawn(
            Arc::new(load),
            self.pools.load_workers,
            self.pools.queue_capacity,
            events,
        );

        let mut feeder = JoinSet::new();
        feeder.spawn(feed(lines, self.pools.batch_size, load_pool.sender()));

        (load_pool, feeder)
    }
}

/// Splits `lines` in batches. At least one batch is sent, empty if there are no lines.
async fn feed(
    lines: Vec<String>,
    batch_size: NonZeroUsize,
    tx: mpsc::Sender<Batch<String>>,
) -> Result<()> {
    let total = lines.len().div_ceil(batch_size.get()).max(1);
    let mut lines = lines.into_iter();

    for seq in 0..total {
        let items = lines.by_ref().take(batch_size.get()).collect();
        forward(&tx, "feed", Batch::new(seq, total, items)).await?;
    }

    debug!(batches = total; "every line was fed");
    Ok(())
}

/// Waits for `expected` terminal events, the first failure halts the wait.
async fn collect<T>(
    mut events: mpsc::UnboundedReceiver<Event>,
    expected: usize,
    mut select: impl FnMut(Event) -> Option<T>,
) -> Result<Vec<T>> {
    let mut collected = Vec::with_capacity(expected);

    while collected.len() < expected {
        let Some(event) = events.recv().await else {
            return Err(PipelineErr::Closed { stage: "supervisor" });
        };

        if let Event::Failed(e) = event {
            return Err(e);
        }

        let kind = event.kind();
        match select(event) {
            Some(value) => collected.push(value),
            None => warn!(kind = kind; "ignoring unexpected pipeline event"),
        }
    }

    Ok(collected)
}
