use std::{num::NonZeroUsize, sync::Arc};

use log::{debug, error};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};

use crate::{ColumnRouter, PipelineErr, Result, message::Event};

/// A step of the pipeline: consumes its input and pushes its output to the single downstream
/// queue it knows about.
#[allow(unused)]
#[trait_variant::make(Stage: Send)]
pub trait LocalStage: Sync + 'static {
    type Input: Send + 'static;

    /// The stage's name, for logs and errors.
    fn name(&self) -> &'static str;

    /// Processes one input message.
    ///
    /// # Returns
    /// An error halts the whole pipeline.
    async fn process(&self, input: Self::Input) -> Result<()>;
}

/// Turns a stage error into the failure the supervisor receives.
fn report_failure(events: &mpsc::UnboundedSender<Event>, stage: &'static str, e: PipelineErr) {
    error!(stage = stage; "stage failed: {e}");

    let failure = match e {
        e @ PipelineErr::StageFailure { .. } => e,
        e => PipelineErr::StageFailure {
            stage,
            detail: e.to_string(),
        },
    };

    // The supervisor may already be gone, nothing is left to halt then.
    let _ = events.send(Event::Failed(failure));
}

/// A fixed amount of tasks pulling from a single bounded queue.
///
/// Dropping the pool aborts its tasks.
pub struct WorkerPool<S: Stage> {
    tx: mpsc::Sender<S::Input>,
    tasks: JoinSet<()>,
}

impl<S: Stage> WorkerPool<S> {
    /// Spawns `size` tasks running `stage`.
    ///
    /// # Arguments
    /// * `stage` - The stage every task runs.
    /// * `size` - The concurrency degree.
    /// * `capacity` - The amount of messages the queue holds before senders wait.
    /// * `events` - Where failures are reported.
    pub fn spawn(
        stage: Arc<S>,
        size: NonZeroUsize,
        capacity: NonZeroUsize,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.get());
        let rx = Arc::new(Mutex::new(rx));
        let mut tasks = JoinSet::new();

        for id in 0..size.get() {
            let stage = stage.clone();
            let rx = rx.clone();
            let events = events.clone();

            tasks.spawn(async move {
                loop {
                    let Some(input) = rx.lock().await.recv().await else {
                        break;
                    };

                    if let Err(e) = stage.process(input).await {
                        report_failure(&events, stage.name(), e);
                        break;
                    }
                }

                debug!(stage = stage.name(), worker = id; "stage worker finished");
            });
        }

        Self { tx, tasks }
    }

    /// A new handle to the pool's queue.
    pub fn sender(&self) -> mpsc::Sender<S::Input> {
        self.tx.clone()
    }

    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }
}

/// A queue per task, inputs are routed by column so a column is always processed by the same
/// task.
pub struct KeyedPool<S: Stage> {
    senders: Vec<mpsc::Sender<S::Input>>,
    router: Arc<ColumnRouter>,
    tasks: JoinSet<()>,
}

impl<S: Stage> KeyedPool<S> {
    /// Spawns one task per worker of `router`.
    pub fn spawn(
        stage: Arc<S>,
        router: Arc<ColumnRouter>,
        capacity: NonZeroUsize,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let mut senders = Vec::with_capacity(router.workers());
        let mut tasks = JoinSet::new();

        for id in 0..router.workers() {
            let (tx, mut rx) = mpsc::channel(capacity.get());
            let stage = stage.clone();
            let events = events.clone();

            tasks.spawn(async move {
                while let Some(input) = rx.recv().await {
                    if let Err(e) = stage.process(input).await {
                        report_failure(&events, stage.name(), e);
                        break;
                    }
                }

                debug!(stage = stage.name(), worker = id; "keyed worker finished");
            });

            senders.push(tx);
        }

        Self {
            senders,
            router,
            tasks,
        }
    }

    /// A handle that routes inputs to the pool's tasks.
    pub fn sink(&self) -> ColumnSink<S::Input> {
        ColumnSink {
            senders: self.senders.clone(),
            router: self.router.clone(),
        }
    }

    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }
}

/// The sending side of a `KeyedPool`.
pub struct ColumnSink<T> {
    senders: Vec<mpsc::Sender<T>>,
    router: Arc<ColumnRouter>,
}

impl<T> Clone for ColumnSink<T> {
    fn clone(&self) -> Self {
        Self {
            senders: self.senders.clone(),
            router: self.router.clone(),
        }
    }
}

impl<T> ColumnSink<T> {
    pub fn router(&self) -> &ColumnRouter {
        &self.router
    }

    /// Sends `input` to the task that owns `column`.
    pub async fn send(&self, stage: &'static str, column: usize, input: T) -> Result<()> {
        let sender = self
            .router
            .route(column)
            .and_then(|worker| self.senders.get(worker))
            .ok_or_else(|| PipelineErr::InvalidConfig(format!("column {column} has no route")))?;

        sender
            .send(input)
            .await
            .map_err(|_| PipelineErr::Closed { stage })
    }
}

/// Sends to a plain downstream queue.
pub(crate) async fn forward<T>(tx: &mpsc::Sender<T>, stage: &'static str, input: T) -> Result<()> {
    tx.send(input).await.map_err(|_| PipelineErr::Closed { stage })
}
