use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use futures::future;
use log::{debug, info, warn};
use machine_learning::training::IterationResult;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{MasterCoordinator, MasterErr, Result, RunErr, TrainingOutcome};

/// The bulk synchronous server loop around a `MasterCoordinator`: every round it waits for one
/// report per worker, aggregates them and broadcasts the new weights.
pub struct Master<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    coordinator: MasterCoordinator,
    workers: Vec<(OnoReceiver<R>, OnoSender<W>)>,
}

impl<R, W> Master<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new `Master`.
    ///
    /// # Arguments
    /// * `coordinator` - The aggregation state machine.
    /// * `workers` - One channel per worker, the index is the worker's id.
    pub fn new(coordinator: MasterCoordinator, workers: Vec<(OnoReceiver<R>, OnoSender<W>)>) -> Self {
        Self {
            coordinator,
            workers,
        }
    }

    /// Runs the training until the termination policy fires.
    ///
    /// # Returns
    /// The final and best weights of the training.
    ///
    /// # Errors
    /// A `RunErr` holding the iteration the run was aborted at, a failure reported by any of
    /// the workers aborts the whole run.
    pub async fn run(mut self) -> std::result::Result<TrainingOutcome, RunErr> {
        let mut iteration = 0;

        match self.train(&mut iteration).await {
            Ok(()) => Ok(self.coordinator.into_outcome()),
            Err(source) => {
                warn!(iteration = iteration; "training aborted: {source}");
                Err(RunErr { iteration, source })
            }
        }
    }

    async fn train(&mut self, iteration: &mut u32) -> Result<()> {
        if self.workers.len() != self.coordinator.workers() {
            return Err(MasterErr::IncompleteResults {
                iteration: 0,
                got: self.workers.len(),
                expected: self.coordinator.workers(),
            });
        }

        let (mut state, _) = self.coordinator.run_iteration(&[])?;
        *iteration = state.iteration + 1;
        self.broadcast(&Msg::Control(Command::Start {
            iteration: *iteration,
        }))
        .await?;

        loop {
            let results = self.gather(*iteration).await?;

            let (next, terminate) = self.coordinator.run_iteration(&results)?;
            state = next;

            if terminate {
                info!(iterations = state.iteration; "training finished");
                self.broadcast(&Msg::Control(Command::Disconnect)).await?;
                return Ok(());
            }

            *iteration = state.iteration + 1;
            let msg = Msg::Data(Payload::Weights {
                iteration: *iteration,
                weights: &state.weights,
            });
            self.broadcast(&msg).await?;
        }
    }

    /// Sends `msg` to every worker concurrently.
    async fn broadcast(&mut self, msg: &Msg<'_>) -> Result<()> {
        let sends = self.workers.iter_mut().map(|(_, tx)| tx.send(msg));
        future::try_join_all(sends).await?;
        Ok(())
    }

    /// Waits for the report of `iteration` of every worker concurrently.
    async fn gather(&mut self, iteration: u32) -> Result<Vec<IterationResult>> {
        let receives = self
            .workers
            .iter_mut()
            .enumerate()
            .map(|(worker_id, (rx, _))| recv_report(worker_id, rx, iteration));

        future::try_join_all(receives).await
    }
}

/// Receives messages from a worker until its report of `iteration` arrives.
async fn recv_report<R>(worker_id: usize, rx: &mut OnoReceiver<R>, iteration: u32) -> Result<IterationResult>
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        match rx.recv().await? {
            Msg::Data(Payload::Report(report)) if report.iteration == iteration => {
                debug!(worker_id = worker_id, iteration = iteration; "received report");
                return Ok(report.into());
            }
            Msg::Data(Payload::Report(report)) => {
                warn!(
                    worker_id = worker_id,
                    iteration = iteration,
                    stale = report.iteration;
                    "ignoring stale report"
                );
            }
            Msg::Err(detail) => {
                return Err(MasterErr::WorkerComputeFailure {
                    worker_id,
                    iteration,
                    detail: detail.into_owned(),
                });
            }
            other => {
                return Err(MasterErr::UnexpectedMessage {
                    worker_id,
                    got: other.kind(),
                });
            }
        }
    }
}
