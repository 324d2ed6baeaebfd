use std::borrow::Cow;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info, warn};
use machine_learning::initialization::initial_weights;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task,
};

use crate::{Result, WorkerErr, WorkerUnit};

/// Infrastructure worker runtime, answers every weights broadcast of the master with the
/// unit's partial result.
///
/// The computation is CPU bound and runs on Tokio's blocking pool via `spawn_blocking`.
pub struct Worker {
    seed: u64,
    unit: WorkerUnit,
    weights: Vec<f32>,
}

impl Worker {
    /// Creates a new `Worker`.
    ///
    /// # Args
    /// * `seed` - The seed the initial weights are derived from.
    /// * `unit` - The synchronous core of the worker.
    pub fn new(seed: u64, unit: WorkerUnit) -> Self {
        Self {
            seed,
            unit,
            weights: Vec::new(),
        }
    }

    /// Runs the protocol loop with the master until it disconnects.
    ///
    /// # Args
    /// * `rx` - Receiving end of the master channel.
    /// * `tx` - Sending end of the master channel.
    ///
    /// # Returns
    /// The unit back on graceful completion.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failures, protocol violations or computation failures, the
    /// latter are reported to the master before returning.
    pub async fn run<R, W>(self, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> Result<WorkerUnit>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let Self {
            seed,
            mut unit,
            mut weights,
        } = self;

        let worker_id = unit.worker_id();
        let mut last_iteration = 0;

        loop {
            let iteration = match rx.recv().await? {
                Msg::Control(Command::Start { iteration }) => {
                    debug!(worker_id = worker_id, iteration = iteration; "deriving initial weights");
                    weights = initial_weights(unit.topology(), seed)?;
                    iteration
                }
                Msg::Data(Payload::Weights {
                    iteration,
                    weights: received,
                }) => {
                    debug!(worker_id = worker_id, iteration = iteration; "received weights");
                    weights.clear();
                    weights.extend_from_slice(received);
                    iteration
                }
                Msg::Control(Command::Disconnect) => {
                    info!(worker_id = worker_id; "disconnect received from master");
                    return Ok(unit);
                }
                other => {
                    warn!(worker_id = worker_id; "unexpected message from master: {}", other.kind());
                    return Err(WorkerErr::UnexpectedMessage {
                        iteration: last_iteration,
                        got: other.kind(),
                    });
                }
            };

            last_iteration = iteration;

            // Move the unit and the buffer to satisfy `'static` for spawn_blocking, without copying.
            let (unit_back, weights_back, result) = task::spawn_blocking(move || {
                let result = unit.compute_iteration(iteration, &weights);
                (unit, weights, result)
            })
            .await
            .map_err(|e| WorkerErr::Join(e.to_string()))?;

            unit = unit_back;
            weights = weights_back;

            match result {
                Ok(result) => {
                    let msg = Msg::Data(Payload::Report(result.as_report()));
                    tx.send(&msg).await?;
                }
                Err(e) => {
                    let msg = Msg::Err(Cow::Owned(e.to_string()));
                    tx.send(&msg).await?;
                    return Err(e);
                }
            }
        }
    }
}
