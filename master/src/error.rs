use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The master module's result type.
pub type Result<T> = std::result::Result<T, MasterErr>;

/// Failures of a single aggregation round or of the protocol around it.
#[derive(Debug)]
pub enum MasterErr {
    NoWorkerResults,
    IncompleteResults {
        iteration: u32,
        got: usize,
        expected: usize,
    },
    WorkerComputeFailure {
        worker_id: usize,
        iteration: u32,
        detail: String,
    },
    UnexpectedMessage {
        worker_id: usize,
        got: &'static str,
    },
    Ml(MlErr),
    Io(io::Error),
}

impl fmt::Display for MasterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterErr::NoWorkerResults => write!(f, "no worker results to aggregate"),
            MasterErr::IncompleteResults {
                iteration,
                got,
                expected,
            } => write!(
                f,
                "incomplete results for iteration {iteration}: got {got}, expected {expected}"
            ),
            MasterErr::WorkerComputeFailure {
                worker_id,
                iteration,
                detail,
            } => write!(
                f,
                "worker {worker_id} failed at iteration {iteration}: {detail}"
            ),
            MasterErr::UnexpectedMessage { worker_id, got } => {
                write!(f, "unexpected message from worker {worker_id}: got {got}")
            }
            MasterErr::Ml(e) => write!(f, "weight update failed: {e}"),
            MasterErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MasterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MasterErr::Ml(e) => Some(e),
            MasterErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for MasterErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<io::Error> for MasterErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// An aborted training run, along with the iteration it was at.
#[derive(Debug)]
pub struct RunErr {
    pub iteration: u32,
    pub source: MasterErr,
}

impl fmt::Display for RunErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run aborted at iteration {}: {}", self.iteration, self.source)
    }
}

impl Error for RunErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
