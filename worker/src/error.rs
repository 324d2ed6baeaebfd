use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Ml(MlErr),
    UnexpectedMessage {
        iteration: u32,
        got: &'static str,
    },
    WeightsLengthMismatch {
        iteration: u32,
        got: usize,
        expected: usize,
    },
    /// The error or the gradient of an iteration is NaN or infinite.
    NonFinite {
        iteration: u32,
        what: &'static str,
    },
    /// The unit already failed, it never computes again.
    Failed,
    Join(String),
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Ml(e) => write!(f, "computation error: {e}"),
            WorkerErr::UnexpectedMessage { iteration, got } => {
                write!(f, "unexpected message at iteration {iteration}: got {got}")
            }
            WorkerErr::WeightsLengthMismatch {
                iteration,
                got,
                expected,
            } => write!(
                f,
                "weights length mismatch at iteration {iteration}: got {got}, expected {expected}"
            ),
            WorkerErr::NonFinite { iteration, what } => {
                write!(f, "non finite {what} at iteration {iteration}")
            }
            WorkerErr::Failed => write!(f, "the worker already failed"),
            WorkerErr::Join(detail) => write!(f, "compute task failed: {detail}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
