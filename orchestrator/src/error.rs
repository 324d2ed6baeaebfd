use std::{error::Error, fmt, io};

use machine_learning::MlErr;
use master::{MasterErr, RunErr};
use pipeline::PipelineErr;
use worker::WorkerErr;

/// The orchestrator module's result type.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before anything runs.
    InvalidConfig(String),
    /// The configuration file isn't valid JSON for a `ModelConfig`.
    Parse(serde_json::Error),
    Io(io::Error),
    Ml(MlErr),
    /// A replicate couldn't be set up.
    Setup { replicate: usize, source: MasterErr },
    /// A replicate's training was aborted.
    Run { replicate: usize, source: RunErr },
    /// A worker of a replicate failed after its master finished.
    Worker {
        replicate: usize,
        source: WorkerErr,
    },
    Pipeline(PipelineErr),
    /// A spawned task panicked or was cancelled.
    Join(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Parse(e) => write!(f, "malformed config: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Ml(e) => write!(f, "{e}"),
            Self::Setup { replicate, source } => {
                write!(f, "replicate {replicate} setup failed: {source}")
            }
            Self::Run { replicate, source } => write!(f, "replicate {replicate}: {source}"),
            Self::Worker { replicate, source } => {
                write!(f, "replicate {replicate} worker error: {source}")
            }
            Self::Pipeline(e) => write!(f, "pipeline error: {e}"),
            Self::Join(msg) => write!(f, "task failed: {msg}"),
        }
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Ml(e) => Some(e),
            Self::Setup { source, .. } => Some(source),
            Self::Run { source, .. } => Some(source),
            Self::Worker { source, .. } => Some(source),
            Self::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<PipelineErr> for OrchestratorError {
    fn from(e: PipelineErr) -> Self {
        Self::Pipeline(e)
    }
}
