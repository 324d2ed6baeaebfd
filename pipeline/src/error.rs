use std::{error::Error, fmt};

use machine_learning::MlErr;

/// The pipeline module's result type.
pub type Result<T> = std::result::Result<T, PipelineErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineErr {
    /// A stage worker failed, the whole pipeline is halted.
    StageFailure { stage: &'static str, detail: String },
    /// A stage's downstream queue was closed before the pipeline completed.
    Closed { stage: &'static str },
    InvalidConfig(String),
    Ml(MlErr),
}

impl fmt::Display for PipelineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineErr::StageFailure { stage, detail } => {
                write!(f, "stage {stage} failed: {detail}")
            }
            PipelineErr::Closed { stage } => write!(f, "downstream of stage {stage} is closed"),
            PipelineErr::InvalidConfig(detail) => write!(f, "invalid pipeline config: {detail}"),
            PipelineErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for PipelineErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for PipelineErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}
