//! Stage based fan-out/fan-in data pipeline feeding the training core and consuming its
//! output.

mod error;
mod message;
mod pool;
mod records;
mod router;
mod stages;
mod supervisor;

pub use error::{PipelineErr, Result};
pub use message::{Batch, ColumnScore, ColumnStats, ScoreBin};
pub use pool::{KeyedPool, LocalStage, Stage, WorkerPool};
pub use records::{Normalizer, Parser, Sampler};
pub use router::ColumnRouter;
pub use stages::{LocalTrainer, TrainErr, Trainer};
pub use supervisor::Supervisor;
