mod columns;
mod load;
mod normalize;
mod score;
mod train;

pub(crate) use columns::{ColumnPrepareStage, ColumnStatsStage};
pub(crate) use load::LoadStage;
pub(crate) use normalize::{NormalizeStage, TrainDataStage};
pub(crate) use score::{ScoreAggregateStage, ScoreStage};
pub(crate) use train::{TrainJob, TrainStage};
pub use train::{LocalTrainer, TrainErr, Trainer};
