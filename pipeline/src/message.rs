use machine_learning::model::TrainedModel;
use serde::{Deserialize, Serialize};

use crate::PipelineErr;

/// A unit of work flowing between stages.
///
/// `total_msg_cnt` is the amount of batches the producers of the logical batch emit in
/// total, so the consumer can tell when every part arrived. A batch may have no items, it
/// still counts as one part.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub seq: usize,
    pub total_msg_cnt: usize,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(seq: usize, total_msg_cnt: usize, items: Vec<T>) -> Self {
        Self {
            seq,
            total_msg_cnt,
            items,
        }
    }

    /// A batch with the same position in the stream carrying other items.
    pub fn map<U>(&self, items: Vec<U>) -> Batch<U> {
        Batch::new(self.seq, self.total_msg_cnt, items)
    }
}

/// The fields of a raw line.
pub type RawRecord = Vec<String>;

/// Part of a single column, already parsed. `None` marks a missing or unparsable value.
pub type ColumnPart = Batch<Option<f64>>;

/// Raw column values along with the score the ensemble gave to their records.
pub type ScorePart = Batch<(String, f32)>;

/// Summary statistics of a candidate column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub column: usize,
    pub name: String,
    pub count: u64,
    pub missing: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// The mean ensemble score of the records holding one raw value of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBin {
    pub value: String,
    pub count: u64,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScore {
    pub column: usize,
    pub name: String,
    pub bins: Vec<ScoreBin>,
}

/// What the terminal stages report back to the supervisor.
#[derive(Debug)]
pub enum Event {
    Stats(ColumnStats),
    Trained(TrainedModel),
    Scored(ColumnScore),
    Failed(PipelineErr),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Stats(_) => "stats",
            Event::Trained(_) => "trained",
            Event::Scored(_) => "scored",
            Event::Failed(_) => "failed",
        }
    }
}
