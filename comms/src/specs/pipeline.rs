use std::{collections::BTreeSet, num::NonZeroUsize};

use serde::{Deserialize, Serialize};

/// The layout of the raw data files and how their columns become training records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Column names, in file order. Every line must have exactly this many fields.
    pub columns: Vec<String>,
    pub target_column: usize,
    /// Raw target values of positive records.
    pub pos_tags: Vec<String>,
    /// Raw target values of negative records.
    pub neg_tags: Vec<String>,
    /// A numeric column used as the significance of each record.
    #[serde(default)]
    pub weight_column: Option<usize>,
    /// The columns fed to the model, every column but the target and weight ones by default.
    #[serde(default)]
    pub candidate_columns: Option<Vec<usize>>,
    #[serde(default = "default_rate")]
    pub sample_rate: f32,
    /// Only negative records are sampled, positive ones are always kept.
    #[serde(default)]
    pub sample_neg_only: bool,
    /// Normalized values are clamped to this many standard deviations.
    #[serde(default = "default_cutoff")]
    pub std_dev_cutoff: f32,
}

impl DataSpec {
    /// The resolved list of candidate columns.
    pub fn candidates(&self) -> Vec<usize> {
        match &self.candidate_columns {
            Some(columns) => columns.clone(),
            None => (0..self.columns.len())
                .filter(|&i| i != self.target_column && Some(i) != self.weight_column)
                .collect(),
        }
    }

    /// The first candidate column listed more than once, if any.
    pub fn repeated_candidate(&self) -> Option<usize> {
        let mut seen = BTreeSet::new();
        self.candidates().into_iter().find(|&c| !seen.insert(c))
    }
}

/// The concurrency degree of every pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    #[serde(default = "default_load_workers")]
    pub load_workers: NonZeroUsize,
    #[serde(default = "default_column_workers")]
    pub column_workers: NonZeroUsize,
    /// Lines per raw batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    /// Messages a stage queue holds before producers wait.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: NonZeroUsize,
}

impl Default for PoolSpec {
    fn default() -> Self {
        Self {
            load_workers: default_load_workers(),
            column_workers: default_column_workers(),
            batch_size: default_batch_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_delimiter() -> char {
    '|'
}

fn default_rate() -> f32 {
    1.0
}

fn default_cutoff() -> f32 {
    4.0
}

fn default_load_workers() -> NonZeroUsize {
    NonZeroUsize::new(16).unwrap_or(NonZeroUsize::MIN)
}

fn default_column_workers() -> NonZeroUsize {
    NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN)
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN)
}

fn default_queue_capacity() -> NonZeroUsize {
    NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN)
}
