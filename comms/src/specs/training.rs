use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use super::machine_learning::{LossSpec, PropagationSpec, TopologySpec};

/// When a training run should stop besides the iteration cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSpec {
    #[default]
    MaxIterations,
    /// Stops once the validation error hasn't improved by `min_delta` for `patience` iterations.
    Plateau { patience: NonZeroUsize, min_delta: f32 },
}

/// The immutable configuration of a training run, shared by the master, the workers
/// and the ensemble driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSpec {
    pub topology: TopologySpec,
    pub learning_rate: f32,
    #[serde(default)]
    pub propagation: PropagationSpec,
    pub max_iterations: NonZeroUsize,
    pub bagging_count: NonZeroUsize,
    pub sample_rate: f32,
    pub cross_validation_rate: f32,
    #[serde(default = "default_true")]
    pub bagging_with_replacement: bool,
    #[serde(default = "default_workers")]
    pub workers_per_replicate: NonZeroUsize,
    #[serde(default)]
    pub loss: LossSpec,
    #[serde(default)]
    pub termination: TerminationSpec,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> NonZeroUsize {
    NonZeroUsize::MIN
}
