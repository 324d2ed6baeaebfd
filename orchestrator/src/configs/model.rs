use std::{fs::File, io::BufReader, path::Path};

use comms::specs::{
    pipeline::{DataSpec, PoolSpec},
    training::TrainingSpec,
};
use serde::{Deserialize, Serialize};

use super::validate_training;
use crate::{OrchestratorError, Result};

/// Everything a run needs: how to train, how to read the data and how parallel the pipeline
/// stages are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub training: TrainingSpec,
    pub data: DataSpec,
    #[serde(default)]
    pub pools: PoolSpec,
}

impl ModelConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the training spec, that no candidate column repeats and that the network takes
    /// one input per candidate column.
    ///
    /// # Errors
    /// `OrchestratorError::InvalidConfig` describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        validate_training(&self.training)?;

        if let Some(column) = self.data.repeated_candidate() {
            return Err(OrchestratorError::InvalidConfig(format!(
                "candidate column {column} is listed more than once"
            )));
        }

        let candidates = self.data.candidates().len();
        if self.training.topology.inputs != candidates {
            return Err(OrchestratorError::InvalidConfig(format!(
                "the network takes {} inputs but there are {candidates} candidate columns",
                self.training.topology.inputs
            )));
        }

        Ok(())
    }
}
