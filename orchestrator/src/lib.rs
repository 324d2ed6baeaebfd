//! Entry point of a training run: loads the configuration, owns the run's runtime and drives
//! the pipelines and the ensemble of bulk synchronous trainings.

pub mod configs;
pub mod ensemble;
pub mod error;
mod session;

pub use configs::ModelConfig;
pub use ensemble::Ensemble;
pub use error::{OrchestratorError, Result};
pub use session::{RunContext, RunReport};

/// Runs a whole training over `lines` with the given configuration.
///
/// # Errors
/// Returns an `OrchestratorError` if the configuration is invalid or any stage of the run
/// fails.
pub fn train(config: ModelConfig, lines: Vec<String>) -> Result<RunReport> {
    log::info!("creating run context");
    let context = RunContext::new(config)?;
    context.run(lines)
}
