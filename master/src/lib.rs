mod coordinator;
mod error;
mod server;
mod termination;

pub use coordinator::{GlobalState, MasterCoordinator, TrainingOutcome};
pub use error::{MasterErr, Result, RunErr};
pub use server::Master;
pub use termination::{Progress, TerminationPolicy};
