pub mod arch;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod model;
pub mod optimization;
pub mod training;

pub use error::{MlErr, Result};
