pub mod builder;
pub mod config;
pub mod error;
pub mod unit;
pub mod worker;

pub use builder::WorkerBuilder;
pub use config::WorkerConfig;
pub use error::{Result, WorkerErr};
pub use unit::{WorkerState, WorkerUnit};
pub use worker::Worker;
