mod model;
mod training;

pub use model::ModelConfig;
pub use training::validate_training;
