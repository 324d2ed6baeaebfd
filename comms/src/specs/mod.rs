pub mod machine_learning;
pub mod pipeline;
pub mod training;
