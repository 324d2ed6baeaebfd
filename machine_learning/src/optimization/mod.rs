//! The weight update engine: turns the aggregated gradient of an iteration into the next
//! weights, following the configured propagation method.

mod calculator;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod manhattan;
mod optimizer;
mod resilient;

pub use calculator::WeightCalculator;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use manhattan::ManhattanPropagation;
pub use optimizer::{Optimizer, ZERO_TOLERANCE, sign};
pub use resilient::ResilientPropagation;
