pub mod activations;
pub mod layers;
pub mod loss;
mod sequential;
mod topology;

pub use sequential::Sequential;
pub use topology::Topology;
