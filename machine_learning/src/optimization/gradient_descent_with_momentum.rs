use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Backpropagation with a velocity term, used for both back propagation with momentum and
/// quick propagation.
///
/// Every step the velocity of a weight decays by `momentum` and takes the new gradient, the
/// weight then moves `learning_rate` times the velocity against it.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Vec<f32>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` with every velocity at rest.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters it updates.
    /// * `learning_rate` - Scales every step.
    /// * `momentum` - The fraction of the previous velocity kept on every step.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len],
        }
    }

    pub fn velocity(&self) -> &[f32] {
        &self.velocity
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params, grad, self.velocity.len())?;
        let Self {
            learning_rate,
            momentum,
            velocity,
        } = self;

        for ((w, &g), v) in params.iter_mut().zip(grad).zip(velocity.iter_mut()) {
            *v = *momentum * *v + g;
            *w -= *learning_rate * *v;
        }

        Ok(())
    }
}
