use super::{
    Optimizer,
    optimizer::{check_sizes, sign},
};
use crate::Result;

pub const INITIAL_UPDATE: f32 = 0.1;
pub const POSITIVE_ETA: f32 = 1.2;
pub const NEGATIVE_ETA: f32 = 0.5;
pub const DELTA_MIN: f32 = 1e-6;
pub const MAX_STEP: f32 = 50.;

/// Resilient propagation: every weight keeps its own step size, which grows while the sign of
/// its gradient holds and shrinks when it flips. The learning rate is not used.
#[derive(Debug)]
pub struct ResilientPropagation {
    update_values: Box<[f32]>,
    last_grad: Box<[f32]>,
    last_change: Box<[f32]>,
}

impl ResilientPropagation {
    /// Creates a new `ResilientPropagation` optimizer holding the state of `len` weights.
    pub fn new(len: usize) -> Self {
        Self {
            update_values: vec![INITIAL_UPDATE; len].into_boxed_slice(),
            last_grad: vec![0.; len].into_boxed_slice(),
            last_change: vec![0.; len].into_boxed_slice(),
        }
    }

    fn weight_change(&mut self, i: usize, g: f32) -> f32 {
        let change = sign(g * self.last_grad[i]);

        let weight_change = if change > 0. {
            let delta = (self.update_values[i] * POSITIVE_ETA).min(MAX_STEP);
            self.update_values[i] = delta;
            self.last_grad[i] = g;
            -sign(g) * delta
        } else if change < 0. {
            // Overshot the minimum: undo the last step and skip the next adaptation.
            self.update_values[i] = (self.update_values[i] * NEGATIVE_ETA).max(DELTA_MIN);
            self.last_grad[i] = 0.;
            -self.last_change[i]
        } else {
            self.last_grad[i] = g;
            -sign(g) * self.update_values[i]
        };

        self.last_change[i] = weight_change;
        weight_change
    }
}

impl Optimizer for ResilientPropagation {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params, grad, self.update_values.len())?;

        for (i, (w, &g)) in params.iter_mut().zip(grad).enumerate() {
            *w += self.weight_change(i, g);
        }

        Ok(())
    }
}
