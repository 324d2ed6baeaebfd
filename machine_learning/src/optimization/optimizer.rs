use crate::{MlErr, Result};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer: Send {
    /// Updates the parameters in place, stepping against the gradient.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient used for taking the step.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `params` and `grad`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;
}

pub(super) fn check_sizes(params: &[f32], grad: &[f32], expected: usize) -> Result<()> {
    for (what, got) in [("gradient", grad.len()), ("weights", params.len())] {
        if got != expected {
            return Err(MlErr::DimensionMismatch {
                what,
                got,
                expected,
            });
        }
    }

    Ok(())
}

/// Gradient values closer to zero than this are treated as zero.
pub const ZERO_TOLERANCE: f32 = 1e-13;

/// The sign of `x` as `-1`, `0` or `1`, with a tolerance around zero.
pub fn sign(x: f32) -> f32 {
    if x.abs() < ZERO_TOLERANCE {
        0.
    } else {
        x.signum()
    }
}
