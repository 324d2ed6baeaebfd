use super::{
    Optimizer,
    optimizer::{check_sizes, sign},
};
use crate::Result;

/// Steps every weight by exactly `learning_rate` against the sign of its gradient, ignoring
/// the gradient's magnitude.
#[derive(Debug)]
pub struct ManhattanPropagation {
    len: usize,
    learning_rate: f32,
}

impl ManhattanPropagation {
    pub fn new(len: usize, learning_rate: f32) -> Self {
        Self { len, learning_rate }
    }
}

impl Optimizer for ManhattanPropagation {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params, grad, self.len)?;
        let lr = self.learning_rate;

        for (w, &g) in params.iter_mut().zip(grad) {
            *w -= lr * sign(g);
        }

        Ok(())
    }
}
