use ndarray::{ArrayView1, ArrayView2};

use super::{Topology, layers::Dense, loss::LossFn};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns no parameters, every pass is handed the flat parameter vector so the same
/// instance can evaluate whatever weights the master broadcasts.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
    size: usize,
}

impl Sequential {
    /// Creates a new `Sequential` shaped after `topology`.
    pub fn new(topology: &Topology) -> Self {
        let layers: Vec<_> = topology
            .dims()
            .map(|(dim, act_fn)| Dense::new(dim, act_fn))
            .collect();

        Self {
            size: layers.iter().map(Dense::size).sum(),
            layers,
        }
    }

    /// Returns the amount of parameters of the model.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The flat parameter vector.
    /// * `x` - The input data, one row per record.
    ///
    /// # Returns
    /// The prediction for the given input or an error if the dimensions don't agree.
    pub fn forward<'x>(
        &'x mut self,
        params: &[f32],
        mut x: ArrayView2<'x, f32>,
    ) -> Result<ArrayView2<'x, f32>> {
        self.check_len("parameters", params.len())?;

        let mut start = 0;
        for layer in self.layers.iter_mut() {
            let end = start + layer.size();
            x = layer.forward(&params[start..end], x)?;
            start = end;
        }

        Ok(x)
    }

    /// Computes the significance weighted loss of a batch without touching any gradient.
    pub fn evaluate<L: LossFn>(
        &mut self,
        params: &[f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        s: ArrayView1<f32>,
    ) -> Result<f32> {
        let y_pred = self.forward(params, x)?;
        Ok(loss_fn.loss(y_pred, y, s))
    }

    /// Forwards a batch and backpropagates its loss.
    ///
    /// # Arguments
    /// * `params` - The flat parameter vector.
    /// * `grad` - The gradient buffer, overwritten with the gradient of this batch.
    /// * `loss_fn` - The loss function.
    /// * `x` - The input data, one row per record.
    /// * `y` - The expected output data.
    /// * `s` - The significance of each row.
    ///
    /// # Returns
    /// The significance weighted loss of the batch.
    pub fn backprop<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        s: ArrayView1<f32>,
    ) -> Result<f32> {
        self.check_len("gradient", grad.len())?;

        let y_pred = self.forward(params, x)?;
        let loss = loss_fn.loss(y_pred, y, s);
        let mut d_last = loss_fn.loss_prime(y_pred, y, s);
        let mut d = d_last.view_mut();

        let mut end = params.len();
        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(loss)
    }

    fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.size {
            return Err(MlErr::DimensionMismatch {
                what,
                got: len,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::{activations::ActFn, loss::Mse};

    fn model() -> (Sequential, Vec<f32>) {
        let topology = Topology::new(2, vec![(3, ActFn::Tanh), (1, ActFn::Sigmoid)]).unwrap();
        let params = (0..topology.param_count())
            .map(|i| ((i as f32) * 0.37).sin() * 0.5)
            .collect();

        (Sequential::new(&topology), params)
    }

    #[test]
    fn backprop_agrees_with_finite_differences() {
        let (mut model, mut params) = model();
        let x = array![[0.5f32, -1.0], [1.5, 0.25]];
        let y = array![[1.0f32], [0.0]];
        let s = array![1.0f32, 2.0];

        let mut grad = vec![0.0; model.size()];
        model
            .backprop(&params, &mut grad, &Mse, x.view(), y.view(), s.view())
            .unwrap();

        let eps = 1e-2;
        for i in 0..params.len() {
            let orig = params[i];
            params[i] = orig + eps;
            let up = model.evaluate(&params, &Mse, x.view(), y.view(), s.view()).unwrap();
            params[i] = orig - eps;
            let down = model.evaluate(&params, &Mse, x.view(), y.view(), s.view()).unwrap();
            params[i] = orig;

            let numeric = (up - down) / (2. * eps);
            assert!((numeric - grad[i]).abs() < 1e-2, "param {i}: {numeric} vs {}", grad[i]);
        }
    }

    #[test]
    fn short_parameter_vectors_are_rejected() {
        let (mut model, params) = model();
        let x = array![[0.5f32, -1.0]];

        let err = model.forward(&params[1..], x.view()).unwrap_err();
        assert!(matches!(err, MlErr::DimensionMismatch { what: "parameters", .. }));
    }
}
