use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer. It holds no parameters of its own, it views the slice of the flat
/// parameter vector it's handed as a `fan_in x fan_out` weight matrix followed by `fan_out`
/// biases.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: ActFn,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,

    // Backward metadata
    d: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The fan in and fan out of the layer.
    /// * `act_fn` - The activation function applied to the weighted sums.
    pub fn new(dim: (usize, usize), act_fn: ActFn) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros.clone(),
            d: zeros,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forwards a batch of rows through the layer.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the parameters.
    /// * `x` - The batch, one row per record.
    ///
    /// # Returns
    /// The activations of the layer or an error if the dimensions don't agree.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::DimensionMismatch {
                what: "layer inputs",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let shape = (x.nrows(), self.dim.1);

        reshape(&mut self.z, shape);
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut self.z);
        self.z += &b;

        self.x = x.to_owned();

        let act_fn = self.act_fn;
        reshape(&mut self.a, shape);
        self.a.zip_mut_with(&self.z, |a, &z| *a = act_fn.f(z));
        Ok(self.a.view())
    }

    /// Backpropagates the deltas of this layer's activations, writing this layer's slice of
    /// the gradient.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the parameters.
    /// * `grad` - This layer's slice of the gradient, it's overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's activations.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's inputs.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: ArrayViewMut2<f32>,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        let act_fn = self.act_fn;
        d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        reshape(&mut self.d, (d.nrows(), w.nrows()));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut self.d);

        Ok(self.d.view_mut())
    }

    fn check_len(&self, what: &'static str, len: usize) -> Result<usize> {
        if len != self.size {
            return Err(MlErr::DimensionMismatch {
                what,
                got: len,
                expected: self.size,
            });
        }

        Ok(self.size - self.dim.1)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let w_size = self.check_len("layer gradient", grad.len())?;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.shape_err(w_size))?;
        let db = ArrayViewMut1::from(db_raw);
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let w_size = self.check_len("layer parameters", params.len())?;
        let (w_raw, b_raw) = params.split_at(w_size);
        let w = ArrayView2::from_shape(self.dim, w_raw).map_err(|_| self.shape_err(w_size))?;
        let b = ArrayView1::from(b_raw);
        Ok((w, b))
    }

    fn shape_err(&self, got: usize) -> MlErr {
        MlErr::DimensionMismatch {
            what: "layer weights",
            got,
            expected: self.dim.0 * self.dim.1,
        }
    }
}

/// Replaces `arr` with a zeroed array only when its shape changes between batches.
fn reshape(arr: &mut Array2<f32>, shape: (usize, usize)) {
    if arr.dim() != shape {
        *arr = Array2::zeros(shape);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_applies_weights_biases_and_activation() {
        let mut dense = Dense::new((2, 1), ActFn::Linear);
        let params = [2.0, -1.0, 0.5];
        let x = array![[1.0, 1.0], [3.0, 2.0]];

        let a = dense.forward(&params, x.view()).unwrap();

        let expected: Array2<f32> = array![[1.5], [4.5]];
        assert_eq!(a, expected);
    }

    #[test]
    fn backward_sums_the_gradient_over_the_batch() {
        let mut dense = Dense::new((2, 1), ActFn::Linear);
        let params = [2.0, -1.0, 0.5];
        let x = array![[1.0, 1.0], [3.0, 2.0]];
        dense.forward(&params, x.view()).unwrap();

        let mut grad = [0.0; 3];
        let mut d = array![[1.0], [-1.0]];
        let dx = dense.backward(&params, &mut grad, d.view_mut()).unwrap();

        let expected: Array2<f32> = array![[2.0, -1.0], [-2.0, 1.0]];
        assert_eq!(dx, expected);
        assert_eq!(grad, [-2.0f32, -1.0, 0.0]);
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let mut dense = Dense::new((2, 1), ActFn::Sigmoid);
        let x = array![[1.0, 1.0]];

        let err = dense.forward(&[1.0, 2.0], x.view()).unwrap_err();

        assert!(matches!(err, MlErr::DimensionMismatch { got: 2, expected: 3, .. }));
    }
}
