use comms::specs::machine_learning::LossSpec;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};

/// Outputs are kept this far away from 0 and 1 before taking logarithms.
const LOG_CLAMP: f32 = 1e-7;

/// A loss over a batch where every row has its own significance.
pub trait LossFn {
    /// The sum over the rows of `significance * row_loss`, the row loss being averaged over
    /// the outputs.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>, s: ArrayView1<f32>) -> f32;

    /// The derivative of `loss` with respect to `y_pred`.
    fn loss_prime(
        &self,
        y_pred: ArrayView2<f32>,
        y: ArrayView2<f32>,
        s: ArrayView1<f32>,
    ) -> Array2<f32>;
}

/// Mean squared error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>, s: ArrayView1<f32>) -> f32 {
        let rows = (&y_pred - &y).mapv(|x| x.powi(2)).mean_axis(Axis(1));
        rows.map(|rows| rows.dot(&s)).unwrap_or_default()
    }

    fn loss_prime(
        &self,
        y_pred: ArrayView2<f32>,
        y: ArrayView2<f32>,
        s: ArrayView1<f32>,
    ) -> Array2<f32> {
        let scale = 2.0 / y_pred.ncols().max(1) as f32;
        let mut d = (&y_pred - &y) * scale;
        d *= &s.insert_axis(Axis(1));
        d
    }
}

/// Binary cross entropy, for sigmoid outputs and targets in `[0, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>, s: ArrayView1<f32>) -> f32 {
        let mut terms = Array2::zeros(y_pred.raw_dim());
        Zip::from(&mut terms)
            .and(&y_pred)
            .and(&y)
            .for_each(|l, &p, &t| {
                let p = p.clamp(LOG_CLAMP, 1. - LOG_CLAMP);
                *l = -(t * p.ln() + (1. - t) * (1. - p).ln());
            });

        let rows = terms.mean_axis(Axis(1));
        rows.map(|rows| rows.dot(&s)).unwrap_or_default()
    }

    fn loss_prime(
        &self,
        y_pred: ArrayView2<f32>,
        y: ArrayView2<f32>,
        s: ArrayView1<f32>,
    ) -> Array2<f32> {
        let scale = 1.0 / y_pred.ncols().max(1) as f32;
        let mut d = Array2::zeros(y_pred.raw_dim());
        Zip::from(&mut d).and(&y_pred).and(&y).for_each(|d, &p, &t| {
            let p = p.clamp(LOG_CLAMP, 1. - LOG_CLAMP);
            *d = scale * (p - t) / (p * (1. - p));
        });

        d *= &s.insert_axis(Axis(1));
        d
    }
}

/// The loss functions a training can be configured with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    #[default]
    Squared,
    Log,
}

impl LossFn for Loss {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>, s: ArrayView1<f32>) -> f32 {
        match self {
            Loss::Squared => Mse.loss(y_pred, y, s),
            Loss::Log => CrossEntropy.loss(y_pred, y, s),
        }
    }

    fn loss_prime(
        &self,
        y_pred: ArrayView2<f32>,
        y: ArrayView2<f32>,
        s: ArrayView1<f32>,
    ) -> Array2<f32> {
        match self {
            Loss::Squared => Mse.loss_prime(y_pred, y, s),
            Loss::Log => CrossEntropy.loss_prime(y_pred, y, s),
        }
    }
}

impl From<LossSpec> for Loss {
    fn from(spec: LossSpec) -> Self {
        match spec {
            LossSpec::Squared => Loss::Squared,
            LossSpec::Log => Loss::Log,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn significance_scales_each_row() {
        let y_pred = array![[1.0f32], [0.0]];
        let y = array![[0.0f32], [0.0]];
        let s = array![3.0f32, 1.0];

        assert_eq!(Mse.loss(y_pred.view(), y.view(), s.view()), 3.0);

        let d = Mse.loss_prime(y_pred.view(), y.view(), s.view());
        let expected: Array2<f32> = array![[6.0], [0.0]];
        assert_eq!(d, expected);
    }

    #[test]
    fn cross_entropy_is_small_for_confident_hits() {
        let y_pred = array![[0.99f32], [0.01]];
        let y = array![[1.0f32], [0.0]];
        let s = array![1.0f32, 1.0];

        let loss = CrossEntropy.loss(y_pred.view(), y.view(), s.view());
        assert!(loss > 0. && loss < 0.05, "{loss}");
    }
}
