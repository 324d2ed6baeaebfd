use comms::specs::machine_learning::PropagationSpec;
use log::debug;

use super::{
    GradientDescent, GradientDescentWithMomentum, ManhattanPropagation, Optimizer,
    ResilientPropagation,
};
use crate::{MlErr, Result};

/// Computes the next weights of a training from the previous ones and the aggregated gradient.
///
/// Holds the per weight state of its propagation method, so every training owns exactly one.
pub struct WeightCalculator {
    len: usize,
    optimizer: Box<dyn Optimizer>,
}

impl WeightCalculator {
    /// Creates a new `WeightCalculator`.
    ///
    /// # Arguments
    /// * `len` - The amount of weights of the model.
    /// * `learning_rate` - The step length, ignored by resilient propagation.
    /// * `propagation` - The update rule and its hyperparameters.
    ///
    /// # Errors
    /// `MlErr::InvalidArgument` if the learning rate is not positive or a momentum is not in
    /// `[0, 1)`, `MlErr::DimensionMismatch` if `len` is zero.
    pub fn new(len: usize, learning_rate: f32, propagation: &PropagationSpec) -> Result<Self> {
        if len == 0 {
            return Err(MlErr::DimensionMismatch {
                what: "weights",
                got: 0,
                expected: 1,
            });
        }

        if !(learning_rate.is_finite() && learning_rate > 0.) {
            return Err(MlErr::InvalidArgument {
                what: "learning rate",
                value: learning_rate.into(),
            });
        }

        let optimizer: Box<dyn Optimizer> = match *propagation {
            PropagationSpec::Back { momentum } if momentum == 0. => {
                Box::new(GradientDescent::new(len, learning_rate))
            }
            PropagationSpec::Back { momentum } | PropagationSpec::Quick { momentum } => {
                if !(0. ..1.).contains(&momentum) {
                    return Err(MlErr::InvalidArgument {
                        what: "momentum",
                        value: momentum.into(),
                    });
                }

                Box::new(GradientDescentWithMomentum::new(len, learning_rate, momentum))
            }
            PropagationSpec::Resilient => Box::new(ResilientPropagation::new(len)),
            PropagationSpec::Manhattan => Box::new(ManhattanPropagation::new(len, learning_rate)),
        };

        Ok(Self { len, optimizer })
    }

    /// Returns the amount of weights this calculator updates.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Computes the weights of the next iteration.
    ///
    /// # Arguments
    /// * `weights` - The current weights.
    /// * `gradient` - The gradient summed over every worker.
    /// * `train_size` - The amount of records the gradient was computed from.
    ///
    /// # Returns
    /// The new weights, or `MlErr::DimensionMismatch` if the lengths differ from each other
    /// or from the model, or `MlErr::InvalidArgument` if `train_size` is zero.
    pub fn calculate_weights(
        &mut self,
        weights: &[f32],
        gradient: &[f32],
        train_size: u64,
    ) -> Result<Vec<f32>> {
        if weights.len() != gradient.len() {
            return Err(MlErr::DimensionMismatch {
                what: "gradient",
                got: gradient.len(),
                expected: weights.len(),
            });
        }

        if train_size == 0 {
            return Err(MlErr::InvalidArgument {
                what: "train size",
                value: 0.,
            });
        }

        if let Some(index) = gradient.iter().position(|g| !g.is_finite()) {
            return Err(MlErr::NonFinite {
                what: "gradient",
                index,
            });
        }

        debug!(train_size = train_size, len = weights.len(); "calculating new weights");

        let mut next = weights.to_vec();
        self.optimizer.update_params(&mut next, gradient)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn all_methods() -> [PropagationSpec; 5] {
        [
            PropagationSpec::Back { momentum: 0. },
            PropagationSpec::Back { momentum: 0.5 },
            PropagationSpec::Quick { momentum: 0.9 },
            PropagationSpec::Resilient,
            PropagationSpec::Manhattan,
        ]
    }

    fn assert_close(got: &[f32], expected: &[f32]) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < EPS, "{got:?} != {expected:?}");
        }
    }

    #[test]
    fn plain_step_moves_against_the_gradient() {
        let spec = PropagationSpec::Back { momentum: 0. };
        let mut calculator = WeightCalculator::new(2, 0.1, &spec).unwrap();

        let next = calculator
            .calculate_weights(&[0.5, 0.5], &[0.3, 0.1], 4)
            .unwrap();

        assert_close(&next, &[0.47, 0.49]);
    }

    #[test]
    fn zero_gradient_keeps_the_weights_for_every_method() {
        let weights = [0.25, -1.5, 3.0];

        for spec in all_methods() {
            let mut calculator = WeightCalculator::new(3, 0.1, &spec).unwrap();
            let next = calculator.calculate_weights(&weights, &[0.; 3], 1).unwrap();
            assert_eq!(next, weights, "{spec:?}");
        }
    }

    #[test]
    fn length_mismatch_is_never_truncated() {
        for spec in all_methods() {
            let mut calculator = WeightCalculator::new(3, 0.1, &spec).unwrap();

            let err = calculator
                .calculate_weights(&[0.; 3], &[0.; 2], 1)
                .unwrap_err();
            assert!(matches!(err, MlErr::DimensionMismatch { got: 2, expected: 3, .. }));

            let err = calculator
                .calculate_weights(&[0.; 2], &[0.; 2], 1)
                .unwrap_err();
            assert!(matches!(err, MlErr::DimensionMismatch { got: 2, expected: 3, .. }));
        }
    }

    #[test]
    fn quick_propagation_accumulates_velocity() {
        let spec = PropagationSpec::Quick { momentum: 0.9 };
        let mut calculator = WeightCalculator::new(1, 0.1, &spec).unwrap();

        let once = calculator.calculate_weights(&[0.], &[1.], 1).unwrap();
        let twice = calculator.calculate_weights(&once, &[1.], 1).unwrap();

        assert_close(&once, &[-0.1]);
        assert_close(&twice, &[-0.29]);
    }

    #[test]
    fn manhattan_ignores_the_magnitude() {
        let mut calculator = WeightCalculator::new(3, 0.1, &PropagationSpec::Manhattan).unwrap();

        let next = calculator
            .calculate_weights(&[0.; 3], &[25., -1e-3, 0.], 1)
            .unwrap();

        assert_close(&next, &[-0.1, 0.1, 0.]);
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        let spec = PropagationSpec::Back { momentum: 0. };
        assert!(WeightCalculator::new(2, 0., &spec).is_err());
        assert!(WeightCalculator::new(0, 0.1, &spec).is_err());

        let spec = PropagationSpec::Quick { momentum: 1.5 };
        assert!(WeightCalculator::new(2, 0.1, &spec).is_err());

        let mut calculator = WeightCalculator::new(1, 0.1, &PropagationSpec::Resilient).unwrap();
        let err = calculator.calculate_weights(&[0.], &[1.], 0).unwrap_err();
        assert!(matches!(err, MlErr::InvalidArgument { what: "train size", .. }));
    }
}
