use comms::specs::machine_learning::TopologySpec;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Result,
    arch::{Sequential, Topology},
};

/// A finished ensemble replicate, everything needed to persist it or to score with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub replicate: usize,
    pub topology: TopologySpec,
    pub weights: Vec<f32>,
    pub best_weights: Vec<f32>,
    pub train_error: f32,
    pub validation_error: f32,
    pub iterations: u32,
}

impl TrainedModel {
    /// Builds a scorer using the best weights of the training.
    pub fn scorer(&self) -> Result<Scorer> {
        Scorer::new(&self.topology, self.best_weights.clone())
    }
}

/// Forward-only evaluation of a network with fixed weights.
#[derive(Debug, Clone)]
pub struct Scorer {
    model: Sequential,
    weights: Vec<f32>,
    outputs: usize,
}

impl Scorer {
    pub fn new(topology: &TopologySpec, weights: Vec<f32>) -> Result<Self> {
        let topology = Topology::try_from(topology)?;
        if weights.len() != topology.param_count() {
            return Err(MlErr::DimensionMismatch {
                what: "model weights",
                got: weights.len(),
                expected: topology.param_count(),
            });
        }

        Ok(Self {
            model: Sequential::new(&topology),
            outputs: topology.outputs(),
            weights,
        })
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Scores a batch of rows.
    ///
    /// # Returns
    /// The first output of the network for every row.
    pub fn score(&mut self, x: ArrayView2<f32>) -> Result<Vec<f32>> {
        let y = self.model.forward(&self.weights, x)?;
        Ok(y.column(0).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn topology() -> TopologySpec {
        TopologySpec {
            inputs: 1,
            hidden: Vec::new(),
            outputs: 1,
            output_act_fn: Default::default(),
        }
    }

    #[test]
    fn scores_with_the_given_weights() {
        let mut scorer = Scorer::new(&topology(), vec![0., 0.]).unwrap();
        let x = array![[1.0f32], [-3.0]];

        assert_eq!(scorer.score(x.view()).unwrap(), [0.5, 0.5]);
    }

    #[test]
    fn weights_must_fit_the_topology() {
        let err = Scorer::new(&topology(), vec![0.; 3]).unwrap_err();
        assert!(matches!(err, MlErr::DimensionMismatch { got: 3, expected: 2, .. }));
    }
}
