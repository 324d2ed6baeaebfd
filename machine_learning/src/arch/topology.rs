use comms::specs::machine_learning::TopologySpec;

use super::activations::ActFn;
use crate::{MlErr, Result};

/// The shape of a fully connected network: the amount of inputs and, for every layer after
/// the input one, its node count and activation function.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    inputs: usize,
    layers: Vec<(usize, ActFn)>,
}

impl Topology {
    /// Creates a new `Topology`.
    ///
    /// # Errors
    /// `MlErr::InvalidTopology` if there are no layers or any of the counts is zero.
    pub fn new(inputs: usize, layers: Vec<(usize, ActFn)>) -> Result<Self> {
        if inputs == 0 {
            return Err(MlErr::InvalidTopology("the network has no inputs".into()));
        }

        if layers.is_empty() {
            return Err(MlErr::InvalidTopology("the network has no layers".into()));
        }

        if let Some(i) = layers.iter().position(|&(nodes, _)| nodes == 0) {
            return Err(MlErr::InvalidTopology(format!("layer {i} has no nodes")));
        }

        Ok(Self { inputs, layers })
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.layers.last().map(|&(nodes, _)| nodes).unwrap_or_default()
    }

    /// Iterates over every layer's `(fan_in, fan_out)` and activation function.
    pub fn dims(&self) -> impl Iterator<Item = ((usize, usize), ActFn)> + '_ {
        let fan_ins = std::iter::once(self.inputs).chain(self.layers.iter().map(|&(n, _)| n));
        fan_ins
            .zip(&self.layers)
            .map(|(fan_in, &(fan_out, act_fn))| ((fan_in, fan_out), act_fn))
    }

    /// The length of the flat parameter vector, every layer has `(fan_in + 1) * fan_out`
    /// parameters, biases included.
    pub fn param_count(&self) -> usize {
        self.dims()
            .map(|((fan_in, fan_out), _)| (fan_in + 1) * fan_out)
            .sum()
    }
}

impl TryFrom<&TopologySpec> for Topology {
    type Error = MlErr;

    fn try_from(spec: &TopologySpec) -> Result<Self> {
        let layers = spec
            .hidden
            .iter()
            .map(|layer| (layer.nodes, layer.act_fn.into()))
            .chain(std::iter::once((spec.outputs, spec.output_act_fn.into())))
            .collect();

        Self::new(spec.inputs, layers)
    }
}
