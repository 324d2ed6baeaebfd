use serde::{Deserialize, Serialize};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Linear,
    #[default]
    Sigmoid,
    Tanh,
    Log,
    Sin,
}

/// A hidden layer of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub nodes: usize,
    #[serde(default)]
    pub act_fn: ActFnSpec,
}

/// The layer sizes and activation kinds of a feed forward network.
///
/// With no hidden layers this is a logistic regression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub inputs: usize,
    #[serde(default)]
    pub hidden: Vec<LayerSpec>,
    pub outputs: usize,
    #[serde(default)]
    pub output_act_fn: ActFnSpec,
}

/// The specification for the weight update method.
///
/// Also accepts the single letter names `B`, `Q`, `R` and `M`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationSpec {
    #[serde(alias = "B")]
    Back {
        #[serde(default)]
        momentum: f32,
    },
    #[serde(alias = "Q")]
    Quick {
        #[serde(default = "default_quick_momentum")]
        momentum: f32,
    },
    #[default]
    #[serde(alias = "R")]
    Resilient,
    #[serde(alias = "M")]
    Manhattan,
}

fn default_quick_momentum() -> f32 {
    0.9
}

/// The specification for the `Loss` enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSpec {
    #[default]
    Squared,
    Log,
}
