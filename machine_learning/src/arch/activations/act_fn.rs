use comms::specs::machine_learning::ActFnSpec;

/// The activation functions a layer can apply to its weighted sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActFn {
    Linear,
    #[default]
    Sigmoid,
    Tanh,
    /// `ln(1 + z)` for non negative inputs and `-ln(1 - z)` for negative ones.
    Log,
    Sin,
}

use ActFn::*;

impl ActFn {
    pub fn f(&self, z: f32) -> f32 {
        match self {
            Linear => z,
            Sigmoid => 1. / (1. + (-z).exp()),
            Tanh => z.tanh(),
            Log if z >= 0. => z.ln_1p(),
            Log => -(-z).ln_1p(),
            Sin => z.sin(),
        }
    }

    /// The derivative of the function evaluated at the weighted sum `z`.
    pub fn df(&self, z: f32) -> f32 {
        match self {
            Linear => 1.,
            Sigmoid => {
                let s = Sigmoid.f(z);
                s * (1. - s)
            }
            Tanh => 1. - z.tanh().powi(2),
            Log => 1. / (1. + z.abs()),
            Sin => z.cos(),
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Linear => Linear,
            ActFnSpec::Sigmoid => Sigmoid,
            ActFnSpec::Tanh => Tanh,
            ActFnSpec::Log => Log,
            ActFnSpec::Sin => Sin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn numeric_df(act_fn: ActFn, z: f32) -> f32 {
        (act_fn.f(z + EPS) - act_fn.f(z - EPS)) / (2. * EPS)
    }

    #[test]
    fn derivatives_match_finite_differences() {
        for act_fn in [Linear, Sigmoid, Tanh, Log, Sin] {
            for z in [-2.0, -0.3, 0.4, 1.7] {
                let diff = (act_fn.df(z) - numeric_df(act_fn, z)).abs();
                assert!(diff < 1e-2, "{act_fn:?} at {z}: {diff}");
            }
        }
    }

    #[test]
    fn log_is_odd() {
        assert!((Log.f(-1.5) + Log.f(1.5)).abs() < 1e-6);
        assert_eq!(Sigmoid.f(0.), 0.5);
    }
}
