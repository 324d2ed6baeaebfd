use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};

use crate::{Result, arch::Topology};

/// A weight generator that follows a certain probabilistic distribution.
pub struct RandWeightGen<'r, R: Rng, D: Distribution<f32>> {
    rng: &'r mut R,
    distribution: D,
    remaining: usize,
}

impl<'r, R: Rng, D: Distribution<f32>> RandWeightGen<'r, R, D> {
    /// Creates a new `RandWeightGen` weight generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: &'r mut R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }

    /// Samples at most `n` more weights, `None` once the limit was reached.
    pub fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        let n = n.min(self.remaining);
        self.remaining -= n;
        Some((0..n).map(|_| self.distribution.sample(&mut *self.rng)).collect())
    }
}

impl<'r, R: Rng> RandWeightGen<'r, R, Uniform<f32>> {
    /// Creates a new `RandWeightGen` weight generator using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn xavier_uniform(rng: &'r mut R, limit: usize, fan_in: usize, fan_out: usize) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Ok(Self::new(rng, Uniform::new_inclusive(-range, range)?, limit))
    }
}

/// Derives the initial flat parameter vector of `topology` from `seed`.
///
/// The master and every worker of a replicate call this with the same arguments, so the
/// first iteration never needs the weights to travel.
pub fn initial_weights(topology: &Topology, seed: u64) -> Result<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut weights = Vec::with_capacity(topology.param_count());

    for ((fan_in, fan_out), _) in topology.dims() {
        let size = (fan_in + 1) * fan_out;
        let mut generator = RandWeightGen::xavier_uniform(&mut rng, size, fan_in, fan_out)?;

        if let Some(layer) = generator.sample(size) {
            weights.extend(layer);
        }
    }

    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::activations::ActFn;

    #[test]
    fn same_seed_same_weights() {
        let topology = Topology::new(4, vec![(3, ActFn::Tanh), (1, ActFn::Sigmoid)]).unwrap();

        let a = initial_weights(&topology, 11).unwrap();
        let b = initial_weights(&topology, 11).unwrap();
        let c = initial_weights(&topology, 12).unwrap();

        assert_eq!(a.len(), topology.param_count());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn weights_stay_in_the_xavier_range() {
        let topology = Topology::new(2, vec![(2, ActFn::Sigmoid)]).unwrap();
        let limit = (6f32 / 4.).sqrt();

        let weights = initial_weights(&topology, 0).unwrap();
        assert!(weights.iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn generator_stops_at_its_limit() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut generator = RandWeightGen::xavier_uniform(&mut rng, 5, 2, 2).unwrap();

        assert_eq!(generator.sample(3).map(|w| w.len()), Some(3));
        assert_eq!(generator.sample(3).map(|w| w.len()), Some(2));
        assert!(generator.sample(3).is_none());
    }
}
