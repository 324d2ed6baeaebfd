use std::num::NonZeroUsize;

use comms::specs::training::TrainingSpec;
use log::{info, warn};
use machine_learning::{
    MlErr,
    arch::Topology,
    initialization::initial_weights,
    optimization::WeightCalculator,
    training::IterationResult,
};

use crate::{MasterErr, Progress, Result, TerminationPolicy};

/// The master's view of the training after an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalState {
    /// Completed aggregations, 0 right after initialization.
    pub iteration: u32,
    pub weights: Vec<f32>,
    pub train_error: f32,
    pub validation_error: f32,
}

/// What a finished training leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub weights: Vec<f32>,
    /// The weights that scored the lowest selection error, see `MasterCoordinator`.
    pub best_weights: Vec<f32>,
    pub train_error: f32,
    pub validation_error: f32,
    pub iterations: u32,
}

/// The best weights seen so far and the error they scored.
#[derive(Debug)]
struct Best {
    error: f32,
    weights: Vec<f32>,
}

/// Aggregates the workers' partial results of every iteration into a single weight update.
///
/// The best weights are selected by validation error, or by training error when no worker
/// holds out validation records.
pub struct MasterCoordinator {
    topology: Topology,
    seed: u64,
    workers: NonZeroUsize,
    calculator: WeightCalculator,
    policy: TerminationPolicy,
    progress: Progress,
    state: Option<GlobalState>,
    best: Option<Best>,
}

impl MasterCoordinator {
    /// Creates a new `MasterCoordinator`.
    ///
    /// # Arguments
    /// * `topology` - The shape of the trained network.
    /// * `seed` - The seed the initial weights are derived from, shared with the workers.
    /// * `workers` - The amount of results every aggregation expects.
    /// * `calculator` - The weight update engine, owned for the whole training.
    /// * `policy` - Decides when to stop.
    pub fn new(
        topology: Topology,
        seed: u64,
        workers: NonZeroUsize,
        calculator: WeightCalculator,
        policy: TerminationPolicy,
    ) -> Self {
        Self {
            topology,
            seed,
            workers,
            calculator,
            policy,
            progress: Progress::default(),
            state: None,
            best: None,
        }
    }

    /// Creates a new `MasterCoordinator` from the training specification.
    pub fn from_spec(spec: &TrainingSpec, seed: u64) -> Result<Self> {
        let topology = Topology::try_from(&spec.topology)?;
        let calculator =
            WeightCalculator::new(topology.param_count(), spec.learning_rate, &spec.propagation)?;
        let policy = TerminationPolicy::from_spec(&spec.termination, spec.max_iterations);

        Ok(Self::new(
            topology,
            seed,
            spec.workers_per_replicate,
            calculator,
            policy,
        ))
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// The current state, `None` before the first call to `run_iteration`.
    pub fn state(&self) -> Option<&GlobalState> {
        self.state.as_ref()
    }

    /// Runs one step of the coordinator.
    ///
    /// The first call initializes the weights and ignores `results`. Every later call
    /// aggregates the results of the next iteration, ignoring stale ones, and updates the
    /// weights.
    ///
    /// # Returns
    /// The new state and whether the training should stop.
    ///
    /// # Errors
    /// `MasterErr::NoWorkerResults` with no results, `MasterErr::IncompleteResults` when
    /// there's not one result per worker for the iteration, `MasterErr::Ml` when the gradients
    /// don't match the weights or the update fails.
    pub fn run_iteration(&mut self, results: &[IterationResult]) -> Result<(GlobalState, bool)> {
        let Some(state) = &self.state else {
            let weights = initial_weights(&self.topology, self.seed)?;
            let state = GlobalState {
                iteration: 0,
                weights,
                train_error: 0.,
                validation_error: 0.,
            };

            info!(params = state.weights.len(), seed = self.seed; "weights initialized");
            self.state = Some(state.clone());
            return Ok((state, false));
        };

        if results.is_empty() {
            return Err(MasterErr::NoWorkerResults);
        }

        let iteration = state.iteration + 1;
        let current: Vec<_> = results
            .iter()
            .filter(|result| {
                let fresh = result.iteration == iteration;
                if !fresh {
                    warn!(
                        iteration = iteration,
                        stale = result.iteration;
                        "ignoring stale worker result"
                    );
                }

                fresh
            })
            .collect();

        if current.len() != self.workers.get() {
            return Err(MasterErr::IncompleteResults {
                iteration,
                got: current.len(),
                expected: self.workers.get(),
            });
        }

        let len = state.weights.len();
        let mut gradient = vec![0.; len];
        let mut train_size = 0;
        let mut train_error = 0.;
        let mut validation_error = 0.;
        let mut validating = 0;

        for result in &current {
            if result.gradient.len() != len {
                return Err(MlErr::DimensionMismatch {
                    what: "worker gradient",
                    got: result.gradient.len(),
                    expected: len,
                }
                .into());
            }

            gradient
                .iter_mut()
                .zip(&result.gradient)
                .for_each(|(acc, g)| *acc += g);

            train_size += result.train_size;
            train_error += result.train_error;
            if result.validation_size > 0 {
                validation_error += result.validation_error;
                validating += 1;
            }
        }

        train_error /= current.len() as f32;
        if validating > 0 {
            validation_error /= validating as f32;
        }

        let weights = self
            .calculator
            .calculate_weights(&state.weights, &gradient, train_size)?;

        info!(
            iteration = iteration,
            train_error = train_error,
            validation_error = validation_error,
            train_size = train_size;
            "iteration finished"
        );

        // The errors were measured on the weights the workers received, not on the new ones.
        let selection_error = if validating > 0 {
            validation_error
        } else {
            train_error
        };
        track_best(
            &mut self.best,
            &mut self.progress,
            self.policy.min_delta(),
            selection_error,
            &state.weights,
        );

        let state = GlobalState {
            iteration,
            weights,
            train_error,
            validation_error,
        };

        self.progress.iterations += 1;
        let terminate = self.policy.should_terminate(&self.progress);
        self.state = Some(state.clone());

        Ok((state, terminate))
    }

    /// Consumes the coordinator, returning the final and best weights.
    pub fn into_outcome(self) -> TrainingOutcome {
        let state = self.state.unwrap_or(GlobalState {
            iteration: 0,
            weights: Vec::new(),
            train_error: 0.,
            validation_error: 0.,
        });

        let best_weights = match self.best {
            Some(best) => best.weights,
            None => state.weights.clone(),
        };

        TrainingOutcome {
            best_weights,
            weights: state.weights,
            train_error: state.train_error,
            validation_error: state.validation_error,
            iterations: state.iteration,
        }
    }
}

/// Keeps `weights` if they beat the best error so far, counting the aggregations that didn't
/// improve on it by at least `min_delta`.
fn track_best(
    best: &mut Option<Best>,
    progress: &mut Progress,
    min_delta: f32,
    error: f32,
    weights: &[f32],
) {
    let Some(current) = best.as_mut() else {
        *best = Some(Best {
            error,
            weights: weights.to_vec(),
        });
        return;
    };

    if error < current.error - min_delta {
        progress.stale_iterations = 0;
    } else {
        progress.stale_iterations += 1;
    }

    if error < current.error {
        current.error = error;
        current.weights.copy_from_slice(weights);
    }
}

#[cfg(test)]
mod tests {
    use comms::specs::machine_learning::PropagationSpec;
    use machine_learning::arch::activations::ActFn;

    use super::*;

    fn coordinator(workers: usize, max_iterations: usize) -> MasterCoordinator {
        let topology = Topology::new(1, vec![(1, ActFn::Sigmoid)]).unwrap();
        let spec = PropagationSpec::Back { momentum: 0. };
        let calculator = WeightCalculator::new(topology.param_count(), 0.1, &spec).unwrap();
        let policy = TerminationPolicy::MaxIterations(NonZeroUsize::new(max_iterations).unwrap());

        MasterCoordinator::new(
            topology,
            3,
            NonZeroUsize::new(workers).unwrap(),
            calculator,
            policy,
        )
    }

    fn result(iteration: u32, gradient: [f32; 2], error: f32) -> IterationResult {
        IterationResult {
            iteration,
            gradient: gradient.to_vec(),
            train_error: error,
            validation_error: error,
            train_size: 2,
            validation_size: 1,
        }
    }

    #[test]
    fn first_call_initializes_deterministically() {
        let (a, stop) = coordinator(1, 5).run_iteration(&[]).unwrap();
        let (b, _) = coordinator(1, 5).run_iteration(&[]).unwrap();

        assert!(!stop);
        assert_eq!(a.iteration, 0);
        assert_eq!(a.weights.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn gradients_are_summed_and_errors_averaged() {
        let mut master = coordinator(2, 5);
        let (init, _) = master.run_iteration(&[]).unwrap();

        let results = [result(1, [0.1, -0.1], 0.4), result(1, [0.2, 0.2], 0.2)];
        let (state, stop) = master.run_iteration(&results).unwrap();

        assert!(!stop);
        assert_eq!(state.iteration, 1);
        assert!((state.train_error - 0.3).abs() < 1e-6);
        assert!((state.validation_error - 0.3).abs() < 1e-6);
        assert!((state.weights[0] - (init.weights[0] - 0.03)).abs() < 1e-6);
        assert!((state.weights[1] - (init.weights[1] - 0.01)).abs() < 1e-6);
    }

    #[test]
    fn stops_after_exactly_the_configured_aggregations() {
        let mut master = coordinator(1, 5);
        master.run_iteration(&[]).unwrap();

        for iteration in 1..=5 {
            let (_, stop) = master
                .run_iteration(&[result(iteration, [0.1, 0.1], 0.5)])
                .unwrap();
            assert_eq!(stop, iteration == 5, "iteration {iteration}");
        }

        assert_eq!(master.into_outcome().iterations, 5);
    }

    #[test]
    fn empty_results_are_rejected_after_initialization() {
        let mut master = coordinator(1, 5);
        master.run_iteration(&[]).unwrap();

        let err = master.run_iteration(&[]).unwrap_err();
        assert!(matches!(err, MasterErr::NoWorkerResults));
    }

    #[test]
    fn stale_results_do_not_count() {
        let mut master = coordinator(2, 5);
        master.run_iteration(&[]).unwrap();

        let results = [result(1, [0.1, 0.1], 0.5), result(0, [9.0, 9.0], 0.5)];
        let err = master.run_iteration(&results).unwrap_err();
        assert!(matches!(
            err,
            MasterErr::IncompleteResults { iteration: 1, got: 1, expected: 2 }
        ));

        let results = [
            result(0, [9.0, 9.0], 0.5),
            result(1, [0.1, 0.1], 0.5),
            result(1, [0.1, 0.1], 0.5),
        ];
        let (state, _) = master.run_iteration(&results).unwrap();
        assert_eq!(state.iteration, 1);
    }

    #[test]
    fn mismatched_gradient_is_a_dimension_error() {
        let mut master = coordinator(1, 5);
        master.run_iteration(&[]).unwrap();

        let mut bad = result(1, [0.1, 0.1], 0.5);
        bad.gradient.push(0.1);

        let err = master.run_iteration(&[bad]).unwrap_err();
        assert!(matches!(err, MasterErr::Ml(MlErr::DimensionMismatch { got: 3, expected: 2, .. })));
    }

    #[test]
    fn best_weights_are_the_ones_with_the_lowest_error() {
        let mut master = coordinator(1, 5);
        let (init, _) = master.run_iteration(&[]).unwrap();

        master.run_iteration(&[result(1, [1.0, 1.0], 0.1)]).unwrap();
        master.run_iteration(&[result(2, [1.0, 1.0], 0.9)]).unwrap();

        let outcome = master.into_outcome();
        assert_eq!(outcome.best_weights, init.weights);
        assert_ne!(outcome.weights, init.weights);
    }

    #[test]
    fn a_perfect_validation_score_still_selects_by_validation() {
        let mut master = coordinator(1, 5);
        let (init, _) = master.run_iteration(&[]).unwrap();

        let mut first = result(1, [1.0, 1.0], 0.9);
        first.validation_error = 0.;
        master.run_iteration(&[first]).unwrap();
        master.run_iteration(&[result(2, [1.0, 1.0], 0.5)]).unwrap();

        assert_eq!(master.into_outcome().best_weights, init.weights);
    }

    #[test]
    fn workers_without_held_out_records_do_not_dilute_validation() {
        let mut master = coordinator(2, 5);
        master.run_iteration(&[]).unwrap();

        let mut bare = result(1, [0.1, 0.1], 0.4);
        bare.validation_error = 0.;
        bare.validation_size = 0;

        let (state, _) = master
            .run_iteration(&[bare, result(1, [0.1, 0.1], 0.6)])
            .unwrap();

        assert!((state.train_error - 0.5).abs() < 1e-6);
        assert!((state.validation_error - 0.6).abs() < 1e-6);
    }
}
