use std::num::NonZeroUsize;

use comms::specs::training::TerminationSpec;

/// How far a training has gotten, as seen by the termination policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Completed aggregations.
    pub iterations: usize,
    /// Consecutive aggregations since the selection error last improved.
    pub stale_iterations: usize,
}

/// Decides when the master stops iterating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminationPolicy {
    MaxIterations(NonZeroUsize),
    /// Stops after `patience` aggregations without an improvement of at least `min_delta`, or
    /// at `max_iterations`, whichever comes first.
    Plateau {
        patience: NonZeroUsize,
        min_delta: f32,
        max_iterations: NonZeroUsize,
    },
}

impl TerminationPolicy {
    pub fn from_spec(spec: &TerminationSpec, max_iterations: NonZeroUsize) -> Self {
        match *spec {
            TerminationSpec::MaxIterations => Self::MaxIterations(max_iterations),
            TerminationSpec::Plateau {
                patience,
                min_delta,
            } => Self::Plateau {
                patience,
                min_delta,
                max_iterations,
            },
        }
    }

    /// The improvement the selection error must make to reset the patience.
    pub fn min_delta(&self) -> f32 {
        match self {
            Self::MaxIterations(_) => 0.,
            Self::Plateau { min_delta, .. } => *min_delta,
        }
    }

    pub fn should_terminate(&self, progress: &Progress) -> bool {
        match self {
            Self::MaxIterations(max) => progress.iterations >= max.get(),
            Self::Plateau {
                patience,
                max_iterations,
                ..
            } => {
                progress.iterations >= max_iterations.get()
                    || progress.stale_iterations >= patience.get()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(iterations: usize, stale_iterations: usize) -> Progress {
        Progress {
            iterations,
            stale_iterations,
        }
    }

    #[test]
    fn plateau_stops_on_patience_or_cap() {
        let policy = TerminationPolicy::Plateau {
            patience: NonZeroUsize::new(3).unwrap(),
            min_delta: 0.01,
            max_iterations: NonZeroUsize::new(10).unwrap(),
        };

        assert!(!policy.should_terminate(&progress(4, 2)));
        assert!(policy.should_terminate(&progress(4, 3)));
        assert!(policy.should_terminate(&progress(10, 0)));
    }

    #[test]
    fn spec_without_plateau_caps_iterations() {
        let max = NonZeroUsize::new(5).unwrap();
        let policy = TerminationPolicy::from_spec(&TerminationSpec::MaxIterations, max);

        assert_eq!(policy, TerminationPolicy::MaxIterations(max));
        assert!(!policy.should_terminate(&progress(4, 4)));
        assert!(policy.should_terminate(&progress(5, 0)));
    }
}
