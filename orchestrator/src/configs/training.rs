use comms::specs::training::{TerminationSpec, TrainingSpec};

use crate::{OrchestratorError, Result};

fn invalid<T>(msg: String) -> Result<T> {
    Err(OrchestratorError::InvalidConfig(msg))
}

/// Checks the ranges of the training hyperparameters.
pub fn validate_training(spec: &TrainingSpec) -> Result<()> {
    if !(spec.learning_rate.is_finite() && spec.learning_rate > 0.) {
        return invalid(format!("learning rate {} must be positive", spec.learning_rate));
    }

    if !(spec.sample_rate > 0. && spec.sample_rate <= 1.) {
        return invalid(format!("sample rate {} out of (0, 1]", spec.sample_rate));
    }

    if !(0. ..1.).contains(&spec.cross_validation_rate) {
        return invalid(format!(
            "cross validation rate {} out of [0, 1)",
            spec.cross_validation_rate
        ));
    }

    let topology = &spec.topology;
    if topology.inputs == 0 || topology.hidden.iter().any(|layer| layer.nodes == 0) {
        return invalid("every layer needs at least one node".into());
    }

    // Records carry a single target.
    if topology.outputs != 1 {
        return invalid(format!("the network must have 1 output, got {}", topology.outputs));
    }

    if let TerminationSpec::Plateau { min_delta, .. } = spec.termination
        && !(min_delta.is_finite() && min_delta >= 0.)
    {
        return invalid(format!("plateau min delta {min_delta} must be non negative"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TrainingSpec {
        serde_json::from_str(
            r#"{
                "topology": { "inputs": 2, "outputs": 1 },
                "learning_rate": 0.1,
                "max_iterations": 10,
                "bagging_count": 1,
                "sample_rate": 0.5,
                "cross_validation_rate": 0.0
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_sane_hyperparameters() {
        assert!(validate_training(&spec()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_hyperparameters() {
        let mut s = spec();
        s.learning_rate = 0.;
        assert!(validate_training(&s).is_err());

        let mut s = spec();
        s.sample_rate = 1.5;
        assert!(validate_training(&s).is_err());

        let mut s = spec();
        s.cross_validation_rate = 1.;
        assert!(validate_training(&s).is_err());

        let mut s = spec();
        s.topology.outputs = 2;
        assert!(validate_training(&s).is_err());
    }
}
