use comms::msg::Report;

/// A worker's partial result for one iteration, the owned counterpart of a `Report`.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationResult {
    pub iteration: u32,
    /// The un-normalized sum of the gradients of the worker's training records.
    pub gradient: Vec<f32>,
    pub train_error: f32,
    pub validation_error: f32,
    pub train_size: u64,
    pub validation_size: u64,
}

impl IterationResult {
    /// A result for a partition without records.
    pub fn empty(iteration: u32, len: usize) -> Self {
        Self {
            iteration,
            gradient: vec![0.; len],
            train_error: 0.,
            validation_error: 0.,
            train_size: 0,
            validation_size: 0,
        }
    }

    /// Borrows the result as the message sent back to the master.
    pub fn as_report(&self) -> Report<'_> {
        Report {
            iteration: self.iteration,
            train_error: self.train_error,
            validation_error: self.validation_error,
            train_size: self.train_size,
            validation_size: self.validation_size,
            gradient: &self.gradient,
        }
    }
}

impl From<Report<'_>> for IterationResult {
    fn from(report: Report<'_>) -> Self {
        Self {
            iteration: report.iteration,
            gradient: report.gradient.to_vec(),
            train_error: report.train_error,
            validation_error: report.validation_error,
            train_size: report.train_size,
            validation_size: report.validation_size,
        }
    }
}
