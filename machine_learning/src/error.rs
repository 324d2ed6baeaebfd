use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    /// Two buffers that must agree on their length don't, it's never truncated.
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A hyperparameter is outside of its valid range.
    InvalidArgument { what: &'static str, value: f64 },
    InvalidTopology(String),
    /// A NaN or infinite value showed up during computation.
    NonFinite { what: &'static str, index: usize },
    Distribution(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "dimension mismatch in {what}: got {got}, expected {expected}"
            ),
            MlErr::InvalidArgument { what, value } => {
                write!(f, "invalid value for {what}: {value}")
            }
            MlErr::InvalidTopology(detail) => write!(f, "invalid topology: {detail}"),
            MlErr::NonFinite { what, index } => {
                write!(f, "non finite value in {what} at index {index}")
            }
            MlErr::Distribution(detail) => write!(f, "invalid distribution: {detail}"),
        }
    }
}

impl Error for MlErr {}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Distribution(value.to_string())
    }
}
