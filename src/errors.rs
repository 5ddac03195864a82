//! The errors that can occur while building, querying or persisting a bank index.
use std::error::Error;
use std::fmt;
use std::io;

pub type GridResult<T> = Result<T, GridError>;

/// Error type for the grid index and its collaborators.
///
/// A query that finds no candidate is not an error; see [`crate::Match`].
#[derive(Debug)]
pub enum GridError {
    /// Malformed or inconsistent options, detected before any index is built.
    Configuration {
        message: String,
    },
    /// A NaN or infinite coordinate, or one whose cell key does not fit an `i64`.
    DegenerateInput {
        coordinate: usize,
        value: f64,
    },
    /// The xi vector does not have the dimensionality this index was built with.
    DimensionMismatch {
        expected: usize,
        found: usize,
    },
    /// Insert after sealing, query before sealing, or build on a built layer.
    BuildStateViolation {
        message: &'static str,
    },
    /// A cutoff frequency outside the discretized range under the `Reject` policy.
    FrequencyOutOfRange {
        frequency: f64,
        min: f64,
        max: f64,
    },
    /// A line of a tabular bank file could not be parsed.
    Parsing {
        file_name: String,
        line_number: usize,
        message: String,
    },
    Io(io::Error),
    Csv(csv::Error),
    Serialization(bincode::Error),
}

impl GridError {
    pub fn configuration<S: Into<String>>(message: S) -> GridError {
        GridError::Configuration {
            message: message.into(),
        }
    }

    pub fn build_state(message: &'static str) -> GridError {
        GridError::BuildStateViolation { message }
    }
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GridError::Configuration { message } => write!(f, "invalid configuration: {message}"),
            GridError::DegenerateInput { coordinate, value } => write!(
                f,
                "coordinate {coordinate} has value {value}, which cannot be binned"
            ),
            GridError::DimensionMismatch { expected, found } => write!(
                f,
                "expected a xi vector with {expected} dimensions, found {found}"
            ),
            GridError::BuildStateViolation { message } => write!(f, "{message}"),
            GridError::FrequencyOutOfRange {
                frequency,
                min,
                max,
            } => write!(
                f,
                "cutoff frequency {frequency} lies outside the discretized range [{min}, {max}]"
            ),
            GridError::Parsing {
                file_name,
                line_number,
                message,
            } => write!(f, "{file_name}:{line_number}: {message}"),
            GridError::Io(e) => write!(f, "{e}"),
            GridError::Csv(e) => write!(f, "{e}"),
            GridError::Serialization(e) => write!(f, "{e}"),
        }
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GridError::Io(e) => Some(e),
            GridError::Csv(e) => Some(e),
            GridError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for GridError {
    fn from(err: io::Error) -> Self {
        GridError::Io(err)
    }
}

impl From<csv::Error> for GridError {
    fn from(err: csv::Error) -> Self {
        GridError::Csv(err)
    }
}

impl From<bincode::Error> for GridError {
    fn from(err: bincode::Error) -> Self {
        GridError::Serialization(err)
    }
}
