use crate::status::Failure;

/// Errors returned by parameter construction and by [`CmaStrategy`](crate::CmaStrategy).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the initial mean vector has no coordinates.
    #[error("invalid dimension: the initial mean must have at least one coordinate")]
    EmptyInitialMean,

    /// Returned when the initial mean contains NaN or infinite coordinates.
    #[error("invalid initial mean: coordinate {index} is not finite ({value})")]
    NonFiniteInitialMean {
        /// Index of the offending coordinate.
        index: usize,
        /// The non-finite value.
        value: f64,
    },

    /// Returned when the initial step size is not a positive finite number.
    #[error("invalid sigma0: {0} must be positive and finite")]
    InvalidSigma(f64),

    /// Returned when the population size is too small.
    #[error("invalid population size: lambda ({0}) must be at least 2")]
    InvalidPopulationSize(usize),

    /// Returned when the parent count is not in `1..=lambda`.
    #[error("invalid parent count: mu ({mu}) must be in 1..={lambda}")]
    InvalidParentCount {
        /// The requested parent count.
        mu: usize,
        /// The population size.
        lambda: usize,
    },

    /// Returned when a fixed coordinate refers to a dimension that does not exist.
    #[error("fixed coordinate {index} out of range for dimension {dim}")]
    FixedIndexOutOfRange {
        /// The requested coordinate index.
        index: usize,
        /// The problem dimension.
        dim: usize,
    },

    /// Returned when a fixed coordinate value is NaN or infinite.
    #[error("fixed coordinate {index} has non-finite value {value}")]
    NonFiniteFixedValue {
        /// The coordinate index.
        index: usize,
        /// The non-finite value.
        value: f64,
    },

    /// Returned when a manual `tell` receives the wrong number of fitness values.
    #[error("fitness count mismatch: expected {expected} values, got {got}")]
    FitnessCountMismatch {
        /// Population size of the current generation.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// Returned when a population handed back to the engine is not the
    /// `dim x lambda` matrix produced by `ask`.
    #[error("population shape mismatch: expected {dim}x{lambda}, got {rows}x{cols}")]
    PopulationShapeMismatch {
        /// Search space dimension.
        dim: usize,
        /// Population size of the current generation.
        lambda: usize,
        /// Rows of the supplied matrix.
        rows: usize,
        /// Columns of the supplied matrix.
        cols: usize,
    },

    /// Returned when the telemetry file cannot be opened.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Returned when a run ends on an unrecoverable failure.
    #[error("run terminated with status {code}: {0}", code = .0.code())]
    Termination(#[from] Failure),
}

pub type Result<T> = core::result::Result<T, Error>;
