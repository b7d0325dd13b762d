//! Run-status codes: why a run is still going, why it stopped, or why it failed.
//!
//! Every status maps to a stable integer through `code()`: `0` while the
//! run is in progress, a positive value for a named stopping condition,
//! and a negative value for an unrecoverable failure.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named termination condition. Reaching one is a successful stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopReason {
    /// The best fitness of recent generations spans a range below tolerance.
    TolHistFun,
    /// Every coordinate's standard deviation and evolution path is below tolerance.
    TolX,
    /// The step size grew by an implausible factor relative to the largest axis.
    TolUpSigma,
    /// The covariance matrix condition number exploded.
    ConditionCov,
    /// The best and a top-quartile candidate share the same fitness (flat fitness).
    EqualFunVals,
    /// Neither the best nor the median fitness improved over a long window.
    Stagnation,
    /// The automatic generation cap derived from dimension and population was reached.
    AutoMaxIter,
    /// The best fitness reached the configured target.
    FTarget,
    /// A step along a principal axis no longer moves the mean.
    NoEffectAxis,
    /// A step along a coordinate no longer moves the mean.
    NoEffectCoor,
    /// The configured evaluation budget was exhausted.
    MaxFEvals,
    /// The configured generation budget was exhausted.
    MaxIter,
    /// The progress callback requested termination.
    UserRequested,
}

impl StopReason {
    /// All reasons in catalogue order.
    pub const ALL: [Self; 13] = [
        Self::TolHistFun,
        Self::TolX,
        Self::TolUpSigma,
        Self::ConditionCov,
        Self::EqualFunVals,
        Self::Stagnation,
        Self::AutoMaxIter,
        Self::FTarget,
        Self::NoEffectAxis,
        Self::NoEffectCoor,
        Self::MaxFEvals,
        Self::MaxIter,
        Self::UserRequested,
    ];

    /// Positive status code for this reason.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::TolHistFun => 1,
            Self::TolX => 2,
            Self::TolUpSigma => 3,
            Self::ConditionCov => 4,
            Self::EqualFunVals => 5,
            Self::Stagnation => 6,
            Self::AutoMaxIter => 7,
            Self::FTarget => 8,
            Self::NoEffectAxis => 9,
            Self::NoEffectCoor => 10,
            Self::MaxFEvals => 11,
            Self::MaxIter => 12,
            Self::UserRequested => 13,
        }
    }

    /// Short human-readable description.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::TolHistFun => "range of best f-values over history below tolerance",
            Self::TolX => "search distribution collapsed below tolx",
            Self::TolUpSigma => "step size increased by more than tolupsigma",
            Self::ConditionCov => "covariance matrix condition number exceeds 1e14",
            Self::EqualFunVals => "flat fitness: best and top-quartile f-values are equal",
            Self::Stagnation => "no improvement of best and median f-values",
            Self::AutoMaxIter => "automatic maximum number of generations reached",
            Self::FTarget => "target f-value reached",
            Self::NoEffectAxis => "no effect of a principal axis step on the mean",
            Self::NoEffectCoor => "no effect of a coordinate step on the mean",
            Self::MaxFEvals => "maximum number of function evaluations reached",
            Self::MaxIter => "maximum number of generations reached",
            Self::UserRequested => "stopped by the progress callback",
        }
    }
}

impl core::fmt::Display for StopReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.describe())
    }
}

/// An unrecoverable condition. A run never continues past one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Failure {
    /// The covariance matrix storage could not be allocated.
    #[error("out of memory while allocating the covariance matrix")]
    OutOfMemory,
    /// A covariance update produced a matrix that is not positive definite.
    #[error("covariance matrix lost positive definiteness")]
    IndefiniteCovariance,
    /// The fitness function returned NaN.
    #[error("fitness function returned NaN")]
    NonFiniteFitness,
    /// The eigendecomposition produced negative or non-finite eigenvalues.
    #[error("eigendecomposition of the covariance matrix failed")]
    EigenDecomposition,
}

impl Failure {
    /// Negative status code for this failure.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::OutOfMemory => -1,
            Self::IndefiniteCovariance => -2,
            Self::NonFiniteFitness => -3,
            Self::EigenDecomposition => -4,
        }
    }
}

/// State of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunStatus {
    /// The run has not hit any termination condition.
    #[default]
    Running,
    /// The run ended on a named stopping condition.
    Stopped(StopReason),
    /// The run ended on an unrecoverable failure.
    Failed(Failure),
}

impl RunStatus {
    /// Integer status: `0`, the positive reason code, or the negative failure code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Running => 0,
            Self::Stopped(reason) => reason.code(),
            Self::Failed(failure) => failure.code(),
        }
    }

    /// Whether the status records an unrecoverable failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
