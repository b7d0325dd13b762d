use nalgebra::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One sampled point in genotype space and its fitness.
///
/// The fitness is `NaN` until the candidate has been evaluated.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    /// Genotype-space coordinates.
    pub x: DVector<f64>,
    /// Objective value; lower is better.
    pub fvalue: f64,
}

impl Candidate {
    /// Creates a candidate with a known fitness.
    #[must_use]
    pub fn new(x: DVector<f64>, fvalue: f64) -> Self {
        Self { x, fvalue }
    }

    /// Creates a candidate that has not been evaluated yet.
    #[must_use]
    pub fn unevaluated(x: DVector<f64>) -> Self {
        Self { x, fvalue: f64::NAN }
    }
}
