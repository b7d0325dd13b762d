//! The [`FitnessFunction`] trait defines what gets minimized.
//!
//! Plain closures over a coordinate slice work directly:
//!
//! ```
//! use cmaes_engine::{CmaParameters, cmaes};
//!
//! let params = CmaParameters::builder(&[1.0, 1.0], 0.5)
//!     .seed(1)
//!     .quiet(true)
//!     .build()
//!     .unwrap();
//! let sols = cmaes(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(), params).unwrap();
//! assert!(sols.best_seen_candidate().unwrap().fvalue < 1e-8);
//! ```
//!
//! For stateful objectives, implement the trait on a struct:
//!
//! ```
//! use cmaes_engine::FitnessFunction;
//!
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl FitnessFunction for Rosenbrock {
//!     fn evaluate(&self, x: &[f64]) -> f64 {
//!         x.windows(2)
//!             .map(|w| (self.a - w[0]).powi(2) + self.b * (w[1] - w[0] * w[0]).powi(2))
//!             .sum()
//!     }
//! }
//!
//! let f = Rosenbrock { a: 1.0, b: 100.0 };
//! assert_eq!(f.evaluate(&[1.0, 1.0, 1.0]), 0.0);
//! ```

/// Scalar objective over phenotype coordinates; lower is better.
///
/// Implementations must be deterministic for identical inputs when runs are
/// expected to be reproducible. Returning NaN ends the run with
/// [`Failure::NonFiniteFitness`](crate::Failure::NonFiniteFitness); infinite
/// values are allowed and rank last (or first, for `-inf`).
pub trait FitnessFunction {
    /// Evaluate one candidate.
    fn evaluate(&self, x: &[f64]) -> f64;
}

impl<F> FitnessFunction for F
where
    F: Fn(&[f64]) -> f64,
{
    fn evaluate(&self, x: &[f64]) -> f64 {
        self(x)
    }
}
