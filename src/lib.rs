#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]
#![allow(clippy::many_single_char_names, clippy::similar_names)]

//! Covariance Matrix Adaptation Evolution Strategy (CMA-ES) for derivative-free
//! minimization of a scalar function over a real vector.
//!
//! The engine runs one single-population CMA-ES: each generation it samples
//! `lambda` candidates from `N(m, sigma^2 C)`, ranks them by fitness, and adapts
//! the mean, covariance and step size. The expensive eigendecomposition of `C`
//! can be reused across generations (lazy update), skipped entirely in
//! separable (diagonal) mode, and the covariance update comes in a standard and
//! an active flavor.
//!
//! # Getting Started
//!
//! ```
//! use cmaes_engine::prelude::*;
//!
//! let params = CmaParameters::builder(&[5.0; 5], 1.0)
//!     .seed(7)
//!     .quiet(true)
//!     .build()
//!     .unwrap();
//!
//! let sols = cmaes(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(), params).unwrap();
//! let best = sols.best_seen_candidate().unwrap();
//! assert!(best.fvalue < 1e-10);
//! println!("stopped with {:?} after {} evaluations", sols.status(), sols.nevals);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`CmaParameters`] | Immutable run configuration and derived learning rates, built with [`CmaParametersBuilder`]. |
//! | [`CmaStrategy`] | The engine: `ask`, `eval`, `tell`, `stop`, or `optimize` for the whole loop. |
//! | [`CmaSolutions`] | Mutable run state: distribution, histories, counters, timings, [`RunStatus`]. |
//! | [`GaussianSampler`] | Seeded multivariate normal sampler over the cached eigendecomposition. |
//! | [`CovarianceUpdate`] | Pluggable adaptation policy: [`StandardUpdate`] or [`ActiveUpdate`]. |
//! | [`StopCriteria`] | Built-in termination tests, each identified by a [`StopReason`]. |
//! | [`GenoPheno`] | Optional mapping applied to candidates before evaluation. |
//!
//! # Run status
//!
//! Every run ends with a [`RunStatus`] whose `code()` is `0` while running,
//! positive for a [`StopReason`] (a successful stop, including a stop
//! requested by the progress callback) and negative for a [`Failure`].
//! Failures are sticky: once recorded, the next stop check ends the run and
//! [`CmaStrategy::optimize`] returns [`Error::Termination`].
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on [`CmaSolutions`], [`Candidate`], [`RunStatus`] and friends | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at run start, per generation and on termination | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

mod candidate;
mod error;
pub mod fitness;
pub mod genopheno;
mod parameters;
pub mod progress;
mod sampler;
mod solutions;
mod status;
pub mod stop_criteria;
mod strategy;
pub mod telemetry;
pub mod update;

pub use candidate::Candidate;
pub use error::{Error, Result};
pub use fitness::FitnessFunction;
pub use genopheno::{GenoPheno, NoTransform};
pub use parameters::{CmaParameters, CmaParametersBuilder, UpdateFlavor};
pub use progress::{ProgressFunc, default_progress};
pub use sampler::GaussianSampler;
pub use solutions::{CmaSolutions, PhaseTimings};
pub use status::{Failure, RunStatus, StopReason};
pub use stop_criteria::StopCriteria;
pub use strategy::{CmaStrategy, cmaes};
pub use telemetry::TelemetryWriter;
pub use update::{ActiveUpdate, CovarianceUpdate, StandardUpdate};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use cmaes_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::candidate::Candidate;
    pub use crate::error::{Error, Result};
    pub use crate::fitness::FitnessFunction;
    pub use crate::genopheno::{GenoPheno, NoTransform};
    pub use crate::parameters::{CmaParameters, CmaParametersBuilder, UpdateFlavor};
    pub use crate::solutions::CmaSolutions;
    pub use crate::status::{Failure, RunStatus, StopReason};
    pub use crate::stop_criteria::StopCriteria;
    pub use crate::strategy::{CmaStrategy, cmaes};
    pub use crate::update::{ActiveUpdate, CovarianceUpdate, StandardUpdate};
}
