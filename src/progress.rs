//! Per-generation progress callback.
//!
//! The engine invokes the callback once per generation from
//! [`CmaStrategy::stop`](crate::CmaStrategy::stop) with a read-only view of
//! the run. Returning [`ControlFlow::Break`] ends the run with
//! [`StopReason::UserRequested`](crate::StopReason::UserRequested), which
//! counts as a successful termination.
//!
//! ```
//! use core::ops::ControlFlow;
//!
//! use cmaes_engine::{CmaParameters, CmaStrategy};
//!
//! let params = CmaParameters::builder(&[3.0, 3.0], 1.0).seed(4).build().unwrap();
//! let mut strategy = CmaStrategy::new(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(), params)
//!     .unwrap()
//!     .with_progress(|_, sols| {
//!         if sols.niter >= 4 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//!     });
//! strategy.optimize().unwrap();
//! assert_eq!(strategy.solutions().niter, 4);
//! ```

use core::ops::ControlFlow;

use crate::parameters::CmaParameters;
use crate::solutions::CmaSolutions;

/// Callback consulted once per generation.
pub type ProgressFunc = Box<dyn FnMut(&CmaParameters, &CmaSolutions) -> ControlFlow<()>>;

/// Callback installed when none is supplied.
///
/// Logs the generation, evaluations, best fitness, step size and eigen
/// refresh flag at info level unless the parameters are `quiet`. Never
/// requests a stop.
#[must_use]
pub fn default_progress() -> ProgressFunc {
    Box::new(log_progress)
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn log_progress(parameters: &CmaParameters, solutions: &CmaSolutions) -> ControlFlow<()> {
    if !parameters.quiet() {
        trace_info!(
            iter = solutions.niter,
            evals = solutions.nevals,
            fbest = solutions.best_candidate().map_or(f64::NAN, |c| c.fvalue),
            sigma = solutions.sigma,
            cupdate = solutions.updated_eigen,
            "cma-es generation"
        );
    }
    ControlFlow::Continue(())
}
