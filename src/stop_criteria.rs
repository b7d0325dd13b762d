//! Built-in termination criteria.
//!
//! [`StopCriteria::stop`] is a pure predicate over the current parameters
//! and solutions: it returns the first [`StopReason`] whose condition holds,
//! or `None` to continue. Budget criteria are checked first, then the
//! convergence and degeneracy criteria in order of their codes. Any criterion can
//! be switched off with
//! [`CmaParametersBuilder::disable_stop`](crate::CmaParametersBuilder::disable_stop).

use std::collections::VecDeque;

use crate::parameters::CmaParameters;
use crate::solutions::CmaSolutions;
use crate::status::StopReason;

/// Tolerances of the built-in stopping criteria.
///
/// # Examples
///
/// ```
/// use cmaes_engine::StopCriteria;
///
/// let criteria = StopCriteria::new().tol_hist_fun(1e-9).max_condition(1e12);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct StopCriteria {
    tol_hist_fun: f64,
    tol_x: f64,
    tol_up_sigma: f64,
    max_condition: f64,
}

impl Default for StopCriteria {
    fn default() -> Self {
        Self {
            tol_hist_fun: 1e-12,
            tol_x: 1e-12,
            tol_up_sigma: 1e20,
            max_condition: 1e14,
        }
    }
}

impl StopCriteria {
    /// Criteria with default tolerances.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Range of recent best f-values below which the run stops. Default `1e-12`.
    #[must_use]
    pub const fn tol_hist_fun(mut self, tol: f64) -> Self {
        self.tol_hist_fun = tol;
        self
    }

    /// Distribution width (relative to `sigma0`) below which the run stops. Default `1e-12`.
    #[must_use]
    pub const fn tol_x(mut self, tol: f64) -> Self {
        self.tol_x = tol;
        self
    }

    /// Step-size growth factor above which the run stops. Default `1e20`.
    #[must_use]
    pub const fn tol_up_sigma(mut self, tol: f64) -> Self {
        self.tol_up_sigma = tol;
        self
    }

    /// Covariance condition number above which the run stops. Default `1e14`.
    #[must_use]
    pub const fn max_condition(mut self, max: f64) -> Self {
        self.max_condition = max;
        self
    }

    /// First criterion that holds for the current state, if any.
    #[must_use]
    pub fn stop(&self, parameters: &CmaParameters, solutions: &CmaSolutions) -> Option<StopReason> {
        let checks: [(StopReason, fn(&Self, &CmaParameters, &CmaSolutions) -> bool); 12] = [
            (StopReason::MaxFEvals, Self::max_fevals),
            (StopReason::MaxIter, Self::max_iter),
            (StopReason::FTarget, Self::ftarget),
            (StopReason::TolHistFun, Self::tol_hist_fun_reached),
            (StopReason::TolX, Self::tol_x_reached),
            (StopReason::TolUpSigma, Self::tol_up_sigma_reached),
            (StopReason::ConditionCov, Self::condition_cov),
            (StopReason::EqualFunVals, Self::equal_fun_vals),
            (StopReason::Stagnation, Self::stagnation),
            (StopReason::AutoMaxIter, Self::auto_max_iter),
            (StopReason::NoEffectAxis, Self::no_effect_axis),
            (StopReason::NoEffectCoor, Self::no_effect_coor),
        ];

        checks
            .into_iter()
            .find(|(reason, check)| {
                parameters.stop_enabled(*reason) && check(self, parameters, solutions)
            })
            .map(|(reason, _)| reason)
    }
}

#[allow(clippy::unused_self)]
impl StopCriteria {
    fn max_fevals(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        p.max_fevals().is_some_and(|max| s.nevals >= max)
    }

    fn max_iter(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        p.max_iter().is_some_and(|max| s.generations() >= max)
    }

    fn ftarget(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        match (p.ftarget(), s.best_seen_candidate()) {
            (Some(target), Some(best)) => best.fvalue <= target,
            _ => false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn auto_max_iter(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        let n = p.dim() as f64;
        let limit = 100.0 + 50.0 * (n + 3.0).powi(2) / (p.lambda() as f64).sqrt();
        s.generations() as f64 >= limit
    }

    fn tol_hist_fun_reached(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        let window = hist_window(p);
        let hist = s.best_candidates_hist();
        if hist.len() < window {
            return false;
        }
        let (lo, hi) = hist
            .iter()
            .rev()
            .take(window)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.fvalue), hi.max(c.fvalue))
            });
        hi - lo < self.tol_hist_fun
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    #[allow(clippy::float_cmp)]
    fn equal_fun_vals(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        let k = ((0.1 + p.lambda() as f64 / 4.0).ceil() as usize).min(s.candidates.len().saturating_sub(1));
        match (s.candidates.first(), s.candidates.get(k)) {
            (Some(best), Some(other)) if k > 0 => best.fvalue == other.fvalue,
            _ => false,
        }
    }

    fn tol_x_reached(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        if s.generations() == 0 {
            return false;
        }
        let tol = self.tol_x * p.sigma0();
        let sigma = s.sigma;
        (0..p.dim()).all(|i| {
            sigma * s.cov[(i, i)].sqrt() < tol && sigma * s.pc[i].abs() < tol
        })
    }

    fn tol_up_sigma_reached(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        s.sigma / p.sigma0() > self.tol_up_sigma * s.max_eigenv.sqrt()
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn stagnation(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        let min_window = (120.0 + 30.0 * p.dim() as f64 / p.lambda() as f64).ceil() as usize;
        let generations = s.generations();
        if generations <= min_window {
            return false;
        }
        let window = ((0.2 * generations as f64).ceil() as usize).max(min_window);
        let (best, median) = (s.best_fvalues(), s.median_fvalues());
        if best.len() < window || median.len() < window {
            return false;
        }
        not_improving(best, window) && not_improving(median, window)
    }

    fn condition_cov(&self, _p: &CmaParameters, s: &CmaSolutions) -> bool {
        s.condition_number() > self.max_condition
    }

    #[allow(clippy::float_cmp)]
    fn no_effect_axis(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        if s.generations() == 0 {
            return false;
        }
        let n = p.dim();
        let k = s.niter % n;
        let scale = 0.1 * s.sigma * s.leigenvalues[k].sqrt();
        let axis = s.leigenvectors.column(k);
        (0..n).all(|i| s.xmean[i] == s.xmean[i] + scale * axis[i])
    }

    #[allow(clippy::float_cmp)]
    fn no_effect_coor(&self, p: &CmaParameters, s: &CmaSolutions) -> bool {
        if s.generations() == 0 {
            return false;
        }
        (0..p.dim()).any(|i| {
            let step = 0.2 * s.sigma * s.cov[(i, i)].sqrt();
            s.xmean[i] == s.xmean[i] + step
        })
    }
}

/// Number of generations the best f-value range is measured over.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn hist_window(p: &CmaParameters) -> usize {
    10 + (30.0 * p.dim() as f64 / p.lambda() as f64).ceil() as usize
}

/// Median of the newest 20 values is not below the median of the oldest 20
/// values within the trailing `window`.
fn not_improving(values: &VecDeque<f64>, window: usize) -> bool {
    let start = values.len() - window;
    let oldest: Vec<f64> = values.iter().skip(start).take(20).copied().collect();
    let newest: Vec<f64> = values.iter().skip(values.len() - 20).copied().collect();
    median(oldest) <= median(newest)
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        f64::midpoint(values[mid - 1], values[mid])
    } else {
        values[mid]
    }
}
