//! Run parameters: problem dimension, population sizing, learning rates and
//! the knobs that steer the strategy engine.
//!
//! Parameters are set once through [`CmaParametersBuilder`] and are read-only
//! for the whole run. Learning rates follow Hansen's tutorial defaults.
//!
//! # Examples
//!
//! ```
//! use cmaes_engine::{CmaParameters, UpdateFlavor};
//!
//! let params = CmaParameters::builder(&[1.0, 2.0, 3.0], 0.5)
//!     .population_size(12)
//!     .flavor(UpdateFlavor::Active)
//!     .seed(7)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.dim(), 3);
//! assert_eq!(params.lambda(), 12);
//! assert_eq!(params.mu(), 6);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nalgebra::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::StopReason;

/// Which covariance update policy drives the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpdateFlavor {
    /// Rank-one plus rank-mu update from the best `mu` candidates.
    #[default]
    Standard,
    /// Standard update plus a negatively weighted term from the worst candidates.
    Active,
}

/// Immutable configuration of one CMA-ES run.
#[derive(Clone, Debug)]
pub struct CmaParameters {
    x0: DVector<f64>,
    dim: usize,
    lambda: usize,
    mu: usize,
    /// Positive recombination weights, length `mu`, summing to 1.
    weights: DVector<f64>,
    /// Non-positive weights for ranks `mu..lambda`, used by the active update.
    negative_weights: DVector<f64>,
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_c: f64,
    c1: f64,
    c_mu: f64,
    chi_n: f64,
    sigma0: f64,
    lazy_update: bool,
    lazy_threshold: usize,
    separable: bool,
    flavor: UpdateFlavor,
    seed: u64,
    fixed: BTreeMap<usize, f64>,
    telemetry_path: Option<PathBuf>,
    quiet: bool,
    max_iter: Option<usize>,
    max_fevals: Option<usize>,
    ftarget: Option<f64>,
    disabled_stops: Vec<StopReason>,
}

impl CmaParameters {
    /// Parameters with all defaults for the given starting point and step size.
    ///
    /// # Errors
    ///
    /// See [`CmaParametersBuilder::build`].
    pub fn new(x0: &[f64], sigma0: f64) -> Result<Self> {
        Self::builder(x0, sigma0).build()
    }

    /// Creates a builder starting the search at `x0` with step size `sigma0`.
    #[must_use]
    pub fn builder(x0: &[f64], sigma0: f64) -> CmaParametersBuilder {
        CmaParametersBuilder::new(x0, sigma0)
    }

    /// Initial mean (genotype space).
    #[must_use]
    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Problem dimension `n`.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Population size `lambda`.
    #[must_use]
    pub const fn lambda(&self) -> usize {
        self.lambda
    }

    /// Number of selected parents `mu`.
    #[must_use]
    pub const fn mu(&self) -> usize {
        self.mu
    }

    /// Positive recombination weights (length `mu`).
    #[must_use]
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Negative weights for ranks `mu..lambda` (length `lambda - mu`).
    #[must_use]
    pub fn negative_weights(&self) -> &DVector<f64> {
        &self.negative_weights
    }

    /// Variance effective selection mass.
    #[must_use]
    pub const fn mu_eff(&self) -> f64 {
        self.mu_eff
    }

    /// Cumulation rate of the step-size path.
    #[must_use]
    pub const fn c_sigma(&self) -> f64 {
        self.c_sigma
    }

    /// Step-size damping.
    #[must_use]
    pub const fn d_sigma(&self) -> f64 {
        self.d_sigma
    }

    /// Cumulation rate of the rank-one path.
    #[must_use]
    pub const fn c_c(&self) -> f64 {
        self.c_c
    }

    /// Rank-one learning rate.
    #[must_use]
    pub const fn c1(&self) -> f64 {
        self.c1
    }

    /// Rank-mu learning rate.
    #[must_use]
    pub const fn c_mu(&self) -> f64 {
        self.c_mu
    }

    /// Expected norm of an `n`-dimensional standard normal vector.
    #[must_use]
    pub const fn chi_n(&self) -> f64 {
        self.chi_n
    }

    /// Initial step size.
    #[must_use]
    pub const fn sigma0(&self) -> f64 {
        self.sigma0
    }

    /// Whether eigendecompositions may be reused across generations.
    #[must_use]
    pub const fn lazy_update(&self) -> bool {
        self.lazy_update
    }

    /// Number of generations an eigendecomposition may be reused before a refresh.
    #[must_use]
    pub const fn lazy_threshold(&self) -> usize {
        self.lazy_threshold
    }

    /// Whether the covariance is restricted to its diagonal.
    #[must_use]
    pub const fn separable(&self) -> bool {
        self.separable
    }

    /// The covariance update policy.
    #[must_use]
    pub const fn flavor(&self) -> UpdateFlavor {
        self.flavor
    }

    /// Seed of the sampling stream.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Frozen coordinates, by index.
    #[must_use]
    pub const fn fixed(&self) -> &BTreeMap<usize, f64> {
        &self.fixed
    }

    /// Path of the telemetry file, if any.
    #[must_use]
    pub fn telemetry_path(&self) -> Option<&Path> {
        self.telemetry_path.as_deref()
    }

    /// Whether progress logging is suppressed.
    #[must_use]
    pub const fn quiet(&self) -> bool {
        self.quiet
    }

    /// Generation budget.
    #[must_use]
    pub const fn max_iter(&self) -> Option<usize> {
        self.max_iter
    }

    /// Function evaluation budget.
    #[must_use]
    pub const fn max_fevals(&self) -> Option<usize> {
        self.max_fevals
    }

    /// Target fitness value.
    #[must_use]
    pub const fn ftarget(&self) -> Option<f64> {
        self.ftarget
    }

    /// Whether the given stopping criterion is active.
    #[must_use]
    pub fn stop_enabled(&self, reason: StopReason) -> bool {
        !self.disabled_stops.contains(&reason)
    }
}

/// Builder for [`CmaParameters`].
///
/// All options have sensible defaults:
/// - `population_size`: `4 + floor(3 * ln(n))`
/// - `mu`: `lambda / 2`
/// - `seed`: random, recorded in the built parameters
/// - `lazy_update`: off, with threshold `floor(1 / ((c1 + c_mu) * n * 10))`
/// - `flavor`: [`UpdateFlavor::Standard`]
#[derive(Debug, Clone)]
pub struct CmaParametersBuilder {
    x0: Vec<f64>,
    sigma0: f64,
    lambda: Option<usize>,
    mu: Option<usize>,
    seed: Option<u64>,
    lazy_update: bool,
    lazy_threshold: Option<usize>,
    separable: bool,
    flavor: UpdateFlavor,
    fixed: BTreeMap<usize, f64>,
    telemetry_path: Option<PathBuf>,
    quiet: bool,
    max_iter: Option<usize>,
    max_fevals: Option<usize>,
    ftarget: Option<f64>,
    disabled_stops: Vec<StopReason>,
}

impl CmaParametersBuilder {
    /// Creates a builder starting the search at `x0` with step size `sigma0`.
    #[must_use]
    pub fn new(x0: &[f64], sigma0: f64) -> Self {
        Self {
            x0: x0.to_vec(),
            sigma0,
            lambda: None,
            mu: None,
            seed: None,
            lazy_update: false,
            lazy_threshold: None,
            separable: false,
            flavor: UpdateFlavor::Standard,
            fixed: BTreeMap::new(),
            telemetry_path: None,
            quiet: false,
            max_iter: None,
            max_fevals: None,
            ftarget: None,
            disabled_stops: Vec::new(),
        }
    }

    /// Sets the population size (lambda).
    #[must_use]
    pub fn population_size(mut self, lambda: usize) -> Self {
        self.lambda = Some(lambda);
        self
    }

    /// Sets the number of selected parents (mu).
    #[must_use]
    pub fn mu(mut self, mu: usize) -> Self {
        self.mu = Some(mu);
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables or disables reuse of eigendecompositions across generations.
    #[must_use]
    pub fn lazy_update(mut self, enabled: bool) -> Self {
        self.lazy_update = enabled;
        self
    }

    /// Sets how many generations an eigendecomposition may go stale.
    ///
    /// Only consulted when lazy updates are enabled.
    #[must_use]
    pub fn lazy_threshold(mut self, generations: usize) -> Self {
        self.lazy_threshold = Some(generations);
        self
    }

    /// Restricts the covariance to its diagonal (sep-CMA-ES).
    #[must_use]
    pub fn separable(mut self, enabled: bool) -> Self {
        self.separable = enabled;
        self
    }

    /// Selects the covariance update policy.
    #[must_use]
    pub fn flavor(mut self, flavor: UpdateFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Freezes coordinate `index` at `value` in every sampled candidate.
    #[must_use]
    pub fn fix(mut self, index: usize, value: f64) -> Self {
        self.fixed.insert(index, value);
        self
    }

    /// Appends one line of progress data per generation to `path`.
    #[must_use]
    pub fn telemetry_path(mut self, path: impl AsRef<Path>) -> Self {
        self.telemetry_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Suppresses progress logging.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Stops after this many generations.
    #[must_use]
    pub fn max_iter(mut self, generations: usize) -> Self {
        self.max_iter = Some(generations);
        self
    }

    /// Stops after this many function evaluations.
    #[must_use]
    pub fn max_fevals(mut self, evaluations: usize) -> Self {
        self.max_fevals = Some(evaluations);
        self
    }

    /// Stops once the best fitness is at or below `target`.
    #[must_use]
    pub fn ftarget(mut self, target: f64) -> Self {
        self.ftarget = Some(target);
        self
    }

    /// Disables one built-in stopping criterion.
    #[must_use]
    pub fn disable_stop(mut self, reason: StopReason) -> Self {
        if !self.disabled_stops.contains(&reason) {
            self.disabled_stops.push(reason);
        }
        self
    }

    /// Validates the configuration and derives all strategy constants.
    ///
    /// # Errors
    ///
    /// Returns an error if `x0` is empty or not finite, `sigma0` is not
    /// positive and finite, `lambda < 2`, `mu` is outside `1..=lambda`, or a
    /// fixed coordinate is out of range or not finite.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn build(self) -> Result<CmaParameters> {
        let n = self.x0.len();
        if n == 0 {
            return Err(Error::EmptyInitialMean);
        }
        if let Some((index, &value)) = self.x0.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteInitialMean { index, value });
        }
        if !(self.sigma0.is_finite() && self.sigma0 > 0.0) {
            return Err(Error::InvalidSigma(self.sigma0));
        }
        for (&index, &value) in &self.fixed {
            if index >= n {
                return Err(Error::FixedIndexOutOfRange { index, dim: n });
            }
            if !value.is_finite() {
                return Err(Error::NonFiniteFixedValue { index, value });
            }
        }

        let n_f = n as f64;

        let lambda = self
            .lambda
            .unwrap_or_else(|| 4 + (3.0 * n_f.ln()).max(0.0).floor() as usize);
        if lambda < 2 {
            return Err(Error::InvalidPopulationSize(lambda));
        }
        let mu = self.mu.unwrap_or(lambda / 2);
        if mu == 0 || mu > lambda {
            return Err(Error::InvalidParentCount { mu, lambda });
        }

        // Log-linear raw weights over all ranks; the first mu are positive.
        let log_half_lambda = f64::midpoint(lambda as f64, 1.0).ln();
        let raw: Vec<f64> = (0..lambda)
            .map(|i| log_half_lambda - ((i + 1) as f64).ln())
            .collect();

        let positive: Vec<f64> = raw.iter().take(mu).map(|w| w.max(0.0)).collect();
        let w_sum: f64 = positive.iter().sum();
        let weights = if w_sum > 0.0 {
            DVector::from_iterator(mu, positive.iter().map(|w| w / w_sum))
        } else {
            DVector::from_element(mu, 1.0 / mu as f64)
        };
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (n_f + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (n_f + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / n_f) / (n_f + 4.0 + 2.0 * mu_eff / n_f);
        let mut c1 = 2.0 / ((n_f + 1.3).powi(2) + mu_eff);
        let mut c_mu =
            ((2.0 * (mu_eff - 2.0 + 1.0 / mu_eff)) / ((n_f + 2.0).powi(2) + mu_eff)).min(1.0 - c1);
        if self.separable {
            let boost = (n_f + 2.0) / 3.0;
            c1 = (c1 * boost).min(1.0);
            c_mu = (c_mu * boost).min(1.0 - c1);
        }
        let c_mu = c_mu.max(0.0);

        let chi_n = n_f.sqrt() * (1.0 - 1.0 / (4.0 * n_f) + 1.0 / (21.0 * n_f * n_f));

        let negative_weights = negative_weights(&raw[mu..], n_f, mu_eff, c1, c_mu);

        let lazy_threshold = self.lazy_threshold.unwrap_or_else(|| {
            let v = 1.0 / ((c1 + c_mu) * n_f * 10.0);
            if v.is_finite() { v.floor() as usize } else { 0 }
        });

        let seed = self.seed.unwrap_or_else(|| fastrand::u64(..));

        Ok(CmaParameters {
            x0: DVector::from_vec(self.x0),
            dim: n,
            lambda,
            mu,
            weights,
            negative_weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c1,
            c_mu,
            chi_n,
            sigma0: self.sigma0,
            lazy_update: self.lazy_update,
            lazy_threshold,
            separable: self.separable,
            flavor: self.flavor,
            seed,
            fixed: self.fixed,
            telemetry_path: self.telemetry_path,
            quiet: self.quiet,
            max_iter: self.max_iter,
            max_fevals: self.max_fevals,
            ftarget: self.ftarget,
            disabled_stops: self.disabled_stops,
        })
    }
}

/// Scale the raw weights of the worst ranks so their absolute sum matches
/// the tightest of the three active-CMA bounds.
fn negative_weights(raw: &[f64], n: f64, mu_eff: f64, c1: f64, c_mu: f64) -> DVector<f64> {
    let neg: Vec<f64> = raw.iter().map(|w| w.min(0.0)).collect();
    let abs_sum: f64 = neg.iter().map(|w| -w).sum();
    let sq_sum: f64 = neg.iter().map(|w| w * w).sum();
    if abs_sum <= 0.0 || sq_sum <= 0.0 {
        return DVector::zeros(neg.len());
    }

    let mu_eff_minus = abs_sum * abs_sum / sq_sum;
    let alpha_mu = if c_mu > 0.0 { 1.0 + c1 / c_mu } else { f64::INFINITY };
    let alpha_mu_eff = 1.0 + 2.0 * mu_eff_minus / (mu_eff + 2.0);
    let alpha_posdef = if c_mu > 0.0 {
        (1.0 - c1 - c_mu) / (n * c_mu)
    } else {
        f64::INFINITY
    };
    let scale = alpha_mu.min(alpha_mu_eff).min(alpha_posdef) / abs_sum;

    DVector::from_iterator(neg.len(), neg.into_iter().map(|w| w * scale))
}
