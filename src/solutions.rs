//! Mutable run state of one CMA-ES run.
//!
//! [`CmaSolutions`] is owned by the [`CmaStrategy`](crate::CmaStrategy). The
//! engine is its only writer apart from the covariance update policy, which
//! adapts the mean, covariance, step size and evolution paths in place.

use std::collections::VecDeque;
use std::time::Duration;

use nalgebra::{DMatrix, DVector};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::parameters::CmaParameters;
use crate::status::{Failure, RunStatus};

/// Cap on the best/median fitness histories used for stagnation detection.
pub(crate) const FVALUE_HISTORY_CAP: usize = 20_000;

/// Wall-clock time spent in each phase of the latest generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseTimings {
    /// Time spent sampling the population.
    pub ask: Duration,
    /// Time spent evaluating the population.
    pub eval: Duration,
    /// Time spent ranking and updating the distribution.
    pub tell: Duration,
    /// Time spent in the stop check.
    pub stop: Duration,
    /// Wall time of the whole latest generation.
    pub last_iter: Duration,
}

/// State of the search distribution and run bookkeeping.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CmaSolutions {
    /// Current distribution mean.
    pub xmean: DVector<f64>,
    /// Current covariance matrix (only its diagonal is adapted in separable mode).
    pub cov: DMatrix<f64>,
    /// Current step size.
    pub sigma: f64,
    /// Evolution path of the step-size control.
    pub psigma: DVector<f64>,
    /// Evolution path of the rank-one update.
    pub pc: DVector<f64>,
    /// Candidates of the current generation, ranked after `tell`.
    pub candidates: Vec<Candidate>,
    /// Eigenvalues of the covariance at the last refresh.
    pub leigenvalues: DVector<f64>,
    /// Eigenvectors of the covariance at the last refresh (columns).
    pub leigenvectors: DMatrix<f64>,
    /// Largest cached eigenvalue.
    pub max_eigenv: f64,
    /// Smallest cached eigenvalue.
    pub min_eigenv: f64,
    /// Generation at which the eigendecomposition was last refreshed.
    pub eigeniter: usize,
    /// Whether the latest `ask` refreshed the eigendecomposition.
    pub updated_eigen: bool,
    /// Index of the latest completed generation.
    pub niter: usize,
    /// Cumulative number of fitness evaluations.
    pub nevals: usize,
    /// Phase timings of the latest generation.
    pub elapsed: PhaseTimings,
    best_candidates_hist: VecDeque<Candidate>,
    hist_capacity: usize,
    best_fvalues: VecDeque<f64>,
    median_fvalues: VecDeque<f64>,
    best_seen: Option<(Candidate, usize)>,
    run_status: RunStatus,
}

impl CmaSolutions {
    /// Initial state: mean `x0`, identity covariance, step size `sigma0`.
    ///
    /// The covariance storage is reserved fallibly; if it cannot be
    /// allocated the solutions carry [`Failure::OutOfMemory`] as run status
    /// and empty matrices.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(parameters: &CmaParameters) -> Self {
        let n = parameters.dim();
        let hist_capacity =
            10 + (30.0 * n as f64 / parameters.lambda() as f64).ceil() as usize;

        let (cov, leigenvectors, run_status) =
            match (try_identity(n), try_identity(n)) {
                (Some(cov), Some(vectors)) => (cov, vectors, RunStatus::Running),
                _ => (
                    DMatrix::zeros(0, 0),
                    DMatrix::zeros(0, 0),
                    RunStatus::Failed(Failure::OutOfMemory),
                ),
            };

        Self {
            xmean: parameters.x0().clone(),
            cov,
            sigma: parameters.sigma0(),
            psigma: DVector::zeros(n),
            pc: DVector::zeros(n),
            candidates: Vec::with_capacity(parameters.lambda()),
            leigenvalues: DVector::from_element(n, 1.0),
            leigenvectors,
            max_eigenv: 1.0,
            min_eigenv: 1.0,
            eigeniter: 0,
            updated_eigen: false,
            niter: 0,
            nevals: 0,
            elapsed: PhaseTimings::default(),
            best_candidates_hist: VecDeque::with_capacity(hist_capacity),
            hist_capacity,
            best_fvalues: VecDeque::new(),
            median_fvalues: VecDeque::new(),
            best_seen: None,
            run_status,
        }
    }

    /// Rank the current candidates by ascending fitness.
    ///
    /// The sort is stable, so ties keep their sampling order.
    pub fn sort_candidates(&mut self) {
        self.candidates
            .sort_by(|a, b| a.fvalue.total_cmp(&b.fvalue));
    }

    /// Record the best (and median) candidate of the ranked generation.
    pub fn update_best_candidates(&mut self, generation: usize) {
        let Some(best) = self.candidates.first() else {
            return;
        };

        if self.best_candidates_hist.len() == self.hist_capacity {
            self.best_candidates_hist.pop_front();
        }
        self.best_candidates_hist.push_back(best.clone());

        let median = self.candidates[self.candidates.len() / 2].fvalue;
        push_bounded(&mut self.best_fvalues, best.fvalue);
        push_bounded(&mut self.median_fvalues, median);

        let improved = self
            .best_seen
            .as_ref()
            .is_none_or(|(seen, _)| best.fvalue < seen.fvalue);
        if improved {
            self.best_seen = Some((best.clone(), generation));
        }
    }

    /// Cache an eigendecomposition (or its diagonal substitute).
    pub fn update_eigenv(&mut self, eigenvalues: DVector<f64>, eigenvectors: DMatrix<f64>) {
        self.update_eigenvalues(eigenvalues);
        self.leigenvectors = eigenvectors;
    }

    /// Cache eigenvalues only, keeping the current eigenvectors.
    ///
    /// Used in separable mode, where the eigenvectors stay the identity.
    pub fn update_eigenvalues(&mut self, eigenvalues: DVector<f64>) {
        self.max_eigenv = eigenvalues.max();
        self.min_eigenv = eigenvalues.min();
        self.leigenvalues = eigenvalues;
    }

    /// Best candidate of the latest generation.
    #[must_use]
    pub fn best_candidate(&self) -> Option<&Candidate> {
        self.best_candidates_hist.back()
    }

    /// Best candidate found so far across all generations.
    #[must_use]
    pub fn best_seen_candidate(&self) -> Option<&Candidate> {
        self.best_seen.as_ref().map(|(c, _)| c)
    }

    /// Generation at which the best-ever candidate was found.
    #[must_use]
    pub fn best_seen_generation(&self) -> Option<usize> {
        self.best_seen.as_ref().map(|&(_, g)| g)
    }

    /// Bounded history of best-per-generation candidates, oldest first.
    #[must_use]
    pub const fn best_candidates_hist(&self) -> &VecDeque<Candidate> {
        &self.best_candidates_hist
    }

    /// Best fitness per generation, oldest first.
    #[must_use]
    pub const fn best_fvalues(&self) -> &VecDeque<f64> {
        &self.best_fvalues
    }

    /// Median fitness per generation, oldest first.
    #[must_use]
    pub const fn median_fvalues(&self) -> &VecDeque<f64> {
        &self.median_fvalues
    }

    /// Number of completed generations.
    #[must_use]
    pub fn generations(&self) -> usize {
        if self.best_candidates_hist.is_empty() {
            0
        } else {
            self.niter + 1
        }
    }

    /// Smallest cached eigenvalue of the covariance.
    #[must_use]
    pub const fn min_eigenvalue(&self) -> f64 {
        self.min_eigenv
    }

    /// Ratio of largest to smallest cached eigenvalue.
    #[must_use]
    pub fn condition_number(&self) -> f64 {
        self.max_eigenv / self.min_eigenv
    }

    /// Square roots of the covariance diagonal: the per-axis deviations before step-size scaling.
    #[must_use]
    pub fn axis_deviations(&self) -> DVector<f64> {
        self.cov.diagonal().map(f64::sqrt)
    }

    /// Current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.run_status
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.run_status = status;
    }
}

fn push_bounded(queue: &mut VecDeque<f64>, value: f64) {
    if queue.len() == FVALUE_HISTORY_CAP {
        queue.pop_front();
    }
    queue.push_back(value);
}

/// Allocate an `rows x cols` zero matrix without aborting on allocation failure.
pub(crate) fn try_zeros(rows: usize, cols: usize) -> Option<DMatrix<f64>> {
    let len = rows.checked_mul(cols)?;
    let mut data = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, 0.0);
    Some(DMatrix::from_vec(rows, cols, data))
}

fn try_identity(n: usize) -> Option<DMatrix<f64>> {
    let mut m = try_zeros(n, n)?;
    m.fill_diagonal(1.0);
    Some(m)
}
