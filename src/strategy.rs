//! The generational engine: ask, evaluate, tell, stop.
//!
//! [`CmaStrategy`] owns the parameters, the run state, the sampler and the
//! covariance update policy. [`CmaStrategy::optimize`] drives the loop to
//! completion; the individual steps are public for callers who evaluate
//! populations themselves (for instance in parallel):
//!
//! ```
//! use cmaes_engine::{CmaParameters, CmaStrategy};
//!
//! let params = CmaParameters::builder(&[2.0, -1.0, 0.5], 0.8)
//!     .seed(11)
//!     .quiet(true)
//!     .build()
//!     .unwrap();
//! let sphere = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
//! let mut strategy = CmaStrategy::new(sphere, params).unwrap();
//!
//! while !strategy.stop() {
//!     let population = strategy.ask();
//!     let fvalues: Vec<f64> = population
//!         .column_iter()
//!         .map(|c| c.iter().map(|v| v * v).sum())
//!         .collect();
//!     strategy.set_fvalues(&population, &fvalues).unwrap();
//!     strategy.tell();
//!     strategy.inc_iter();
//! }
//! assert!(strategy.solutions().best_seen_candidate().unwrap().fvalue < 1e-8);
//! ```

use core::ops::ControlFlow;
use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::candidate::Candidate;
use crate::error::{Error, Result};
use crate::fitness::FitnessFunction;
use crate::genopheno::{GenoPheno, NoTransform};
use crate::parameters::CmaParameters;
use crate::progress::{ProgressFunc, default_progress};
use crate::sampler::GaussianSampler;
use crate::solutions::CmaSolutions;
use crate::status::{Failure, RunStatus, StopReason};
use crate::stop_criteria::StopCriteria;
use crate::telemetry::TelemetryWriter;
use crate::update::{CovarianceUpdate, policy_for};

/// One CMA-ES run over a fitness function `F`.
pub struct CmaStrategy<F> {
    parameters: CmaParameters,
    solutions: CmaSolutions,
    sampler: GaussianSampler,
    update: Box<dyn CovarianceUpdate>,
    criteria: StopCriteria,
    fitness: F,
    genopheno: Box<dyn GenoPheno>,
    progress: ProgressFunc,
    telemetry: Option<TelemetryWriter>,
    niter: usize,
    iter_start: Option<Instant>,
    evaluated: bool,
    last_checked: Option<usize>,
}

impl<F: FitnessFunction> CmaStrategy<F> {
    /// Set up a run: identity transform, default progress logging, and the
    /// update policy selected by the parameters' flavor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Telemetry`] if a telemetry path is configured and
    /// the file cannot be opened.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn new(fitness: F, parameters: CmaParameters) -> Result<Self> {
        let telemetry = parameters
            .telemetry_path()
            .map(TelemetryWriter::open)
            .transpose()?;
        let solutions = CmaSolutions::new(&parameters);
        let mut sampler = GaussianSampler::new(parameters.dim(), parameters.seed());
        sampler.set_mean(&solutions.xmean);

        trace_info!(
            dim = parameters.dim(),
            lambda = parameters.lambda(),
            mu = parameters.mu(),
            mu_eff = parameters.mu_eff(),
            sigma0 = parameters.sigma0(),
            c1 = parameters.c1(),
            c_mu = parameters.c_mu(),
            lazy = parameters.lazy_update(),
            lazy_threshold = parameters.lazy_threshold(),
            separable = parameters.separable(),
            seed = parameters.seed(),
            "cma-es run started"
        );
        if let RunStatus::Failed(failure) = solutions.status() {
            trace_warn!(code = failure.code(), "cma-es initialization failed: {failure}");
        }

        Ok(Self {
            update: policy_for(parameters.flavor()),
            parameters,
            solutions,
            sampler,
            criteria: StopCriteria::default(),
            fitness,
            genopheno: Box::new(NoTransform),
            progress: default_progress(),
            telemetry,
            niter: 0,
            iter_start: None,
            evaluated: false,
            last_checked: None,
        })
    }

    /// Replace the genotype-to-phenotype transform.
    #[must_use]
    pub fn with_genopheno(mut self, genopheno: impl GenoPheno + 'static) -> Self {
        self.genopheno = Box::new(genopheno);
        self
    }

    /// Replace the progress callback.
    #[must_use]
    pub fn with_progress(
        mut self,
        progress: impl FnMut(&CmaParameters, &CmaSolutions) -> ControlFlow<()> + 'static,
    ) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Replace the covariance update policy.
    #[must_use]
    pub fn with_update(mut self, update: impl CovarianceUpdate + 'static) -> Self {
        self.update = Box::new(update);
        self
    }

    /// Replace the stopping tolerances.
    #[must_use]
    pub fn with_stop_criteria(mut self, criteria: StopCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Sample the next population as the columns of a `dim x lambda` matrix.
    ///
    /// In full mode the eigendecomposition is refreshed on the first
    /// generation, on every generation when lazy updates are off, and once
    /// the cached decomposition is more than `lazy_threshold` generations
    /// old; otherwise the cached one is reused. Separable mode samples from
    /// the covariance diagonal directly. Fixed coordinates are overwritten
    /// in every column.
    pub fn ask(&mut self) -> DMatrix<f64> {
        let start = Instant::now();
        self.iter_start = Some(start);
        self.solutions.updated_eigen = false;
        self.evaluated = false;

        // A failed run keeps sampling from its last valid transform.
        if !self.solutions.status().is_failure() {
            self.refresh_distribution();
        }

        let mut population = self
            .sampler
            .samples(self.parameters.lambda(), self.solutions.sigma);
        for (&index, &value) in self.parameters.fixed() {
            population.row_mut(index).fill(value);
        }

        self.solutions.elapsed.ask = start.elapsed();
        population
    }

    fn refresh_distribution(&mut self) {
        self.sampler.set_mean(&self.solutions.xmean);

        if self.parameters.separable() {
            if let Err(failure) = self.sampler.set_diagonal(&self.solutions.cov.diagonal()) {
                self.fail(failure);
            }
            return;
        }

        let stale = self.niter.saturating_sub(self.solutions.eigeniter);
        if self.niter == 0
            || !self.parameters.lazy_update()
            || stale > self.parameters.lazy_threshold()
        {
            match self.sampler.set_covar(&self.solutions.cov) {
                Ok(()) => {
                    self.solutions.eigeniter = self.niter;
                    self.solutions.updated_eigen = true;
                    trace_debug!(iter = self.niter, stale, "eigendecomposition refreshed");
                }
                Err(failure) => self.fail(failure),
            }
        }
    }

    /// Evaluate the phenotype population and attach the fitness values to
    /// the genotype candidates.
    ///
    /// A NaN fitness records [`Failure::NonFiniteFitness`].
    pub fn eval(&mut self, candidates: &DMatrix<f64>, phenocandidates: &DMatrix<f64>) {
        let start = Instant::now();
        let n = phenocandidates.nrows().max(1);
        let fvalues: Vec<f64> = phenocandidates
            .as_slice()
            .chunks_exact(n)
            .map(|x| self.fitness.evaluate(x))
            .collect();
        self.record_fvalues(candidates, fvalues);
        self.solutions.elapsed.eval = start.elapsed();
    }

    /// Attach externally computed fitness values to the population returned
    /// by [`ask`](Self::ask), in column order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PopulationShapeMismatch`] if `candidates` is not a
    /// `dim x lambda` matrix, and [`Error::FitnessCountMismatch`] if
    /// `fvalues` does not have one entry per column.
    pub fn set_fvalues(&mut self, candidates: &DMatrix<f64>, fvalues: &[f64]) -> Result<()> {
        let (dim, lambda) = (self.parameters.dim(), self.parameters.lambda());
        if candidates.shape() != (dim, lambda) {
            return Err(Error::PopulationShapeMismatch {
                dim,
                lambda,
                rows: candidates.nrows(),
                cols: candidates.ncols(),
            });
        }
        if fvalues.len() != candidates.ncols() {
            return Err(Error::FitnessCountMismatch {
                expected: candidates.ncols(),
                got: fvalues.len(),
            });
        }
        self.record_fvalues(candidates, fvalues.to_vec());
        Ok(())
    }

    fn record_fvalues(&mut self, candidates: &DMatrix<f64>, fvalues: Vec<f64>) {
        if fvalues.iter().any(|f| f.is_nan()) {
            self.fail(Failure::NonFiniteFitness);
        }
        self.solutions.nevals += fvalues.len();
        self.solutions.candidates = candidates
            .column_iter()
            .zip(fvalues)
            .map(|(x, f)| Candidate::new(x.into_owned(), f))
            .collect();
        self.evaluated = true;
    }

    /// Whether the current generation holds one evaluated candidate per
    /// sampled column.
    fn generation_complete(&self) -> bool {
        let dim = self.parameters.dim();
        self.evaluated
            && self.solutions.candidates.len() == self.parameters.lambda()
            && self.solutions.candidates.iter().all(|c| c.x.len() == dim)
    }

    /// Rank the evaluated population and adapt the distribution.
    ///
    /// Does nothing to the distribution once the run has failed, or when the
    /// generation sampled by the last [`ask`](Self::ask) has not been fully
    /// evaluated.
    pub fn tell(&mut self) {
        let start = Instant::now();

        let complete = self.generation_complete();
        self.evaluated = false;
        if !complete {
            trace_warn!(
                iter = self.niter,
                candidates = self.solutions.candidates.len(),
                lambda = self.parameters.lambda(),
                "tell without a fully evaluated population, distribution left unchanged"
            );
        }

        if complete && !self.solutions.status().is_failure() {
            self.solutions.sort_candidates();
            self.solutions.update_best_candidates(self.niter);

            let fixed_variances: Vec<(usize, f64, f64)> = self
                .parameters
                .fixed()
                .iter()
                .map(|(&i, &v)| (i, v, self.solutions.cov[(i, i)]))
                .collect();

            match self
                .update
                .update(&self.parameters, &self.sampler, &mut self.solutions)
            {
                Ok(()) => {
                    self.pin_fixed(&fixed_variances);
                    self.cache_eigen();
                }
                Err(failure) => self.fail(failure),
            }
        }

        self.solutions.niter = self.niter;
        self.solutions.elapsed.tell = start.elapsed();
    }

    /// Hold fixed coordinates: exact mean, untouched variance, no correlation
    /// with the free coordinates and no path component.
    fn pin_fixed(&mut self, fixed: &[(usize, f64, f64)]) {
        let sols = &mut self.solutions;
        for &(i, value, variance) in fixed {
            sols.xmean[i] = value;
            sols.cov.row_mut(i).fill(0.0);
            sols.cov.column_mut(i).fill(0.0);
            sols.cov[(i, i)] = variance;
            sols.pc[i] = 0.0;
            sols.psigma[i] = 0.0;
        }
    }

    fn cache_eigen(&mut self) {
        if self.parameters.separable() {
            self.solutions
                .update_eigenvalues(self.solutions.cov.diagonal());
        } else if self.solutions.updated_eigen {
            self.solutions.update_eigenv(
                self.sampler.eigenvalues().clone(),
                self.sampler.eigenvectors(),
            );
        }
    }

    /// Advance the generation counter and record the generation's wall time.
    pub fn inc_iter(&mut self) {
        self.niter += 1;
        if let Some(start) = self.iter_start.take() {
            self.solutions.elapsed.last_iter = start.elapsed();
        }
    }

    /// Whether the run should end before the next [`ask`](Self::ask).
    ///
    /// A recorded failure always stops. The first generation always runs.
    /// Afterwards the progress callback may request a stop, a telemetry row
    /// is appended if configured, and the built-in criteria decide. The
    /// outcome is stored as the run status. Repeated calls within one
    /// generation return the stored outcome without running the callback or
    /// writing telemetry again.
    pub fn stop(&mut self) -> bool {
        let start = Instant::now();
        let stopped = self.check_stop();
        self.solutions.elapsed.stop = start.elapsed();
        stopped
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn check_stop(&mut self) -> bool {
        if self.solutions.status().is_failure() {
            return true;
        }
        if self.niter == 0 {
            return false;
        }
        if self.last_checked == Some(self.niter) {
            return self.solutions.status() != RunStatus::Running;
        }
        self.last_checked = Some(self.niter);

        if (self.progress)(&self.parameters, &self.solutions).is_break() {
            self.solutions
                .set_status(RunStatus::Stopped(StopReason::UserRequested));
            return true;
        }

        if let Some(telemetry) = self.telemetry.as_mut()
            && let Err(e) = telemetry.write_row(&self.solutions)
        {
            trace_warn!(path = %telemetry.path().display(), "telemetry write failed: {e}");
        }

        match self.criteria.stop(&self.parameters, &self.solutions) {
            Some(reason) => {
                self.solutions.set_status(RunStatus::Stopped(reason));
                true
            }
            None => {
                self.solutions.set_status(RunStatus::Running);
                false
            }
        }
    }

    /// Run generations until a stop condition holds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Termination`] carrying the [`Failure`] if the run
    /// ended on an unrecoverable condition.
    pub fn optimize(&mut self) -> Result<()> {
        while !self.stop() {
            let candidates = self.ask();
            let phenocandidates = self.genopheno.pheno(&candidates);
            self.eval(&candidates, &phenocandidates);
            self.tell();
            self.inc_iter();
        }

        if let RunStatus::Failed(failure) = self.solutions.status() {
            trace_warn!(
                code = failure.code(),
                iter = self.niter,
                evals = self.solutions.nevals,
                "cma-es run failed: {failure}"
            );
            return Err(Error::Termination(failure));
        }

        trace_info!(
            status = ?self.solutions.status(),
            code = self.solutions.status().code(),
            iter = self.niter,
            evals = self.solutions.nevals,
            fbest = self.solutions.best_seen_candidate().map_or(f64::NAN, |c| c.fvalue),
            "cma-es run stopped"
        );
        Ok(())
    }

    /// Current run state.
    #[must_use]
    pub const fn solutions(&self) -> &CmaSolutions {
        &self.solutions
    }

    /// Parameters of this run.
    #[must_use]
    pub const fn parameters(&self) -> &CmaParameters {
        &self.parameters
    }

    /// Generation counter.
    #[must_use]
    pub const fn niter(&self) -> usize {
        self.niter
    }

    /// Consume the engine and return the final run state.
    #[must_use]
    pub fn into_solutions(self) -> CmaSolutions {
        self.solutions
    }

    /// Best-ever candidate mapped to phenotype space.
    #[must_use]
    pub fn best_phenotype(&self) -> Option<DVector<f64>> {
        self.solutions
            .best_seen_candidate()
            .map(|c| self.genopheno.pheno_vector(&c.x))
    }

    /// Record a failure; the first one sticks.
    fn fail(&mut self, failure: Failure) {
        if !self.solutions.status().is_failure() {
            trace_warn!(code = failure.code(), iter = self.niter, "cma-es failure: {failure}");
            self.solutions.set_status(RunStatus::Failed(failure));
        }
    }
}

/// Minimize `fitness` with default transform and progress logging.
///
/// # Errors
///
/// Returns [`Error::Telemetry`] if the telemetry sink cannot be opened and
/// [`Error::Termination`] if the run ends on an unrecoverable failure.
///
/// # Examples
///
/// ```
/// use cmaes_engine::{CmaParameters, RunStatus, cmaes};
///
/// let params = CmaParameters::builder(&[1.0; 4], 0.5)
///     .seed(42)
///     .quiet(true)
///     .build()
///     .unwrap();
/// let sols = cmaes(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(), params).unwrap();
/// assert!(matches!(sols.status(), RunStatus::Stopped(_)));
/// ```
pub fn cmaes<F: FitnessFunction>(fitness: F, parameters: CmaParameters) -> Result<CmaSolutions> {
    let mut strategy = CmaStrategy::new(fitness, parameters)?;
    strategy.optimize()?;
    Ok(strategy.into_solutions())
}
