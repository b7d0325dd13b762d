use cmaes_engine::prelude::*;

use crate::test_functions::{rosenbrock, sphere};

fn fitness_of(population: &nalgebra::DMatrix<f64>, f: fn(&[f64]) -> f64) -> Vec<f64> {
    population
        .column_iter()
        .map(|c| f(c.into_owned().as_slice()))
        .collect()
}

#[test]
fn ask_returns_lambda_columns_with_fixed_coordinates() {
    let params = CmaParameters::builder(&[0.5; 5], 2.0)
        .population_size(9)
        .fix(0, -1.5)
        .fix(3, 2.0)
        .seed(8)
        .quiet(true)
        .build()
        .unwrap();
    let mut strategy = CmaStrategy::new(rosenbrock, params).unwrap();

    for generation in 0..15 {
        assert!(!strategy.stop());
        let population = strategy.ask();
        assert_eq!(population.nrows(), 5);
        assert_eq!(population.ncols(), 9, "generation {generation}");
        for column in population.column_iter() {
            assert_eq!(column[0], -1.5);
            assert_eq!(column[3], 2.0);
        }

        let fvalues = fitness_of(&population, rosenbrock);
        strategy.set_fvalues(&population, &fvalues).unwrap();
        strategy.tell();
        strategy.inc_iter();

        let sols = strategy.solutions();
        assert_eq!(sols.xmean[0], -1.5);
        assert_eq!(sols.xmean[3], 2.0);
        assert_eq!(sols.niter, generation);
        assert_eq!(sols.nevals, 9 * (generation + 1));
    }
}

#[test]
fn tell_ranks_candidates_by_fitness() {
    let params = CmaParameters::builder(&[1.0, 1.0, 1.0], 1.0)
        .seed(3)
        .quiet(true)
        .build()
        .unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();

    let population = strategy.ask();
    let pheno = population.clone();
    strategy.eval(&population, &pheno);
    strategy.tell();

    let ranked: Vec<f64> = strategy
        .solutions()
        .candidates
        .iter()
        .map(|c| c.fvalue)
        .collect();
    assert!(ranked.windows(2).all(|w| w[0] <= w[1]), "{ranked:?}");
    assert_eq!(
        strategy.solutions().best_candidate().unwrap().fvalue,
        ranked[0]
    );
    assert_eq!(strategy.solutions().best_seen_generation(), Some(0));
}

#[test]
fn mismatched_fitness_count_is_rejected() {
    let params = CmaParameters::builder(&[0.0; 4], 1.0)
        .seed(1)
        .quiet(true)
        .build()
        .unwrap();
    let lambda = params.lambda();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();
    let population = strategy.ask();

    let err = strategy
        .set_fvalues(&population, &vec![0.0; lambda - 1])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::FitnessCountMismatch { expected, got } if expected == lambda && got == lambda - 1
    ));
    assert_eq!(strategy.solutions().nevals, 0);
}

#[test]
fn manual_loop_matches_optimize() {
    let build = || {
        CmaParameters::builder(&[3.0, -2.0, 1.0], 0.6)
            .seed(99)
            .quiet(true)
            .build()
            .unwrap()
    };

    let mut driven = CmaStrategy::new(sphere, build()).unwrap();
    driven.optimize().unwrap();

    let mut manual = CmaStrategy::new(sphere, build()).unwrap();
    while !manual.stop() {
        let population = manual.ask();
        let fvalues = fitness_of(&population, sphere);
        manual.set_fvalues(&population, &fvalues).unwrap();
        manual.tell();
        manual.inc_iter();
    }

    assert_eq!(driven.niter(), manual.niter());
    assert_eq!(driven.solutions().xmean, manual.solutions().xmean);
    assert_eq!(driven.solutions().status(), manual.solutions().status());
}

#[test]
fn identical_seeds_sample_identical_populations() {
    let params = || {
        CmaParameters::builder(&[1.0; 6], 0.3)
            .seed(2024)
            .quiet(true)
            .build()
            .unwrap()
    };
    let mut a = CmaStrategy::new(sphere, params()).unwrap();
    let mut b = CmaStrategy::new(sphere, params()).unwrap();

    for _ in 0..5 {
        let pa = a.ask();
        let pb = b.ask();
        assert_eq!(pa, pb);
        a.eval(&pa, &pa);
        b.eval(&pb, &pb);
        a.tell();
        b.tell();
        a.inc_iter();
        b.inc_iter();
    }
}

#[test]
fn timings_are_recorded() {
    let params = CmaParameters::builder(&[1.0; 4], 1.0)
        .seed(5)
        .quiet(true)
        .max_iter(3)
        .build()
        .unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();
    strategy.optimize().unwrap();

    let elapsed = strategy.solutions().elapsed;
    assert!(elapsed.last_iter >= elapsed.ask);
    assert!(elapsed.last_iter >= elapsed.tell);
}

#[test]
fn partial_population_is_rejected() {
    let params = CmaParameters::builder(&[5.0; 4], 1.0)
        .seed(12)
        .quiet(true)
        .build()
        .unwrap();
    let lambda = params.lambda();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();
    let population = strategy.ask();

    let partial = population.columns(0, 2).into_owned();
    let err = strategy
        .set_fvalues(&partial, &fitness_of(&partial, sphere))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PopulationShapeMismatch { dim: 4, lambda: l, rows: 4, cols: 2 } if l == lambda
    ));

    let truncated = population.rows(0, 3).into_owned();
    let err = strategy
        .set_fvalues(&truncated, &vec![0.0; lambda])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PopulationShapeMismatch { rows: 3, cols, .. } if cols == lambda
    ));

    strategy.tell();
    let sols = strategy.solutions();
    assert_eq!(sols.nevals, 0);
    assert_eq!(sols.xmean.as_slice(), &[5.0; 4]);
    assert_eq!(sols.status(), RunStatus::Running);
}

#[test]
fn tell_without_evaluation_leaves_distribution_unchanged() {
    let params = CmaParameters::builder(&[5.0; 4], 1.0)
        .seed(13)
        .quiet(true)
        .build()
        .unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();

    let _ = strategy.ask();
    strategy.tell();
    assert_eq!(strategy.solutions().xmean.as_slice(), &[5.0; 4]);
    strategy.inc_iter();

    // One complete generation, then a tell that must not reuse its candidates.
    assert!(!strategy.stop());
    let population = strategy.ask();
    strategy.eval(&population, &population);
    strategy.tell();
    strategy.inc_iter();
    let xmean = strategy.solutions().xmean.clone();
    let sigma = strategy.solutions().sigma;
    let cov = strategy.solutions().cov.clone();

    assert!(!strategy.stop());
    let _ = strategy.ask();
    strategy.tell();
    let sols = strategy.solutions();
    assert_eq!(sols.xmean, xmean);
    assert_eq!(sols.sigma, sigma);
    assert_eq!(sols.cov, cov);
    assert!(!sols.status().is_failure());
}

#[test]
fn partially_evaluated_population_is_not_told() {
    let params = CmaParameters::builder(&[5.0; 3], 1.0)
        .seed(14)
        .quiet(true)
        .build()
        .unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();

    let population = strategy.ask();
    let partial = population.columns(0, 2).into_owned();
    strategy.eval(&partial, &partial);
    strategy.tell();
    assert_eq!(strategy.solutions().xmean.as_slice(), &[5.0; 3]);
}
