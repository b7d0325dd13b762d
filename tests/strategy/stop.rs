use std::ops::ControlFlow;

use cmaes_engine::prelude::*;

use crate::test_functions::{rosenbrock, sphere};

fn builder(x0: &[f64]) -> CmaParametersBuilder {
    CmaParameters::builder(x0, 1.0).seed(31).quiet(true)
}

#[test]
fn first_generation_always_runs() {
    let params = builder(&[1.0; 3]).max_iter(0).build().unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();
    assert!(!strategy.stop());
    assert!(!strategy.stop());

    strategy.optimize().unwrap();
    assert_eq!(strategy.niter(), 1);
    assert_eq!(
        strategy.solutions().status(),
        RunStatus::Stopped(StopReason::MaxIter)
    );
}

#[test]
fn stop_is_idempotent() {
    let params = builder(&[2.0; 4]).build().unwrap();
    let mut strategy = CmaStrategy::new(rosenbrock, params).unwrap();

    for _ in 0..30 {
        let first = strategy.stop();
        let status = strategy.solutions().status();
        assert_eq!(strategy.stop(), first);
        assert_eq!(strategy.solutions().status(), status);
        if first {
            break;
        }
        let population = strategy.ask();
        strategy.eval(&population, &population);
        strategy.tell();
        strategy.inc_iter();
    }
}

#[test]
fn stopped_run_reports_the_same_reason_again() {
    let params = builder(&[1.0; 2]).max_iter(4).build().unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();
    strategy.optimize().unwrap();
    assert!(strategy.stop());
    assert!(strategy.stop());
    assert_eq!(
        strategy.solutions().status(),
        RunStatus::Stopped(StopReason::MaxIter)
    );
    assert_eq!(strategy.solutions().status().code(), 12);
}

#[test]
fn progress_callback_requests_stop() {
    let params = builder(&[3.0; 3]).build().unwrap();
    let mut calls = 0;
    let mut strategy = CmaStrategy::new(sphere, params)
        .unwrap()
        .with_progress(move |_, sols| {
            calls += 1;
            assert_eq!(calls, sols.niter + 1);
            if sols.niter >= 6 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

    strategy.optimize().unwrap();
    assert_eq!(strategy.solutions().niter, 6);
    assert_eq!(
        strategy.solutions().status(),
        RunStatus::Stopped(StopReason::UserRequested)
    );
    assert!(!strategy.solutions().status().is_failure());
}

#[test]
fn evaluation_budget() {
    let params = builder(&[1.0; 3]).max_fevals(40).build().unwrap();
    let lambda = params.lambda();
    let sols = cmaes(rosenbrock, params).unwrap();

    assert_eq!(sols.status(), RunStatus::Stopped(StopReason::MaxFEvals));
    assert!(sols.nevals >= 40 && sols.nevals < 40 + lambda, "{}", sols.nevals);
}

#[test]
fn generation_budget() {
    let params = builder(&[1.0; 3]).max_iter(17).build().unwrap();
    let lambda = params.lambda();
    let sols = cmaes(rosenbrock, params).unwrap();

    assert_eq!(sols.status(), RunStatus::Stopped(StopReason::MaxIter));
    assert_eq!(sols.niter, 16);
    assert_eq!(sols.nevals, 17 * lambda);
}

#[test]
fn fitness_target() {
    let params = builder(&[2.0; 4]).ftarget(1e-3).build().unwrap();
    let sols = cmaes(sphere, params).unwrap();

    assert_eq!(sols.status(), RunStatus::Stopped(StopReason::FTarget));
    let best = sols.best_seen_candidate().unwrap().fvalue;
    assert!(best <= 1e-3);
    assert!(best > 1e-8, "target should stop the run early, best {best}");
}

#[test]
fn disabled_criterion_lets_the_run_continue() {
    let flat = |_: &[f64]| 0.0;
    let params = builder(&[1.0; 3])
        .disable_stop(StopReason::EqualFunVals)
        .disable_stop(StopReason::TolHistFun)
        .max_iter(25)
        .build()
        .unwrap();
    let sols = cmaes(flat, params).unwrap();
    assert_eq!(sols.status(), RunStatus::Stopped(StopReason::MaxIter));
}

#[test]
fn tighter_tolerance_runs_longer() {
    let run = |criteria: StopCriteria| {
        let params = builder(&[1.0; 4]).build().unwrap();
        let mut strategy = CmaStrategy::new(sphere, params)
            .unwrap()
            .with_stop_criteria(criteria);
        strategy.optimize().unwrap();
        strategy.into_solutions()
    };

    let loose = run(StopCriteria::new().tol_hist_fun(1e-4));
    let tight = run(StopCriteria::new());
    assert_eq!(loose.status(), RunStatus::Stopped(StopReason::TolHistFun));
    assert!(loose.niter < tight.niter);
}

#[test]
fn progress_runs_once_per_generation() {
    let calls = std::rc::Rc::new(std::cell::Cell::new(0_usize));
    let counter = std::rc::Rc::clone(&calls);
    let params = builder(&[1.0; 3]).max_iter(6).build().unwrap();
    let mut strategy = CmaStrategy::new(sphere, params)
        .unwrap()
        .with_progress(move |_, _| {
            counter.set(counter.get() + 1);
            ControlFlow::Continue(())
        });

    loop {
        let stopped = strategy.stop();
        assert_eq!(strategy.stop(), stopped);
        if stopped {
            break;
        }
        let population = strategy.ask();
        strategy.eval(&population, &population);
        strategy.tell();
        strategy.inc_iter();
    }
    assert_eq!(strategy.niter(), 6);
    assert_eq!(calls.get(), 6);
}
