//! Ask-and-tell loop: sample a population, evaluate it yourself, tell the result.
//!
//! Evaluation happens outside the engine, so it can be farmed out to threads
//! or processes. Here the population is evaluated column by column on
//! Rosenbrock, with the first coordinate held fixed at 1.0.
//!
//! Run with: `cargo run --example ask_tell`

use cmaes_engine::prelude::*;

fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

fn main() -> cmaes_engine::Result<()> {
    let params = CmaParameters::builder(&[0.0; 6], 0.5)
        .fix(0, 1.0)
        .lazy_update(true)
        .seed(7)
        .quiet(true)
        .build()?;
    let mut strategy = CmaStrategy::new(rosenbrock, params)?;

    while !strategy.stop() {
        let population = strategy.ask();

        // Evaluate the batch (could be sent to workers, GPUs, etc.)
        let fvalues: Vec<f64> = population
            .column_iter()
            .map(|c| rosenbrock(c.into_owned().as_slice()))
            .collect();
        strategy.set_fvalues(&population, &fvalues)?;

        strategy.tell();
        strategy.inc_iter();

        let sols = strategy.solutions();
        if sols.niter % 50 == 0 {
            println!(
                "gen {:4}: best f = {:.3e}, sigma = {:.3e}, eigen refreshed: {}",
                sols.niter,
                sols.best_candidate().map_or(f64::NAN, |c| c.fvalue),
                sols.sigma,
                sols.updated_eigen,
            );
        }
    }

    let sols = strategy.solutions();
    println!("stopped: {:?}", sols.status());
    if let Some(best) = sols.best_seen_candidate() {
        println!("best f = {:.3e} at {:.4}", best.fvalue, best.x.transpose());
    }
    Ok(())
}
