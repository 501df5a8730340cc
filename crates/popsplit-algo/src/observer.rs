//! Progress hooks for searches and sweeps.
//!
//! Observers are called from worker threads during parallel sweeps, hence the
//! `Send + Sync` bound. All methods default to no-ops.

use popsplit_core::PopsplitError;
use tracing::{debug, info, warn};

use crate::sweep::{LambdaResult, SweepResult};

/// One solver call inside a multiplier search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchStep {
    pub lambda: f64,
    pub iteration: usize,
    pub mu: f64,
    pub selected_population: u64,
    pub population_fraction: f64,
}

pub trait SweepObserver: Send + Sync {
    fn on_search_step(&self, _step: &SearchStep) {}

    fn on_lambda_complete(&self, _result: &LambdaResult) {}

    fn on_lambda_failed(&self, _lambda: f64, _error: &PopsplitError) {}

    fn on_sweep_complete(&self, _result: &SweepResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {}

/// Reports progress through `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SweepObserver for TracingObserver {
    fn on_search_step(&self, step: &SearchStep) {
        debug!(
            lambda = step.lambda,
            iteration = step.iteration,
            mu = step.mu,
            fraction = step.population_fraction,
            "search step"
        );
    }

    fn on_lambda_complete(&self, result: &LambdaResult) {
        let search = &result.search;
        if search.converged {
            info!(
                lambda = result.lambda,
                mu = search.result.mu,
                fraction = search.result.population_fraction,
                iterations = search.iterations,
                elapsed = result.elapsed_seconds,
                "lambda converged"
            );
        } else {
            warn!(
                lambda = result.lambda,
                mu = search.result.mu,
                fraction = search.result.population_fraction,
                iterations = search.iterations,
                "lambda did not converge; keeping closest candidate"
            );
        }
    }

    fn on_lambda_failed(&self, lambda: f64, error: &PopsplitError) {
        warn!(lambda, %error, "lambda failed");
    }

    fn on_sweep_complete(&self, result: &SweepResult) {
        info!(
            lambdas = result.lambda_values.len(),
            failures = result.failures.len(),
            total_iterations = result.total_iterations,
            elapsed = result.total_elapsed_seconds,
            all_converged = result.all_converged,
            "sweep complete"
        );
    }
}
