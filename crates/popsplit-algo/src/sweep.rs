//! Tension sweep: one multiplier search per λ.
//!
//! Runs sequentially or on a rayon pool sized by `max_workers`. With warm
//! start enabled, each search's first upper bound is derived from the μ of
//! the last converged λ that has already finished; in parallel mode λ values
//! are processed in waves of `max_workers` so that every wave can seed from
//! the one before it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

use popsplit_core::{GraphAttributes, PopsplitError, PopsplitResult, SweepConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use web_time::Instant;

use crate::network::validate_lambda;
use crate::observer::SweepObserver;
use crate::search::{find_optimal_mu, SearchOptions, SearchResult};
use crate::solver::PartitionSolver;

/// λ as a totally ordered map key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LambdaValue(f64);

impl LambdaValue {
    pub fn new(value: f64) -> PopsplitResult<Self> {
        validate_lambda(value)?;
        // -0.0 and 0.0 must be the same key
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for LambdaValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for LambdaValue {}

impl PartialOrd for LambdaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LambdaValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for LambdaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for LambdaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Search outcome for one λ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaResult {
    pub lambda: f64,
    pub search: SearchResult,
    pub elapsed_seconds: f64,
    /// Initial μ upper bound supplied by warm start, if any.
    pub mu_hint: Option<f64>,
}

impl LambdaResult {
    pub fn converged(&self) -> bool {
        self.search.converged
    }

    pub fn mu(&self) -> f64 {
        self.search.result.mu
    }

    pub fn num_components(&self) -> usize {
        self.search.result.num_components
    }
}

/// A λ whose search raised an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaFailure {
    pub lambda: f64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    #[serde(with = "results_as_list")]
    pub results: BTreeMap<LambdaValue, LambdaResult>,
    /// Requested λ values in request order.
    pub lambda_values: Vec<f64>,
    pub failures: Vec<LambdaFailure>,
    pub total_iterations: usize,
    pub total_elapsed_seconds: f64,
    /// Every λ produced a result and every search converged.
    pub all_converged: bool,
}

impl SweepResult {
    pub fn get(&self, lambda: f64) -> Option<&LambdaResult> {
        let key = LambdaValue::new(lambda).ok()?;
        self.results.get(&key)
    }

    /// λ values whose search finished without converging.
    pub fn non_converged(&self) -> Vec<f64> {
        self.results
            .values()
            .filter(|r| !r.converged())
            .map(|r| r.lambda)
            .collect()
    }

    pub fn status(&self) -> SweepStatus {
        let flagged = self.non_converged();
        let failed: Vec<f64> = self.failures.iter().map(|f| f.lambda).collect();
        if flagged.is_empty() && failed.is_empty() {
            SweepStatus::FullyConverged
        } else {
            SweepStatus::PartiallyConverged { flagged, failed }
        }
    }
}

/// Overall outcome of a sweep run.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepStatus {
    FullyConverged,
    /// Some λ values did not converge (`flagged`) or raised an error (`failed`).
    PartiallyConverged { flagged: Vec<f64>, failed: Vec<f64> },
    /// A configuration error stopped the sweep before any result.
    Aborted { reason: String },
}

impl SweepStatus {
    pub fn from_outcome(outcome: &PopsplitResult<SweepResult>) -> Self {
        match outcome {
            Ok(result) => result.status(),
            Err(err) => SweepStatus::Aborted {
                reason: err.to_string(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SweepStatus::FullyConverged => "fully-converged",
            SweepStatus::PartiallyConverged { .. } => "partially-converged",
            SweepStatus::Aborted { .. } => "aborted",
        }
    }
}

mod results_as_list {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        results: &BTreeMap<LambdaValue, LambdaResult>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(results.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<LambdaValue, LambdaResult>, D::Error> {
        let list = Vec::<LambdaResult>::deserialize(deserializer)?;
        list.into_iter()
            .map(|r| {
                LambdaValue::new(r.lambda)
                    .map(|key| (key, r))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Run one search per λ.
///
/// `lambda_values` overrides the sequence derived from `config`. Only
/// configuration problems abort the sweep; per-λ solver errors are recorded
/// in [`SweepResult::failures`].
pub fn sweep_lambda(
    solver: &PartitionSolver,
    attrs: &GraphAttributes,
    lambda_values: Option<&[f64]>,
    config: &SweepConfig,
    observer: &dyn SweepObserver,
) -> PopsplitResult<SweepResult> {
    config.validate()?;
    if attrs.total_population() == 0 {
        return Err(PopsplitError::Configuration(
            "total population is zero; nothing to sweep".into(),
        ));
    }
    let lambdas = match lambda_values {
        Some(values) => values.to_vec(),
        None => config.lambda_values(),
    };
    if lambdas.is_empty() {
        return Err(PopsplitError::Configuration("no lambda values to sweep".into()));
    }
    let mut seen = BTreeSet::new();
    for &lambda in &lambdas {
        if !seen.insert(LambdaValue::new(lambda)?) {
            return Err(PopsplitError::Configuration(format!(
                "lambda {lambda} is listed more than once"
            )));
        }
    }

    let workers = config.worker_count().clamp(1, lambdas.len());
    let runner = SweepRunner {
        solver,
        attrs,
        config,
        options: SearchOptions::from(config),
        observer,
    };
    info!(
        lambdas = lambdas.len(),
        workers,
        warm_start = config.warm_start,
        backend = solver.backend_name(),
        "starting sweep"
    );

    let start = Instant::now();
    let outcomes = if workers == 1 {
        runner.run_sequential(&lambdas)
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| {
                PopsplitError::Configuration(format!("failed to build worker pool: {err}"))
            })?;
        pool.install(|| runner.run_parallel(&lambdas, workers))
    };

    let mut results = BTreeMap::new();
    let mut failures = Vec::new();
    for (lambda, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                results.insert(LambdaValue::new(lambda)?, result);
            }
            Err(err) if err.is_configuration() => return Err(err),
            Err(err) => failures.push(LambdaFailure {
                lambda,
                error: err.to_string(),
            }),
        }
    }

    let total_iterations = results.values().map(|r| r.search.iterations).sum();
    let all_converged = failures.is_empty() && results.values().all(LambdaResult::converged);
    let sweep = SweepResult {
        results,
        lambda_values: lambdas,
        failures,
        total_iterations,
        total_elapsed_seconds: start.elapsed().as_secs_f64(),
        all_converged,
    };
    observer.on_sweep_complete(&sweep);
    Ok(sweep)
}

type Outcome = (f64, PopsplitResult<LambdaResult>);

struct SweepRunner<'a> {
    solver: &'a PartitionSolver,
    attrs: &'a GraphAttributes,
    config: &'a SweepConfig,
    options: SearchOptions,
    observer: &'a dyn SweepObserver,
}

impl SweepRunner<'_> {
    fn run_one(&self, lambda: f64, previous_mu: Option<f64>) -> PopsplitResult<LambdaResult> {
        let mu_hint = previous_mu
            .filter(|_| self.config.warm_start)
            .map(|mu| mu * self.config.warm_start_headroom)
            .filter(|&hint| hint > self.options.mu_min);
        let options = self.options.clone().with_mu_max(mu_hint);

        let start = Instant::now();
        let outcome = find_optimal_mu(self.solver, self.attrs, lambda, &options, self.observer)
            .map(|search| LambdaResult {
                lambda,
                search,
                elapsed_seconds: start.elapsed().as_secs_f64(),
                mu_hint,
            });
        match &outcome {
            Ok(result) => self.observer.on_lambda_complete(result),
            Err(err) => self.observer.on_lambda_failed(lambda, err),
        }
        outcome
    }

    fn run_sequential(&self, lambdas: &[f64]) -> Vec<Outcome> {
        let mut previous_mu = None;
        let mut outcomes = Vec::with_capacity(lambdas.len());
        for &lambda in lambdas {
            let outcome = self.run_one(lambda, previous_mu);
            if let Ok(result) = &outcome {
                if result.converged() {
                    previous_mu = Some(result.mu());
                }
            }
            outcomes.push((lambda, outcome));
        }
        outcomes
    }

    fn run_parallel(&self, lambdas: &[f64], workers: usize) -> Vec<Outcome> {
        if !self.config.warm_start {
            return lambdas
                .par_iter()
                .map(|&lambda| (lambda, self.run_one(lambda, None)))
                .collect();
        }

        let mut previous_mu = None;
        let mut outcomes = Vec::with_capacity(lambdas.len());
        for (wave, chunk) in lambdas.chunks(workers).enumerate() {
            debug!(wave, size = chunk.len(), hint = ?previous_mu, "starting wave");
            let wave_outcomes: Vec<Outcome> = chunk
                .par_iter()
                .map(|&lambda| (lambda, self.run_one(lambda, previous_mu)))
                .collect();
            if let Some(mu) = wave_outcomes.iter().rev().find_map(|(_, outcome)| {
                outcome.as_ref().ok().filter(|r| r.converged()).map(LambdaResult::mu)
            }) {
                previous_mu = Some(mu);
            }
            outcomes.extend(wave_outcomes);
        }
        outcomes
    }
}

pub fn save_sweep_result(result: &SweepResult, path: &Path) -> PopsplitResult<()> {
    let json = serde_json::to_string_pretty(result)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_sweep_result(path: &Path) -> PopsplitResult<SweepResult> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_value_orders_and_normalises_zero() {
        let a = LambdaValue::new(-0.0).unwrap();
        let b = LambdaValue::new(0.0).unwrap();
        assert_eq!(a, b);
        assert!(LambdaValue::new(0.1).unwrap() < LambdaValue::new(0.2).unwrap());
        assert_eq!(LambdaValue::new(0.5).unwrap().to_string(), "0.50");
        assert!(LambdaValue::new(1.0).is_err());
    }

    #[test]
    fn aborted_status_keeps_reason() {
        let outcome: PopsplitResult<SweepResult> =
            Err(PopsplitError::Configuration("bad step".into()));
        let status = SweepStatus::from_outcome(&outcome);
        assert_eq!(status.label(), "aborted");
        assert!(matches!(status, SweepStatus::Aborted { reason } if reason.contains("bad step")));
    }
}
