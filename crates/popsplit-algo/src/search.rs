//! Multiplier search: find the μ whose min cut holds the target population share.
//!
//! For a fixed λ the selected population never decreases as μ grows, so the
//! search brackets the target by doubling an upper bound and then bisects.
//! Every solver call counts as one iteration. When the budget runs out (or the
//! selection jumps over the target band) the closest candidate seen is
//! returned with `converged = false`.

use popsplit_core::{GraphAttributes, PopsplitError, PopsplitResult, SweepConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::network::{validate_lambda, validate_mu};
use crate::observer::{SearchStep, SweepObserver};
use crate::solver::{PartitionResult, PartitionSolver};

/// Bounds and stopping rules of a single search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub target_fraction: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub mu_min: f64,
    /// Initial upper bound; estimated from the data when `None`.
    pub mu_max: Option<f64>,
    /// Upper bounds are never doubled beyond this value.
    pub mu_ceiling: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SweepConfig::default())
    }
}

impl From<&SweepConfig> for SearchOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            target_fraction: config.target_fraction,
            tolerance: config.tolerance,
            max_iterations: config.max_iterations,
            mu_min: config.mu_min,
            mu_max: None,
            mu_ceiling: config.mu_ceiling,
        }
    }
}

impl SearchOptions {
    pub fn with_target(mut self, target_fraction: f64, tolerance: f64) -> Self {
        self.target_fraction = target_fraction;
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_mu_max(mut self, mu_max: Option<f64>) -> Self {
        self.mu_max = mu_max;
        self
    }

    pub fn validate(&self) -> PopsplitResult<()> {
        if !(self.target_fraction > 0.0 && self.target_fraction <= 1.0) {
            return Err(PopsplitError::Configuration(format!(
                "target fraction must be in (0, 1], got {}",
                self.target_fraction
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(PopsplitError::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(PopsplitError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        validate_mu(self.mu_min)?;
        if let Some(mu_max) = self.mu_max {
            validate_mu(mu_max)?;
        }
        if !(self.mu_ceiling > self.mu_min && self.mu_ceiling.is_finite()) {
            return Err(PopsplitError::Configuration(format!(
                "mu ceiling {} must exceed mu_min {}",
                self.mu_ceiling, self.mu_min
            )));
        }
        Ok(())
    }
}

/// Outcome of one multiplier search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The accepted partition, or the closest one when not converged.
    pub result: PartitionResult,
    /// Solver calls made.
    pub iterations: usize,
    /// Every μ evaluated, in order.
    pub mu_history: Vec<f64>,
    pub converged: bool,
}

/// Heuristic first upper bound for μ.
///
/// Ten times the normalised total area per person: large enough that the
/// population reward dominates the area cost at λ = 0.
pub fn estimate_mu_max(attrs: &GraphAttributes) -> f64 {
    let total_population = attrs.total_population();
    if total_population == 0 {
        return 1.0;
    }
    let rho = attrs.characteristic_length();
    10.0 * (attrs.total_area() / (rho * rho)) / total_population as f64
}

/// Search μ for one λ.
pub fn find_optimal_mu(
    solver: &PartitionSolver,
    attrs: &GraphAttributes,
    lambda: f64,
    options: &SearchOptions,
    observer: &dyn SweepObserver,
) -> PopsplitResult<SearchResult> {
    validate_lambda(lambda)?;
    options.validate()?;
    if attrs.total_population() == 0 {
        return Err(PopsplitError::Configuration(
            "total population is zero; no population fraction can be targeted".into(),
        ));
    }

    let mut lo = options.mu_min;
    let mut hi = match options.mu_max {
        Some(hint) if hint > lo => hint,
        _ => estimate_mu_max(attrs).max(2.0 * lo),
    }
    .min(options.mu_ceiling);

    let mut tracker = Tracker::new(solver, attrs, lambda, options, observer);

    // Grow the upper bound until it over-selects.
    loop {
        let probe = tracker.evaluate(hi)?;
        if tracker.accepts(&probe) {
            return tracker.finish(Some(probe));
        }
        if probe.population_fraction > options.target_fraction {
            break;
        }
        lo = hi;
        if hi >= options.mu_ceiling || tracker.exhausted() {
            debug!(lambda, mu = hi, "upper bound reached without enough population");
            return tracker.finish(None);
        }
        hi = (hi * 2.0).min(options.mu_ceiling);
    }

    while !tracker.exhausted() {
        let mu = 0.5 * (lo + hi);
        let candidate = tracker.evaluate(mu)?;
        if tracker.accepts(&candidate) {
            return tracker.finish(Some(candidate));
        }
        if candidate.population_fraction < options.target_fraction {
            lo = mu;
        } else {
            hi = mu;
        }
    }
    tracker.finish(None)
}

/// Iteration bookkeeping shared by both search phases.
struct Tracker<'a> {
    solver: &'a PartitionSolver,
    attrs: &'a GraphAttributes,
    lambda: f64,
    options: &'a SearchOptions,
    observer: &'a dyn SweepObserver,
    mu_history: Vec<f64>,
    best: Option<PartitionResult>,
}

impl<'a> Tracker<'a> {
    fn new(
        solver: &'a PartitionSolver,
        attrs: &'a GraphAttributes,
        lambda: f64,
        options: &'a SearchOptions,
        observer: &'a dyn SweepObserver,
    ) -> Self {
        Self {
            solver,
            attrs,
            lambda,
            options,
            observer,
            mu_history: Vec::new(),
            best: None,
        }
    }

    fn evaluate(&mut self, mu: f64) -> PopsplitResult<PartitionResult> {
        let result = self.solver.solve(self.attrs, self.lambda, mu)?;
        self.mu_history.push(mu);
        self.observer.on_search_step(&SearchStep {
            lambda: self.lambda,
            iteration: self.mu_history.len(),
            mu,
            selected_population: result.selected_population,
            population_fraction: result.population_fraction,
        });

        let target = self.options.target_fraction;
        let distance = |r: &PartitionResult| (r.population_fraction - target).abs();
        let improves = self
            .best
            .as_ref()
            .map_or(true, |best| distance(&result) < distance(best));
        if improves {
            self.best = Some(result.clone());
        }
        Ok(result)
    }

    fn accepts(&self, result: &PartitionResult) -> bool {
        result.satisfies(self.options.target_fraction, self.options.tolerance)
    }

    fn exhausted(&self) -> bool {
        self.mu_history.len() >= self.options.max_iterations
    }

    /// `accepted` is the converged partition; otherwise the closest candidate is used.
    fn finish(self, accepted: Option<PartitionResult>) -> PopsplitResult<SearchResult> {
        let converged = accepted.is_some();
        let last_mu = self.mu_history.last().copied().unwrap_or(self.options.mu_min);
        let result = accepted.or(self.best).ok_or_else(|| {
            PopsplitError::solver(self.lambda, last_mu, "search ended before any solve")
        })?;
        Ok(SearchResult {
            result,
            iterations: self.mu_history.len(),
            mu_history: self.mu_history,
            converged,
        })
    }
}
