//! Configuration for sweeps and geometry post-processing.
//!
//! Every tunable lives in [`PopsplitConfig`], which is loaded from TOML and
//! passed explicitly into the sweep and post-processing entry points.
//!
//! ```toml
//! [sweep]
//! lambda_step = 0.05
//! warm_start = true
//! max_workers = 4
//!
//! [geometry]
//! simplify_tolerance = 250.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PopsplitError, PopsplitResult};
use crate::maxflow::MaxFlowKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopsplitConfig {
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
}

impl PopsplitConfig {
    pub fn load(path: &Path) -> PopsplitResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: PopsplitConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PopsplitResult<()> {
        self.sweep.validate()?;
        self.geometry.validate()
    }
}

/// Parameters of the tension sweep and of each multiplier search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Fraction of total population the selection should hold.
    pub target_fraction: f64,
    /// Accepted absolute deviation of the selected fraction.
    pub tolerance: f64,
    /// Spacing of the default λ sequence.
    pub lambda_step: f64,
    /// Exclusive upper end of the default λ sequence (capped at 1).
    pub lambda_max: f64,
    /// Seed each search's upper μ bound from the previous converged μ.
    pub warm_start: bool,
    /// Multiplier applied to the previous μ when warm-starting.
    pub warm_start_headroom: f64,
    /// Worker threads; 0 uses one per CPU, 1 runs sequentially.
    pub max_workers: usize,
    /// Solver calls allowed per search.
    pub max_iterations: usize,
    /// Lower μ bound of every search.
    pub mu_min: f64,
    /// Absolute cap for upper-bound doubling.
    pub mu_ceiling: f64,
    pub backend: MaxFlowKind,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            target_fraction: 0.5,
            tolerance: 0.01,
            lambda_step: 0.1,
            lambda_max: 1.0,
            warm_start: false,
            warm_start_headroom: 2.0,
            max_workers: 0,
            max_iterations: 50,
            mu_min: 0.0,
            mu_ceiling: 1e9,
            backend: MaxFlowKind::Dinic,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> PopsplitResult<()> {
        let fail = |msg: String| Err(PopsplitError::Configuration(msg));
        if !(self.target_fraction > 0.0 && self.target_fraction <= 1.0) {
            return fail(format!(
                "target_fraction must be in (0, 1], got {}",
                self.target_fraction
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return fail(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if !(self.lambda_step > 0.0 && self.lambda_step < 1.0) {
            return fail(format!(
                "lambda_step must be in (0, 1), got {}",
                self.lambda_step
            ));
        }
        if !(self.lambda_max > 0.0 && self.lambda_max.is_finite()) {
            return fail(format!("lambda_max must be positive, got {}", self.lambda_max));
        }
        if self.max_iterations == 0 {
            return fail("max_iterations must be at least 1".into());
        }
        if !(self.warm_start_headroom >= 1.0 && self.warm_start_headroom.is_finite()) {
            return fail(format!(
                "warm_start_headroom must be >= 1, got {}",
                self.warm_start_headroom
            ));
        }
        if !(self.mu_min >= 0.0 && self.mu_min.is_finite()) {
            return fail(format!("mu_min must be non-negative, got {}", self.mu_min));
        }
        if !(self.mu_ceiling > self.mu_min && self.mu_ceiling.is_finite()) {
            return fail(format!(
                "mu_ceiling ({}) must exceed mu_min ({})",
                self.mu_ceiling, self.mu_min
            ));
        }
        Ok(())
    }

    /// Evenly spaced λ values `0, step, 2·step, …` strictly below
    /// `min(lambda_max, 1)`, rounded to four decimals.
    pub fn lambda_values(&self) -> Vec<f64> {
        let upper = self.lambda_max.min(1.0);
        let mut values = Vec::new();
        let mut i = 0usize;
        loop {
            let value = round_lambda(i as f64 * self.lambda_step);
            if value >= upper || value >= 1.0 {
                break;
            }
            values.push(value);
            i += 1;
        }
        values
    }

    /// Effective worker count after resolving `0` to the CPU count.
    pub fn worker_count(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get()
        } else {
            self.max_workers
        }
    }
}

/// Round a λ value so keys built from `i * step` compare equal.
pub fn round_lambda(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

/// Parameters of dissolve, simplification and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Douglas-Peucker tolerance in input CRS units.
    pub simplify_tolerance: f64,
    /// Grid size of the exported coordinate quantization.
    pub quantization: f64,
    /// Keep every junction between source units fixed while simplifying.
    pub pin_unit_junctions: bool,
    /// Feature property holding each unit's population.
    pub population_field: String,
    /// Feature property holding each unit's identifier.
    pub id_field: Option<String>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            simplify_tolerance: 500.0,
            quantization: 1e5,
            pin_unit_junctions: true,
            population_field: "population".to_string(),
            id_field: None,
        }
    }
}

impl GeometryConfig {
    pub fn validate(&self) -> PopsplitResult<()> {
        if !(self.simplify_tolerance >= 0.0 && self.simplify_tolerance.is_finite()) {
            return Err(PopsplitError::Configuration(format!(
                "simplify_tolerance must be non-negative, got {}",
                self.simplify_tolerance
            )));
        }
        if !(self.quantization >= 2.0 && self.quantization.is_finite()) {
            return Err(PopsplitError::Configuration(format!(
                "quantization must be at least 2, got {}",
                self.quantization
            )));
        }
        if self.population_field.is_empty() {
            return Err(PopsplitError::Configuration(
                "population_field must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PopsplitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweep.target_fraction, 0.5);
        assert_eq!(config.sweep.max_iterations, 50);
        assert_eq!(config.geometry.quantization, 1e5);
    }

    #[test]
    fn default_lambda_sequence_excludes_one() {
        let values = SweepConfig::default().lambda_values();
        assert_eq!(values.len(), 10);
        assert_eq!(values[0], 0.0);
        assert_eq!(values[3], 0.3);
        assert_eq!(values[9], 0.9);
    }

    #[test]
    fn fine_lambda_sequence_respects_lambda_max() {
        let config = SweepConfig {
            lambda_step: 0.01,
            lambda_max: 0.99,
            ..SweepConfig::default()
        };
        let values = config.lambda_values();
        assert_eq!(values.len(), 99);
        assert_eq!(*values.last().unwrap(), 0.98);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let bad = [
            SweepConfig {
                target_fraction: 0.0,
                ..SweepConfig::default()
            },
            SweepConfig {
                tolerance: -0.1,
                ..SweepConfig::default()
            },
            SweepConfig {
                lambda_step: 1.0,
                ..SweepConfig::default()
            },
            SweepConfig {
                max_iterations: 0,
                ..SweepConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(PopsplitError::Configuration(_))
            ));
        }
        let geometry = GeometryConfig {
            quantization: 1.0,
            ..GeometryConfig::default()
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[sweep]\nlambda_step = 0.25\nwarm_start = true\nbackend = \"edmonds-karp\"\n\n[geometry]\nsimplify_tolerance = 10.0"
        )
        .unwrap();
        let config = PopsplitConfig::load(file.path()).unwrap();
        assert_eq!(config.sweep.lambda_step, 0.25);
        assert!(config.sweep.warm_start);
        assert_eq!(config.sweep.backend, MaxFlowKind::EdmondsKarp);
        assert_eq!(config.sweep.tolerance, 0.01);
        assert_eq!(config.geometry.simplify_tolerance, 10.0);
        assert_eq!(config.sweep.lambda_values(), vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn worker_count_resolves_auto() {
        let config = SweepConfig::default();
        assert!(config.worker_count() >= 1);
        let config = SweepConfig {
            max_workers: 3,
            ..SweepConfig::default()
        };
        assert_eq!(config.worker_count(), 3);
    }
}
