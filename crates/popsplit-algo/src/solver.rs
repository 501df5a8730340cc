//! Single `(λ, μ)` partition solve.

use std::sync::Arc;

use popsplit_core::graph_utils::selected_components;
use popsplit_core::{GraphAttributes, MaxFlowBackend, MaxFlowKind, PopsplitError, PopsplitResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::network::{build_flow_network, compute_energy};

/// Relative tolerance between the reported flow and the recomputed cut.
const CUT_CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Outcome of one min-cut solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionResult {
    pub lambda: f64,
    pub mu: f64,
    /// `true` for selected units (source side of the cut).
    pub mask: Vec<bool>,
    pub selected_population: u64,
    pub total_population: u64,
    pub selected_area: f64,
    pub total_area: f64,
    pub population_fraction: f64,
    /// Max-flow value, equal to `energy + μ · total_population`.
    pub flow_value: f64,
    pub energy: f64,
    /// Adjacency clusters among selected units.
    pub num_components: usize,
}

impl PartitionResult {
    pub fn num_selected(&self) -> usize {
        self.mask.iter().filter(|&&s| s).count()
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, &s)| s)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn satisfies(&self, target_fraction: f64, tolerance: f64) -> bool {
        (self.population_fraction - target_fraction).abs() < tolerance
    }
}

/// Builds the network for a `(λ, μ)` pair and extracts the selection from a
/// [`MaxFlowBackend`].
#[derive(Clone)]
pub struct PartitionSolver {
    backend: Arc<dyn MaxFlowBackend>,
}

impl Default for PartitionSolver {
    fn default() -> Self {
        Self::from_kind(MaxFlowKind::default())
    }
}

impl std::fmt::Debug for PartitionSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionSolver")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl PartitionSolver {
    pub fn new(backend: Arc<dyn MaxFlowBackend>) -> Self {
        Self { backend }
    }

    pub fn from_kind(kind: MaxFlowKind) -> Self {
        Self::new(kind.build_backend())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn solve(
        &self,
        attrs: &GraphAttributes,
        lambda: f64,
        mu: f64,
    ) -> PopsplitResult<PartitionResult> {
        let network = build_flow_network(attrs, lambda, mu)?;
        let solution = self
            .backend
            .solve(&network.to_flow_problem())
            .map_err(|err| match err {
                PopsplitError::Solver { .. } => err,
                other => PopsplitError::solver(lambda, mu, other.to_string()),
            })?;

        let flow = solution.flow_value;
        if !flow.is_finite() || flow < 0.0 {
            return Err(PopsplitError::solver(
                lambda,
                mu,
                format!("backend '{}' returned flow value {flow}", self.backend_name()),
            ));
        }
        if solution.segments.len() != attrs.num_units() {
            return Err(PopsplitError::solver(
                lambda,
                mu,
                format!(
                    "backend '{}' labelled {} nodes for {} units",
                    self.backend_name(),
                    solution.segments.len(),
                    attrs.num_units()
                ),
            ));
        }

        let mask: Vec<bool> = (0..attrs.num_units())
            .map(|i| solution.is_source(i))
            .collect();
        let cut = network.cut_value(&mask);
        let scale = 1.0_f64.max(flow.abs()).max(cut.abs());
        if (cut - flow).abs() > CUT_CONSISTENCY_TOLERANCE * scale {
            return Err(PopsplitError::solver(
                lambda,
                mu,
                format!("flow value {flow} disagrees with cut capacity {cut}"),
            ));
        }

        let energy = compute_energy(attrs, &mask, lambda, mu)?;
        let selected_population = attrs.selected_population(&mask);
        let total_population = attrs.total_population();
        let population_fraction = if total_population == 0 {
            0.0
        } else {
            selected_population as f64 / total_population as f64
        };

        debug!(
            lambda,
            mu,
            flow,
            selected_population,
            population_fraction,
            "partition solved"
        );

        Ok(PartitionResult {
            lambda,
            mu,
            num_components: selected_components(attrs, &mask),
            selected_area: attrs.selected_area(&mask),
            total_area: attrs.total_area(),
            mask,
            selected_population,
            total_population,
            population_fraction,
            flow_value: flow,
            energy: energy.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popsplit_core::fixtures::{grid_attributes, DENSE_CENTRE_3X3};
    use popsplit_core::{FlowProblem, FlowSolution, Segment};

    /// Returns a fixed labelling and flow regardless of the problem.
    struct FixedBackend {
        flow: f64,
        segments: Vec<Segment>,
    }

    impl MaxFlowBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn solve(&self, _problem: &FlowProblem) -> PopsplitResult<FlowSolution> {
            Ok(FlowSolution {
                flow_value: self.flow,
                segments: self.segments.clone(),
            })
        }
    }

    #[test]
    fn zero_mu_selects_nothing() {
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let result = PartitionSolver::default().solve(&attrs, 0.3, 0.0).unwrap();
        assert_eq!(result.num_selected(), 0);
        assert_eq!(result.selected_population, 0);
        assert_eq!(result.population_fraction, 0.0);
        assert_eq!(result.num_components, 0);
    }

    #[test]
    fn large_mu_selects_everything() {
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let result = PartitionSolver::default().solve(&attrs, 0.3, 100.0).unwrap();
        assert_eq!(result.num_selected(), 9);
        assert_eq!(result.population_fraction, 1.0);
        assert_eq!(result.num_components, 1);
    }

    #[test]
    fn centre_alone_at_lambda_zero() {
        // Area cost per unit is 1; the centre pays off once 9μ > 1.
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let result = PartitionSolver::default().solve(&attrs, 0.0, 0.5).unwrap();
        assert_eq!(result.selected_indices(), vec![4]);
        assert_eq!(result.selected_population, 9);
        assert!((result.energy - (1.0 - 4.5)).abs() < 1e-9);
        assert!((result.flow_value - (result.energy + 0.5 * 17.0)).abs() < 1e-9);
    }

    #[test]
    fn backends_give_identical_results() {
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let dinic = PartitionSolver::from_kind(MaxFlowKind::Dinic);
        let ek = PartitionSolver::from_kind(MaxFlowKind::EdmondsKarp);
        for mu in [0.05, 0.2, 0.4, 0.8] {
            let a = dinic.solve(&attrs, 0.5, mu).unwrap();
            let b = ek.solve(&attrs, 0.5, mu).unwrap();
            assert_eq!(a.mask, b.mask);
            assert!((a.flow_value - b.flow_value).abs() < 1e-9);
        }
    }

    #[test]
    fn inconsistent_flow_is_a_solver_error() {
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let solver = PartitionSolver::new(Arc::new(FixedBackend {
            flow: 1000.0,
            segments: vec![Segment::Sink; 9],
        }));
        let err = solver.solve(&attrs, 0.5, 1.0).unwrap_err();
        assert!(matches!(err, PopsplitError::Solver { lambda, .. } if lambda == 0.5));
    }

    #[test]
    fn wrong_segment_count_is_a_solver_error() {
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let solver = PartitionSolver::new(Arc::new(FixedBackend {
            flow: 0.0,
            segments: vec![Segment::Sink; 4],
        }));
        assert!(matches!(
            solver.solve(&attrs, 0.5, 0.0),
            Err(PopsplitError::Solver { .. })
        ));
    }

    #[test]
    fn invalid_lambda_is_not_a_solver_error() {
        let attrs = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        let err = PartitionSolver::default().solve(&attrs, 1.0, 1.0).unwrap_err();
        assert!(err.is_configuration());
    }
}
