//! Max-flow / min-cut capability.
//!
//! The partition solver only depends on [`MaxFlowBackend`]: a node count,
//! per-node terminal capacities and symmetric pairwise edges go in, a flow
//! value and a per-node terminal side come out. Two backends ship with the
//! crate and are selected through [`MaxFlowKind`].
//!
//! Every backend labels as [`Segment::Source`] exactly the nodes reachable
//! from the source in the final residual graph. That is the minimal minimum
//! cut, which keeps the selected set monotone as source capacities grow.

mod dinic;
mod edmonds_karp;
mod residual;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PopsplitError, PopsplitResult};

pub use dinic::DinicSolver;
pub use edmonds_karp::EdmondsKarpSolver;

/// Side of the minimum cut a node ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Source,
    Sink,
}

/// An s-t network over `num_nodes` non-terminal nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowProblem {
    pub num_nodes: usize,
    /// `(source → node, node → sink)` capacity per node.
    pub terminals: Vec<(f64, f64)>,
    /// `(i, j, capacity i → j, capacity j → i)`.
    pub edges: Vec<(usize, usize, f64, f64)>,
}

impl FlowProblem {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            terminals: vec![(0.0, 0.0); num_nodes],
            edges: Vec::new(),
        }
    }

    pub fn set_terminal(&mut self, node: usize, source_cap: f64, sink_cap: f64) {
        self.terminals[node] = (source_cap, sink_cap);
    }

    pub fn add_edge(&mut self, i: usize, j: usize, cap_ij: f64, cap_ji: f64) {
        self.edges.push((i, j, cap_ij, cap_ji));
    }

    /// Reject shapes and capacities no backend can handle.
    pub fn validate(&self) -> PopsplitResult<()> {
        if self.terminals.len() != self.num_nodes {
            return Err(PopsplitError::Validation(format!(
                "flow problem has {} terminal pairs for {} nodes",
                self.terminals.len(),
                self.num_nodes
            )));
        }
        let bad_cap = |c: f64| !c.is_finite() || c < 0.0;
        if let Some((node, _)) = self
            .terminals
            .iter()
            .enumerate()
            .find(|(_, (s, t))| bad_cap(*s) || bad_cap(*t))
        {
            return Err(PopsplitError::Validation(format!(
                "node {node} has a negative or non-finite terminal capacity"
            )));
        }
        for &(i, j, cij, cji) in &self.edges {
            if i >= self.num_nodes || j >= self.num_nodes || i == j {
                return Err(PopsplitError::Validation(format!(
                    "flow edge ({i}, {j}) is invalid for {} nodes",
                    self.num_nodes
                )));
            }
            if bad_cap(cij) || bad_cap(cji) {
                return Err(PopsplitError::Validation(format!(
                    "flow edge ({i}, {j}) has a negative or non-finite capacity"
                )));
            }
        }
        Ok(())
    }

    /// Largest capacity in the network, used to scale numeric tolerances.
    pub(crate) fn max_capacity(&self) -> f64 {
        let terminals = self.terminals.iter().flat_map(|&(s, t)| [s, t]);
        let edges = self.edges.iter().flat_map(|&(_, _, a, b)| [a, b]);
        terminals.chain(edges).fold(0.0, f64::max)
    }
}

/// Result of one max-flow computation.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    pub flow_value: f64,
    pub segments: Vec<Segment>,
}

impl FlowSolution {
    pub fn is_source(&self, node: usize) -> bool {
        self.segments.get(node) == Some(&Segment::Source)
    }
}

/// A max-flow / min-cut engine.
pub trait MaxFlowBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &FlowProblem) -> PopsplitResult<FlowSolution>;
}

/// Registry of the bundled max-flow backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaxFlowKind {
    #[default]
    Dinic,
    EdmondsKarp,
}

impl MaxFlowKind {
    pub fn build_backend(self) -> Arc<dyn MaxFlowBackend> {
        match self {
            MaxFlowKind::Dinic => Arc::new(DinicSolver),
            MaxFlowKind::EdmondsKarp => Arc::new(EdmondsKarpSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["dinic", "edmonds-karp"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaxFlowKind::Dinic => "dinic",
            MaxFlowKind::EdmondsKarp => "edmonds-karp",
        }
    }
}

impl FromStr for MaxFlowKind {
    type Err = PopsplitError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "dinic" | "default" => Ok(MaxFlowKind::Dinic),
            "edmonds-karp" | "edmonds_karp" | "ek" => Ok(MaxFlowKind::EdmondsKarp),
            other => Err(PopsplitError::Configuration(format!(
                "unknown max-flow backend '{}'; supported values: {}",
                other,
                Self::available().join(", ")
            ))),
        }
    }
}

impl fmt::Display for MaxFlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two nodes joined by a single edge; classic textbook cut.
    fn two_node_problem() -> FlowProblem {
        let mut problem = FlowProblem::new(2);
        problem.set_terminal(0, 5.0, 1.0);
        problem.set_terminal(1, 1.0, 4.0);
        problem.add_edge(0, 1, 2.0, 2.0);
        problem
    }

    fn backends() -> Vec<Arc<dyn MaxFlowBackend>> {
        vec![
            MaxFlowKind::Dinic.build_backend(),
            MaxFlowKind::EdmondsKarp.build_backend(),
        ]
    }

    #[test]
    fn kind_parsing_supports_all_backends() {
        assert_eq!("dinic".parse::<MaxFlowKind>().unwrap(), MaxFlowKind::Dinic);
        assert_eq!(
            "Edmonds-Karp".parse::<MaxFlowKind>().unwrap(),
            MaxFlowKind::EdmondsKarp
        );
        assert!(matches!(
            "simplex".parse::<MaxFlowKind>(),
            Err(PopsplitError::Configuration(_))
        ));
        assert_eq!(MaxFlowKind::default().as_str(), "dinic");
    }

    #[test]
    fn two_node_cut_matches_hand_computation() {
        // Cut {0} | {1}: sink cap of 0 (1) + source cap of 1 (1) + edge 0→1 (2) = 4.
        for backend in backends() {
            let solution = backend.solve(&two_node_problem()).unwrap();
            assert!((solution.flow_value - 4.0).abs() < 1e-9, "{}", backend.name());
            assert_eq!(solution.segments, vec![Segment::Source, Segment::Sink]);
        }
    }

    #[test]
    fn zero_capacities_are_accepted() {
        let mut problem = FlowProblem::new(3);
        problem.set_terminal(0, 0.0, 0.0);
        problem.set_terminal(1, 0.0, 3.0);
        problem.set_terminal(2, 2.0, 0.0);
        problem.add_edge(0, 1, 0.0, 0.0);
        problem.add_edge(1, 2, 0.0, 0.0);
        for backend in backends() {
            let solution = backend.solve(&problem).unwrap();
            assert_eq!(solution.flow_value, 0.0);
            // Unreachable nodes fall on the sink side.
            assert_eq!(
                solution.segments,
                vec![Segment::Sink, Segment::Sink, Segment::Source]
            );
        }
    }

    #[test]
    fn ties_resolve_to_sink_side() {
        let mut problem = FlowProblem::new(1);
        problem.set_terminal(0, 2.0, 2.0);
        for backend in backends() {
            let solution = backend.solve(&problem).unwrap();
            assert_eq!(solution.flow_value, 2.0);
            assert!(!solution.is_source(0));
        }
    }

    #[test]
    fn validate_rejects_negative_capacity() {
        let mut problem = FlowProblem::new(2);
        problem.set_terminal(0, -1.0, 0.0);
        assert!(problem.validate().is_err());

        let mut problem = FlowProblem::new(2);
        problem.add_edge(0, 2, 1.0, 1.0);
        assert!(problem.validate().is_err());
        for backend in backends() {
            assert!(backend.solve(&problem).is_err());
        }
    }

    #[test]
    fn backends_agree_on_a_grid() {
        // 4x4 grid, mixed terminal capacities.
        let n = 16;
        let mut problem = FlowProblem::new(n);
        for i in 0..n {
            let source = ((i * 7) % 5) as f64 * 0.8;
            let sink = ((i * 3) % 4) as f64 * 0.9;
            problem.set_terminal(i, source, sink);
        }
        for r in 0..4 {
            for c in 0..4 {
                let i = r * 4 + c;
                if c + 1 < 4 {
                    problem.add_edge(i, i + 1, 0.7, 0.7);
                }
                if r + 1 < 4 {
                    problem.add_edge(i, i + 4, 0.4, 0.4);
                }
            }
        }
        let dinic = DinicSolver.solve(&problem).unwrap();
        let ek = EdmondsKarpSolver.solve(&problem).unwrap();
        assert!((dinic.flow_value - ek.flow_value).abs() < 1e-9);
        assert_eq!(dinic.segments, ek.segments);
    }
}
