use std::collections::VecDeque;

use super::residual::ResidualGraph;
use super::{FlowProblem, FlowSolution, MaxFlowBackend};
use crate::error::PopsplitResult;

/// Shortest-augmenting-path max flow. Slower than [`super::DinicSolver`] but
/// simple enough to serve as a cross-check.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdmondsKarpSolver;

impl MaxFlowBackend for EdmondsKarpSolver {
    fn name(&self) -> &'static str {
        "edmonds-karp"
    }

    fn solve(&self, problem: &FlowProblem) -> PopsplitResult<FlowSolution> {
        problem.validate()?;
        let mut graph = ResidualGraph::from_problem(problem);
        let mut augmented = 0.0;
        while let Some(path) = shortest_path(&graph) {
            let bottleneck = path
                .iter()
                .map(|&arc| graph.arcs[arc].cap)
                .fold(f64::INFINITY, f64::min);
            for &arc in &path {
                graph.push(arc, bottleneck);
            }
            augmented += bottleneck;
        }
        Ok(graph.into_solution(augmented))
    }
}

/// Arcs of a shortest open source→sink path, if any.
fn shortest_path(graph: &ResidualGraph) -> Option<Vec<usize>> {
    let mut parent_arc = vec![usize::MAX; graph.node_count()];
    let mut visited = vec![false; graph.node_count()];
    let mut queue = VecDeque::new();
    visited[graph.source] = true;
    queue.push_back(graph.source);

    while let Some(u) = queue.pop_front() {
        if u == graph.sink {
            break;
        }
        for &arc in &graph.adjacency[u] {
            let v = graph.arcs[arc].to;
            if !visited[v] && graph.open(arc) {
                visited[v] = true;
                parent_arc[v] = arc;
                queue.push_back(v);
            }
        }
    }
    if !visited[graph.sink] {
        return None;
    }

    let mut path = Vec::new();
    let mut v = graph.sink;
    while v != graph.source {
        let arc = parent_arc[v];
        path.push(arc);
        v = graph.arcs[arc ^ 1].to;
    }
    path.reverse();
    Some(path)
}
