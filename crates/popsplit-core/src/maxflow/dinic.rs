use super::residual::ResidualGraph;
use super::{FlowProblem, FlowSolution, MaxFlowBackend};
use crate::error::PopsplitResult;

/// Dinic's blocking-flow algorithm with an explicit DFS stack, so deep level
/// graphs on large adjacency networks never touch the call stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct DinicSolver;

impl MaxFlowBackend for DinicSolver {
    fn name(&self) -> &'static str {
        "dinic"
    }

    fn solve(&self, problem: &FlowProblem) -> PopsplitResult<FlowSolution> {
        problem.validate()?;
        let mut graph = ResidualGraph::from_problem(problem);
        let mut augmented = 0.0;
        loop {
            let level = graph.bfs_levels();
            if level[graph.sink] == usize::MAX {
                break;
            }
            let mut next_arc = vec![0usize; graph.node_count()];
            while let Some(pushed) = augment_once(&mut graph, &level, &mut next_arc) {
                augmented += pushed;
            }
        }
        Ok(graph.into_solution(augmented))
    }
}

/// Push one source→sink path of the level graph; `None` once the level graph
/// is blocked.
fn augment_once(graph: &mut ResidualGraph, level: &[usize], next_arc: &mut [usize]) -> Option<f64> {
    let mut path: Vec<usize> = Vec::new();
    let mut u = graph.source;
    loop {
        if u == graph.sink {
            let bottleneck = path
                .iter()
                .map(|&arc| graph.arcs[arc].cap)
                .fold(f64::INFINITY, f64::min);
            for &arc in &path {
                graph.push(arc, bottleneck);
            }
            return Some(bottleneck);
        }

        let mut advanced = false;
        while next_arc[u] < graph.adjacency[u].len() {
            let arc = graph.adjacency[u][next_arc[u]];
            let v = graph.arcs[arc].to;
            if graph.open(arc) && level[v] == level[u] + 1 {
                path.push(arc);
                u = v;
                advanced = true;
                break;
            }
            next_arc[u] += 1;
        }

        if !advanced {
            // Dead end: step back and skip the arc that led here.
            let arc = path.pop()?;
            u = graph.arcs[arc ^ 1].to;
            next_arc[u] += 1;
        }
    }
}
