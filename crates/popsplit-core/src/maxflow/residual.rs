use std::collections::VecDeque;

use super::{FlowProblem, FlowSolution, Segment};

/// Relative tolerance below which a residual capacity counts as saturated.
const RELATIVE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub(super) struct ResidualArc {
    pub to: usize,
    pub cap: f64,
}

/// Residual graph over `num_nodes + 2` vertices. Arcs are stored in pairs so
/// the reverse of arc `e` is `e ^ 1`.
#[derive(Debug)]
pub(super) struct ResidualGraph {
    pub arcs: Vec<ResidualArc>,
    pub adjacency: Vec<Vec<usize>>,
    pub source: usize,
    pub sink: usize,
    pub eps: f64,
    /// Flow pushed straight through source → node → sink during setup.
    pub direct_flow: f64,
}

impl ResidualGraph {
    pub fn from_problem(problem: &FlowProblem) -> Self {
        let n = problem.num_nodes;
        let source = n;
        let sink = n + 1;
        let mut graph = Self {
            arcs: Vec::with_capacity(2 * (2 * n + problem.edges.len())),
            adjacency: vec![Vec::new(); n + 2],
            source,
            sink,
            eps: RELATIVE_EPS * (1.0 + problem.max_capacity()),
            direct_flow: 0.0,
        };

        for (node, &(source_cap, sink_cap)) in problem.terminals.iter().enumerate() {
            // Any flow that can go straight through a node is pushed up front.
            let through = source_cap.min(sink_cap);
            graph.direct_flow += through;
            let (source_cap, sink_cap) = (source_cap - through, sink_cap - through);
            if source_cap > 0.0 {
                graph.add_pair(source, node, source_cap, 0.0);
            }
            if sink_cap > 0.0 {
                graph.add_pair(node, sink, sink_cap, 0.0);
            }
        }
        for &(i, j, cap_ij, cap_ji) in &problem.edges {
            if cap_ij > 0.0 || cap_ji > 0.0 {
                graph.add_pair(i, j, cap_ij, cap_ji);
            }
        }
        graph
    }

    fn add_pair(&mut self, from: usize, to: usize, cap: f64, reverse_cap: f64) {
        let idx = self.arcs.len();
        self.arcs.push(ResidualArc { to, cap });
        self.arcs.push(ResidualArc {
            to: from,
            cap: reverse_cap,
        });
        self.adjacency[from].push(idx);
        self.adjacency[to].push(idx + 1);
    }

    #[inline]
    pub fn open(&self, arc: usize) -> bool {
        self.arcs[arc].cap > self.eps
    }

    pub fn push(&mut self, arc: usize, amount: f64) {
        self.arcs[arc].cap -= amount;
        self.arcs[arc ^ 1].cap += amount;
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Breadth-first search over open arcs; returns the distance label of
    /// every vertex (`usize::MAX` when unreachable).
    pub fn bfs_levels(&self) -> Vec<usize> {
        let mut level = vec![usize::MAX; self.node_count()];
        let mut queue = VecDeque::new();
        level[self.source] = 0;
        queue.push_back(self.source);
        while let Some(u) = queue.pop_front() {
            for &arc in &self.adjacency[u] {
                let v = self.arcs[arc].to;
                if level[v] == usize::MAX && self.open(arc) {
                    level[v] = level[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        level
    }

    /// Label nodes by residual reachability from the source.
    pub fn into_solution(self, augmented: f64) -> FlowSolution {
        let level = self.bfs_levels();
        let segments = (0..self.source)
            .map(|node| {
                if level[node] == usize::MAX {
                    Segment::Sink
                } else {
                    Segment::Source
                }
            })
            .collect();
        FlowSolution {
            flow_value: self.direct_flow + augmented,
            segments,
        }
    }
}
