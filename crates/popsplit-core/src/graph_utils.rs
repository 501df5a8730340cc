use petgraph::algo::connected_components as petgraph_components;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::attributes::GraphAttributes;

/// Undirected adjacency graph with unit indices as node weights and shared
/// boundary lengths as edge weights. Node `i` is unit `i`.
pub fn adjacency_graph(attrs: &GraphAttributes) -> UnGraph<usize, f64> {
    let mut graph = UnGraph::with_capacity(attrs.num_units(), attrs.num_edges());
    for index in 0..attrs.num_units() {
        graph.add_node(index);
    }
    for edge in attrs.edges() {
        graph.add_edge(NodeIndex::new(edge.a), NodeIndex::new(edge.b), edge.length);
    }
    graph
}

/// Number of connected components in the adjacency graph.
pub fn connected_components(attrs: &GraphAttributes) -> usize {
    petgraph_components(&adjacency_graph(attrs))
}

/// Units with no neighbours; they carry no boundary cost in any network.
pub fn isolated_units(attrs: &GraphAttributes) -> Vec<usize> {
    let mut degree = vec![0usize; attrs.num_units()];
    for edge in attrs.edges() {
        degree[edge.a] += 1;
        degree[edge.b] += 1;
    }
    degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect()
}

/// Number of adjacency clusters formed by the selected units.
///
/// Only edges with both ends selected are kept; every unselected unit is then
/// a singleton component and is subtracted from the count.
pub fn selected_components(attrs: &GraphAttributes, mask: &[bool]) -> usize {
    let mut graph: UnGraph<usize, f64> = UnGraph::with_capacity(attrs.num_units(), 0);
    for index in 0..attrs.num_units() {
        graph.add_node(index);
    }
    let is_selected = |i: usize| mask.get(i).copied().unwrap_or(false);
    for edge in attrs.edges() {
        if is_selected(edge.a) && is_selected(edge.b) {
            graph.add_edge(NodeIndex::new(edge.a), NodeIndex::new(edge.b), edge.length);
        }
    }
    let unselected = (0..attrs.num_units()).filter(|&i| !is_selected(i)).count();
    petgraph_components(&graph).saturating_sub(unselected)
}
