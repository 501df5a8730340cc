//! End-to-end multiplier searches on the synthetic grids

use popsplit_algo::{find_optimal_mu, NoopObserver, PartitionSolver, SearchOptions};
use popsplit_core::fixtures::{grid_attributes, DENSE_CENTRE_3X3, SCATTERED_VS_BLOCK_4X4};

fn search(rows: usize, cols: usize, population: &[u64], lambda: f64, tolerance: f64) -> popsplit_algo::SearchResult {
    let attrs = grid_attributes(rows, cols, population);
    let options = SearchOptions::default().with_target(0.5, tolerance);
    find_optimal_mu(
        &PartitionSolver::default(),
        &attrs,
        lambda,
        &options,
        &NoopObserver,
    )
    .expect("search should run")
}

#[test]
fn dense_centre_is_picked_alone_without_tension() {
    let result = search(3, 3, &DENSE_CENTRE_3X3, 0.0, 0.05);
    assert!(result.converged);
    assert_eq!(result.result.selected_indices(), vec![4]);
    assert!((result.result.population_fraction - 9.0 / 17.0).abs() < 1e-12);
    assert_eq!(result.result.num_components, 1);
}

#[test]
fn dense_centre_with_tension_never_fragments_more() {
    let loose = search(3, 3, &DENSE_CENTRE_3X3, 0.0, 0.05);
    let tight = search(3, 3, &DENSE_CENTRE_3X3, 0.5, 0.05);
    assert!(tight.result.num_components <= loose.result.num_components);
    // Empty and full selections straddle the band, so no μ converges here.
    assert!(!tight.converged);
    assert_eq!(tight.iterations, 50);
}

#[test]
fn scattered_corners_win_without_tension() {
    let result = search(4, 4, &SCATTERED_VS_BLOCK_4X4, 0.0, 0.01);
    assert!(result.converged);
    assert_eq!(result.result.selected_indices(), vec![3, 12, 15]);
    assert_eq!(result.result.selected_population, 39);
    assert_eq!(result.result.num_components, 3);
}

#[test]
fn tension_prefers_the_compact_block() {
    let result = search(4, 4, &SCATTERED_VS_BLOCK_4X4, 0.5, 0.01);
    assert!(result.converged);
    assert_eq!(result.result.selected_indices(), vec![0, 1, 4, 5]);
    assert_eq!(result.result.selected_population, 40);
    assert_eq!(result.result.num_components, 1);
}

#[test]
fn raising_lambda_reduces_fragmentation() {
    let loose = search(4, 4, &SCATTERED_VS_BLOCK_4X4, 0.0, 0.01);
    let tight = search(4, 4, &SCATTERED_VS_BLOCK_4X4, 0.5, 0.01);
    assert!(loose.converged && tight.converged);
    assert!(tight.result.num_components < loose.result.num_components);
}

#[test]
fn history_is_consistent_with_iterations() {
    let result = search(4, 4, &SCATTERED_VS_BLOCK_4X4, 0.5, 0.01);
    assert_eq!(result.mu_history.len(), result.iterations);
    assert_eq!(*result.mu_history.last().unwrap(), result.result.mu);
    assert!(result.mu_history.iter().all(|mu| *mu >= 0.0));
}

/// Lowest energy over every one of the `2^n` selections.
fn brute_force_minimum(attrs: &popsplit_core::GraphAttributes, lambda: f64, mu: f64) -> f64 {
    let n = attrs.num_units();
    (0u32..1 << n)
        .map(|bits| {
            let mask: Vec<bool> = (0..n).map(|i| bits & (1 << i) != 0).collect();
            popsplit_algo::compute_energy(attrs, &mask, lambda, mu)
                .unwrap()
                .total
        })
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn min_cut_matches_exhaustive_search() {
    use popsplit_core::{AdjacencyEdge, GraphAttributes};

    // Eight irregular units: a ring with two chords.
    let edges = [
        (0, 1, 1.5),
        (1, 2, 0.5),
        (2, 3, 2.0),
        (3, 4, 1.0),
        (4, 5, 0.8),
        (5, 6, 1.2),
        (6, 7, 0.3),
        (7, 0, 1.1),
        (0, 4, 0.7),
        (2, 6, 1.6),
    ]
    .iter()
    .map(|&(a, b, len)| AdjacencyEdge::new(a, b, len).unwrap())
    .collect();
    let attrs = GraphAttributes::new(
        vec![12, 3, 30, 7, 0, 18, 5, 22],
        vec![1.0, 2.5, 0.8, 1.7, 3.0, 1.2, 0.6, 2.2],
        edges,
    )
    .unwrap();

    let solver = PartitionSolver::default();
    for &lambda in &[0.0, 0.2, 0.5, 0.8] {
        for &mu in &[0.0, 0.02, 0.05, 0.1, 0.2, 0.5] {
            let result = solver.solve(&attrs, lambda, mu).unwrap();
            let best = brute_force_minimum(&attrs, lambda, mu);
            assert!(
                (result.energy - best).abs() < 1e-9,
                "λ = {lambda}, μ = {mu}: solver {} vs exhaustive {best}",
                result.energy
            );
        }
    }
}
