//! Small synthetic layouts shared by the test suites of every crate.

use crate::attributes::{AdjacencyEdge, GraphAttributes};

/// Row-major `rows × cols` grid of unit squares (area 1, shared sides of
/// length 1). `population[r * cols + c]` is the population of cell `(r, c)`.
pub fn grid_attributes(rows: usize, cols: usize, population: &[u64]) -> GraphAttributes {
    assert_eq!(population.len(), rows * cols, "one population per cell");
    let mut edges = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let i = r * cols + c;
            if c + 1 < cols {
                edges.push(AdjacencyEdge { a: i, b: i + 1, length: 1.0 });
            }
            if r + 1 < rows {
                edges.push(AdjacencyEdge { a: i, b: i + cols, length: 1.0 });
            }
        }
    }
    GraphAttributes::new(population.to_vec(), vec![1.0; rows * cols], edges)
        .expect("grid fixture is well formed")
}

/// 3×3 grid with a dense centre (9) surrounded by eight units of 1.
pub const DENSE_CENTRE_3X3: [u64; 9] = [1, 1, 1, 1, 9, 1, 1, 1, 1];

/// 4×4 grid where density and compactness disagree.
///
/// Three isolated corners hold 13 people each (the densest units) while the
/// top-left 2×2 block holds 10 per unit; the remaining units are empty.
/// Ignoring boundaries the corners alone reach ~49% of the population;
/// once boundary length is priced the compact block (~51%) wins.
pub const SCATTERED_VS_BLOCK_4X4: [u64; 16] = [
    10, 10, 0, 13, //
    10, 10, 0, 0, //
    0, 0, 0, 0, //
    13, 0, 0, 13, //
];
