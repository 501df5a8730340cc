//! Unit-square layers matching `popsplit_core::fixtures::grid_attributes`.

use geo::{polygon, MultiPolygon};

use crate::io::{UnitFeature, UnitLayer};

/// Row-major grid of unit squares; cell `(r, c)` spans `[c, c+1] × [r, r+1]`.
pub fn grid_layer(rows: usize, cols: usize, population: &[u64]) -> UnitLayer {
    assert_eq!(population.len(), rows * cols, "one population per cell");
    let features = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .map(|(r, c)| {
            let (x, y) = (c as f64, r as f64);
            UnitFeature {
                id: format!("r{r}c{c}"),
                population: population[r * cols + c],
                geometry: MultiPolygon::new(vec![polygon![
                    (x: x, y: y),
                    (x: x + 1.0, y: y),
                    (x: x + 1.0, y: y + 1.0),
                    (x: x, y: y + 1.0),
                ]]),
            }
        })
        .collect();
    UnitLayer::new(features).expect("grid layer is well formed")
}

/// Mask selecting the given cell indices.
pub fn mask_of(num_units: usize, selected: &[usize]) -> Vec<bool> {
    let mut mask = vec![false; num_units];
    for &i in selected {
        mask[i] = true;
    }
    mask
}
