//! Rook adjacency and shared boundary lengths from unit geometries.
//!
//! Two units are adjacent when they share at least one boundary segment with
//! identical end coordinates, which holds for any clean polygon coverage
//! (census-style tract layers are distributed that way). Units touching at a
//! single vertex are not adjacent.

use std::collections::{BTreeMap, HashMap};

use geo::{Coord, MultiPolygon};
use popsplit_core::graph_utils::isolated_units;
use popsplit_core::{AdjacencyEdge, GraphAttributes, PopsplitResult};
use tracing::{info, warn};

use crate::io::UnitLayer;

/// Bit-exact coordinate key.
pub(crate) type PointKey = (u64, u64);

pub(crate) fn point_key(c: Coord<f64>) -> PointKey {
    // 0.0 and -0.0 must collide
    let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (norm(c.x).to_bits(), norm(c.y).to_bits())
}

/// What the adjacency pass found, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyReport {
    pub num_units: usize,
    pub num_edges: usize,
    /// Units without any shared boundary; they carry no boundary cost.
    pub isolated: Vec<usize>,
    pub total_shared_length: f64,
}

/// Derive the optimisation inputs from a unit layer.
pub fn build_graph_attributes(
    layer: &UnitLayer,
) -> PopsplitResult<(GraphAttributes, AdjacencyReport)> {
    let lengths = shared_boundary_lengths(layer.geometries());
    let edges = lengths
        .iter()
        .map(|(&(a, b), &length)| AdjacencyEdge::new(a, b, length))
        .collect::<PopsplitResult<Vec<_>>>()?;
    let total_shared_length = lengths.values().sum();

    let attrs = GraphAttributes::new(layer.populations(), layer.areas(), edges)?;
    let isolated = isolated_units(&attrs);
    if !isolated.is_empty() {
        warn!(
            count = isolated.len(),
            "units without shared boundaries; they will be selected on density alone"
        );
    }
    info!(
        units = attrs.num_units(),
        edges = attrs.num_edges(),
        rho = attrs.characteristic_length(),
        "built graph attributes"
    );

    let report = AdjacencyReport {
        num_units: attrs.num_units(),
        num_edges: attrs.num_edges(),
        isolated,
        total_shared_length,
    };
    Ok((attrs, report))
}

/// Summed length of exactly shared segments per unit pair `(a, b)`, `a < b`.
pub fn shared_boundary_lengths<'a>(
    geometries: impl Iterator<Item = &'a MultiPolygon<f64>>,
) -> BTreeMap<(usize, usize), f64> {
    let mut owners: HashMap<(PointKey, PointKey), (f64, Vec<usize>)> = HashMap::new();
    for (unit, geometry) in geometries.enumerate() {
        for polygon in &geometry.0 {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                for line in ring.lines() {
                    let (p, q) = (point_key(line.start), point_key(line.end));
                    if p == q {
                        continue;
                    }
                    let key = if p < q { (p, q) } else { (q, p) };
                    let entry = owners.entry(key).or_insert_with(|| {
                        let d = line.end - line.start;
                        (d.x.hypot(d.y), Vec::new())
                    });
                    if entry.1.last() != Some(&unit) {
                        entry.1.push(unit);
                    }
                }
            }
        }
    }

    let mut lengths = BTreeMap::new();
    for (length, units) in owners.into_values() {
        for (i, &a) in units.iter().enumerate() {
            for &b in &units[i + 1..] {
                if a != b {
                    *lengths.entry((a.min(b), a.max(b))).or_insert(0.0) += length;
                }
            }
        }
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::grid_layer;
    use popsplit_core::fixtures::{grid_attributes, DENSE_CENTRE_3X3};

    #[test]
    fn grid_geometry_matches_grid_fixture() {
        let layer = grid_layer(3, 3, &DENSE_CENTRE_3X3);
        let (attrs, report) = build_graph_attributes(&layer).unwrap();
        let expected = grid_attributes(3, 3, &DENSE_CENTRE_3X3);
        assert_eq!(attrs, expected);
        assert_eq!(report.num_edges, 12);
        assert!(report.isolated.is_empty());
        assert_eq!(report.total_shared_length, 12.0);
    }

    #[test]
    fn diagonal_touch_is_not_adjacency() {
        let layer = grid_layer(2, 2, &[1, 0, 0, 1]);
        let lengths = shared_boundary_lengths(layer.geometries());
        assert!(!lengths.contains_key(&(0, 3)));
        assert!(!lengths.contains_key(&(1, 2)));
        assert_eq!(lengths.len(), 4);
    }

    #[test]
    fn split_segments_accumulate_length() {
        use geo::polygon;
        // Right-hand unit has an extra vertex on the shared side.
        let left = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 0.5), (x: 1.0, y: 2.0), (x: 0.0, y: 2.0),
        ]]);
        let right = MultiPolygon::new(vec![polygon![
            (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0), (x: 1.0, y: 0.5),
        ]]);
        let lengths = shared_boundary_lengths([left, right].iter());
        assert_eq!(lengths.get(&(0, 1)), Some(&2.0));
    }

    #[test]
    fn isolated_units_are_reported() {
        use crate::io::{UnitFeature, UnitLayer};
        use geo::polygon;
        let mut features = grid_layer(1, 2, &[3, 4]).features().to_vec();
        features.push(UnitFeature {
            id: "island".into(),
            population: 5,
            geometry: MultiPolygon::new(vec![polygon![
                (x: 10.0, y: 10.0), (x: 11.0, y: 10.0), (x: 11.0, y: 11.0), (x: 10.0, y: 11.0),
            ]]),
        });
        let layer = UnitLayer::new(features).unwrap();
        let (attrs, report) = build_graph_attributes(&layer).unwrap();
        assert_eq!(report.isolated, vec![2]);
        assert_eq!(attrs.num_edges(), 1);
    }
}
