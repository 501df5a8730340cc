//! Dissolve selected units into one multi-part region.
//!
//! Units form a coverage (neighbours share identical boundary vertices), so
//! the union can be computed topologically: orient every ring, drop each
//! boundary segment that also appears reversed in a neighbour, and chain the
//! remaining segments back into rings. Output vertices are exactly unit
//! vertices, which keeps boundaries shared with unselected neighbours and
//! with other λ regions coincident. When the chained result is not valid
//! (overlapping or non-coverage input), a boolean union is used instead.

use std::collections::HashMap;

use geo::algorithm::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Contains, Coord, LineString, MultiPolygon, Polygon};
use popsplit_algo::LambdaResult;
use popsplit_core::{PopsplitError, PopsplitResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adjacency::{point_key, PointKey};
use crate::io::UnitLayer;
use crate::validity::{is_valid_multipolygon, ring_probe, ring_signed_area2};

/// Dissolved geometry of one λ, with the figures exported alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DissolvedRegion {
    pub lambda: f64,
    pub mu: f64,
    pub converged: bool,
    #[serde(skip)]
    pub geometry: MultiPolygon<f64>,
    pub num_parts: usize,
    pub num_units: usize,
    /// Planar area of the dissolved geometry.
    pub area: f64,
    pub population_selected: u64,
    pub total_population: u64,
}

/// Union the geometries of every unit selected by `mask`.
pub fn dissolve_partition(layer: &UnitLayer, mask: &[bool]) -> PopsplitResult<MultiPolygon<f64>> {
    if mask.len() != layer.len() {
        return Err(PopsplitError::Validation(format!(
            "mask has {} entries for {} units",
            mask.len(),
            layer.len()
        )));
    }
    let polygons: Vec<&Polygon<f64>> = layer
        .features()
        .iter()
        .zip(mask)
        .filter(|(_, &selected)| selected)
        .flat_map(|(feature, _)| feature.geometry.0.iter())
        .collect();
    if polygons.is_empty() {
        return Err(PopsplitError::Geometry(
            "cannot dissolve an empty selection".into(),
        ));
    }

    let merged = coverage_union(&polygons);
    if is_valid_multipolygon(&merged) {
        return Ok(merged);
    }

    warn!(
        polygons = polygons.len(),
        "coverage union produced invalid geometry; falling back to boolean union"
    );
    let repaired = boolean_union(&polygons);
    if repaired.0.is_empty() || !is_valid_multipolygon(&repaired) {
        return Err(PopsplitError::Geometry(format!(
            "dissolve of {} polygons is invalid after repair",
            polygons.len()
        )));
    }
    Ok(repaired)
}

/// Dissolve the selection recorded for one λ of a sweep.
pub fn dissolve_lambda(layer: &UnitLayer, entry: &LambdaResult) -> PopsplitResult<DissolvedRegion> {
    let result = &entry.search.result;
    let geometry = dissolve_partition(layer, &result.mask)?;
    let region = DissolvedRegion {
        lambda: entry.lambda,
        mu: result.mu,
        converged: entry.converged(),
        num_parts: geometry.0.len(),
        num_units: result.num_selected(),
        area: geometry.unsigned_area(),
        population_selected: result.selected_population,
        total_population: result.total_population,
        geometry,
    };
    info!(
        lambda = region.lambda,
        parts = region.num_parts,
        units = region.num_units,
        area = region.area,
        "dissolved region"
    );
    Ok(region)
}

fn boolean_union(polygons: &[&Polygon<f64>]) -> MultiPolygon<f64> {
    polygons
        .iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
            acc.union(&MultiPolygon::new(vec![(*polygon).clone()]))
        })
}

/// Topological union of polygons that share boundary segments exactly.
pub(crate) fn coverage_union(polygons: &[&Polygon<f64>]) -> MultiPolygon<f64> {
    let mut coords: HashMap<PointKey, Coord<f64>> = HashMap::new();
    let mut directed: HashMap<(PointKey, PointKey), usize> = HashMap::new();
    for polygon in polygons {
        let oriented = polygon.orient(Direction::Default);
        for ring in std::iter::once(oriented.exterior()).chain(oriented.interiors()) {
            for line in ring.lines() {
                let (p, q) = (point_key(line.start), point_key(line.end));
                if p == q {
                    continue;
                }
                coords.entry(p).or_insert(line.start);
                coords.entry(q).or_insert(line.end);
                *directed.entry((p, q)).or_insert(0) += 1;
            }
        }
    }

    // Cancel segments traversed in both directions (interior boundaries).
    let mut outgoing: HashMap<PointKey, Vec<PointKey>> = HashMap::new();
    for (&(p, q), &count) in &directed {
        let reverse = directed.get(&(q, p)).copied().unwrap_or(0);
        for _ in 0..count.saturating_sub(reverse) {
            outgoing.entry(p).or_default().push(q);
        }
    }
    for targets in outgoing.values_mut() {
        targets.sort_unstable();
    }

    let rings = chain_rings(&mut outgoing, &coords);
    assemble(rings)
}

/// Walk remaining directed segments into closed rings, turning as far left
/// as possible wherever several segments leave the same vertex.
fn chain_rings(
    outgoing: &mut HashMap<PointKey, Vec<PointKey>>,
    coords: &HashMap<PointKey, Coord<f64>>,
) -> Vec<Vec<Coord<f64>>> {
    let mut starts: Vec<PointKey> = outgoing.keys().copied().collect();
    starts.sort_unstable();

    let mut rings = Vec::new();
    for start in starts {
        while let Some(first) = outgoing.get_mut(&start).and_then(|t| t.pop()) {
            let mut ring = vec![coords[&start], coords[&first]];
            let (mut prev, mut current) = (start, first);
            while current != start {
                let Some(next) = take_leftmost(outgoing, coords, prev, current) else {
                    break;
                };
                ring.push(coords[&next]);
                prev = current;
                current = next;
            }
            if current == start && ring.len() >= 4 {
                rings.push(ring);
            } else {
                debug!(vertices = ring.len(), "dropping unclosed boundary chain");
            }
        }
    }
    rings
}

fn take_leftmost(
    outgoing: &mut HashMap<PointKey, Vec<PointKey>>,
    coords: &HashMap<PointKey, Coord<f64>>,
    prev: PointKey,
    current: PointKey,
) -> Option<PointKey> {
    let targets = outgoing.get_mut(&current)?;
    if targets.is_empty() {
        return None;
    }
    let (a, b) = (coords[&prev], coords[&current]);
    let incoming = (b.x - a.x, b.y - a.y);
    let turn = |key: &PointKey| {
        let c = coords[key];
        let out = (c.x - b.x, c.y - b.y);
        let cross = incoming.0 * out.1 - incoming.1 * out.0;
        let dot = incoming.0 * out.0 + incoming.1 * out.1;
        cross.atan2(dot)
    };
    let best = (0..targets.len()).max_by(|&i, &j| turn(&targets[i]).total_cmp(&turn(&targets[j])))?;
    Some(targets.swap_remove(best))
}

/// Counter-clockwise rings become shells; clockwise rings become holes of
/// the smallest shell containing them.
fn assemble(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut shells: Vec<(LineString<f64>, f64, Vec<LineString<f64>>)> = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        let area2 = ring_signed_area2(&ring);
        if area2 > 0.0 {
            shells.push((LineString::from(ring), area2, Vec::new()));
        } else if area2 < 0.0 {
            holes.push(LineString::from(ring));
        }
    }
    shells.sort_by(|a, b| b.1.total_cmp(&a.1));

    let outlines: Vec<Polygon<f64>> = shells
        .iter()
        .map(|(ring, _, _)| Polygon::new(ring.clone(), vec![]))
        .collect();
    for hole in holes {
        let Some(probe) = ring_probe(&hole) else { continue };
        // Shells are sorted by decreasing area; the last match is the smallest.
        match outlines.iter().rposition(|outline| outline.contains(&probe)) {
            Some(owner) => shells[owner].2.push(hole),
            None => debug!("dropping hole outside every shell"),
        }
    }

    MultiPolygon::new(
        shells
            .into_iter()
            .map(|(exterior, _, interiors)| Polygon::new(exterior, interiors))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{grid_layer, mask_of};

    fn layer() -> UnitLayer {
        grid_layer(3, 3, &[1; 9])
    }

    #[test]
    fn single_unit_is_unchanged() {
        let geometry = dissolve_partition(&layer(), &mask_of(9, &[4])).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert_eq!(geometry.unsigned_area(), 1.0);
        assert_eq!(geometry.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn adjacent_units_merge_into_one_part() {
        let geometry = dissolve_partition(&layer(), &mask_of(9, &[0, 1, 3, 4])).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert!(geometry.0[0].interiors().is_empty());
        assert_eq!(geometry.unsigned_area(), 4.0);
        assert!(is_valid_multipolygon(&geometry));
    }

    #[test]
    fn ring_of_units_keeps_its_hole() {
        let geometry = dissolve_partition(&layer(), &mask_of(9, &[0, 1, 2, 3, 5, 6, 7, 8])).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert_eq!(geometry.0[0].interiors().len(), 1);
        assert_eq!(geometry.unsigned_area(), 8.0);
    }

    #[test]
    fn diagonal_units_stay_separate_parts() {
        let geometry = dissolve_partition(&layer(), &mask_of(9, &[0, 4, 8])).unwrap();
        assert_eq!(geometry.0.len(), 3);
        assert_eq!(geometry.unsigned_area(), 3.0);
        assert!(is_valid_multipolygon(&geometry));
    }

    #[test]
    fn empty_selection_is_a_geometry_error() {
        assert!(matches!(
            dissolve_partition(&layer(), &[false; 9]),
            Err(PopsplitError::Geometry(_))
        ));
        assert!(matches!(
            dissolve_partition(&layer(), &[true; 4]),
            Err(PopsplitError::Validation(_))
        ));
    }

    #[test]
    fn overlapping_input_falls_back_to_boolean_union() {
        use crate::io::UnitFeature;
        use geo::polygon;
        let square = |x: f64| {
            MultiPolygon::new(vec![polygon![
                (x: x, y: 0.0), (x: x + 2.0, y: 0.0), (x: x + 2.0, y: 2.0), (x: x, y: 2.0),
            ]])
        };
        let layer = UnitLayer::new(vec![
            UnitFeature { id: "a".into(), population: 1, geometry: square(0.0) },
            UnitFeature { id: "b".into(), population: 1, geometry: square(1.0) },
        ])
        .unwrap();
        let geometry = dissolve_partition(&layer, &[true, true]).unwrap();
        assert_eq!(geometry.0.len(), 1);
        assert!((geometry.unsigned_area() - 6.0).abs() < 1e-9);
    }
}
