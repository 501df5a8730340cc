//! Shared-topology simplification.
//!
//! Every ring of every exported feature is cut into arcs at junctions:
//! vertices where the neighbouring vertices differ between the rings passing
//! through them. Identical arcs (in either direction) are stored once and
//! referenced by index, with `!i` (that is `-(i + 1)`) marking a reversed
//! reference. Simplifying each stored arc once keeps every shared boundary
//! coincident across features. Passing the unit rings as context pins every
//! junction of the source coverage as well, so simplified regions keep the
//! exact corner vertices they share with unselected units.

use std::collections::{HashMap, HashSet};

use geo::{Coord, LineString, MultiPolygon, Polygon, Simplify};
use serde::Serialize;
use tracing::{debug, info};

use crate::adjacency::{point_key, PointKey};
use crate::validity::is_valid_multipolygon;

/// Index into [`SharedTopology::arcs`]; negative values are reversed (`!i`).
pub type ArcRef = i64;

/// One feature as arc references: polygons, then rings (exterior first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopoFeature {
    pub polygons: Vec<Vec<Vec<ArcRef>>>,
}

impl TopoFeature {
    fn arc_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.polygons.iter().flatten().flatten().map(|&r| arc_index(r))
    }
}

/// Vertex reduction of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimplifyStats {
    pub original_vertices: usize,
    pub simplified_vertices: usize,
    pub reduction_percent: f64,
    /// Some arcs were put back to their original shape to keep the feature valid.
    pub restored: bool,
}

#[derive(Debug, Clone)]
pub struct SharedTopology {
    original: Vec<Vec<Coord<f64>>>,
    arcs: Vec<Vec<Coord<f64>>>,
    features: Vec<TopoFeature>,
}

pub fn arc_index(arc_ref: ArcRef) -> usize {
    if arc_ref < 0 {
        (!arc_ref) as usize
    } else {
        arc_ref as usize
    }
}

impl SharedTopology {
    /// Build arcs for `features`. Rings in `context` only contribute
    /// junctions; they are not part of the output.
    pub fn build(features: &[MultiPolygon<f64>], context: &[&MultiPolygon<f64>]) -> Self {
        let mut coords: HashMap<PointKey, Coord<f64>> = HashMap::new();
        let mut to_cycle = |ring: &LineString<f64>| -> Vec<PointKey> {
            let mut cycle: Vec<PointKey> = ring
                .0
                .iter()
                .map(|&c| {
                    let key = point_key(c);
                    coords.entry(key).or_insert(c);
                    key
                })
                .collect();
            cycle.dedup();
            if cycle.len() > 1 && cycle.first() == cycle.last() {
                cycle.pop();
            }
            cycle
        };

        let feature_rings: Vec<Vec<Vec<Vec<PointKey>>>> = features
            .iter()
            .map(|mp| {
                mp.0.iter()
                    .map(|polygon| {
                        std::iter::once(polygon.exterior())
                            .chain(polygon.interiors())
                            .map(&mut to_cycle)
                            .collect()
                    })
                    .collect()
            })
            .collect();
        let context_rings: Vec<Vec<PointKey>> = context
            .iter()
            .flat_map(|mp| mp.0.iter())
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
            .map(&mut to_cycle)
            .collect();

        let junctions = find_junctions(
            feature_rings
                .iter()
                .flatten()
                .flatten()
                .chain(context_rings.iter()),
        );

        let mut registry = ArcRegistry::default();
        let topo_features = feature_rings
            .iter()
            .map(|polygons| TopoFeature {
                polygons: polygons
                    .iter()
                    .map(|rings| {
                        rings
                            .iter()
                            .filter(|ring| ring.len() >= 3)
                            .map(|ring| {
                                split_ring(ring, &junctions)
                                    .into_iter()
                                    .map(|arc| registry.intern(arc))
                                    .collect()
                            })
                            .collect()
                    })
                    .collect(),
            })
            .collect();

        let original: Vec<Vec<Coord<f64>>> = registry
            .arcs
            .iter()
            .map(|arc| arc.iter().map(|k| coords[k]).collect())
            .collect();
        debug!(
            features = features.len(),
            arcs = original.len(),
            junctions = junctions.len(),
            "built shared topology"
        );
        Self {
            arcs: original.clone(),
            original,
            features: topo_features,
        }
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Current (possibly simplified) arc coordinates.
    pub fn arcs(&self) -> &[Vec<Coord<f64>>] {
        &self.arcs
    }

    pub fn features(&self) -> &[TopoFeature] {
        &self.features
    }

    /// Rebuild feature `index` from the current arcs.
    pub fn feature_geometry(&self, index: usize) -> MultiPolygon<f64> {
        rebuild(&self.features[index], &self.arcs)
    }

    /// Rebuild feature `index` from the unsimplified arcs.
    pub fn original_geometry(&self, index: usize) -> MultiPolygon<f64> {
        rebuild(&self.features[index], &self.original)
    }

    /// Douglas-Peucker every arc once, then restore the original arcs of any
    /// feature whose rebuilt geometry is invalid until all features are valid.
    pub fn simplify(&mut self, tolerance: f64) -> Vec<SimplifyStats> {
        let fragile = self.fragile_arcs();
        self.arcs = self
            .original
            .iter()
            .zip(&fragile)
            .map(|(arc, &fragile)| simplify_arc(arc, tolerance, fragile))
            .collect();

        let mut restored = vec![false; self.features.len()];
        loop {
            let mut changed = false;
            for (index, feature) in self.features.iter().enumerate() {
                if is_valid_multipolygon(&rebuild(feature, &self.arcs)) {
                    continue;
                }
                restored[index] = true;
                for arc in feature.arc_indices() {
                    if self.arcs[arc] != self.original[arc] {
                        self.arcs[arc] = self.original[arc].clone();
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let stats: Vec<SimplifyStats> = (0..self.features.len())
            .map(|index| {
                let original_vertices = vertex_count(&self.original_geometry(index));
                let simplified_vertices = vertex_count(&self.feature_geometry(index));
                let reduction_percent = if original_vertices == 0 {
                    0.0
                } else {
                    (1.0 - simplified_vertices as f64 / original_vertices as f64) * 100.0
                };
                SimplifyStats {
                    original_vertices,
                    simplified_vertices,
                    reduction_percent,
                    restored: restored[index],
                }
            })
            .collect();
        info!(
            tolerance,
            arcs = self.arcs.len(),
            restored = restored.iter().filter(|&&r| r).count(),
            "simplified shared topology"
        );
        stats
    }

    /// Arcs used by a ring made of fewer than three arcs; those must keep an
    /// interior vertex or the ring collapses.
    fn fragile_arcs(&self) -> Vec<bool> {
        let mut fragile = vec![false; self.original.len()];
        for ring in self.features.iter().flat_map(|f| f.polygons.iter().flatten()) {
            if ring.len() < 3 {
                for &r in ring {
                    fragile[arc_index(r)] = true;
                }
            }
        }
        fragile
    }
}

pub fn vertex_count(geometry: &MultiPolygon<f64>) -> usize {
    geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .map(|ring| ring.0.len())
        .sum()
}

/// Vertices whose unordered neighbour pair differs between occurrences.
fn find_junctions<'a>(rings: impl Iterator<Item = &'a Vec<PointKey>>) -> HashSet<PointKey> {
    let mut seen: HashMap<PointKey, ((PointKey, PointKey), bool)> = HashMap::new();
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        for i in 0..n {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            let pair = if prev < next { (prev, next) } else { (next, prev) };
            seen.entry(ring[i])
                .and_modify(|(first, junction)| *junction |= *first != pair)
                .or_insert((pair, false));
        }
    }
    seen.into_iter()
        .filter(|(_, (_, junction))| *junction)
        .map(|(key, _)| key)
        .collect()
}

/// Cut a cyclic ring at its junctions. A ring without junctions becomes one
/// closed arc starting at its smallest vertex.
fn split_ring(ring: &[PointKey], junctions: &HashSet<PointKey>) -> Vec<Vec<PointKey>> {
    let n = ring.len();
    let cuts: Vec<usize> = (0..n).filter(|&i| junctions.contains(&ring[i])).collect();
    let start = match cuts.first() {
        Some(&first) => first,
        None => (0..n).min_by_key(|&i| ring[i]).unwrap_or(0),
    };

    let mut arcs = Vec::new();
    let mut current = vec![ring[start]];
    for step in 1..=n {
        let i = (start + step) % n;
        current.push(ring[i]);
        if step == n || junctions.contains(&ring[i]) {
            arcs.push(std::mem::replace(&mut current, vec![ring[i]]));
        }
    }
    arcs
}

#[derive(Default)]
struct ArcRegistry {
    arcs: Vec<Vec<PointKey>>,
    index: HashMap<Vec<PointKey>, usize>,
}

impl ArcRegistry {
    fn intern(&mut self, arc: Vec<PointKey>) -> ArcRef {
        let mut reversed = arc.clone();
        reversed.reverse();
        let forward = arc <= reversed;
        let canonical = if forward { arc } else { reversed };
        let next = self.arcs.len();
        let index = *self.index.entry(canonical.clone()).or_insert_with(|| next);
        if index == next {
            self.arcs.push(canonical);
        }
        if forward {
            index as ArcRef
        } else {
            !(index as ArcRef)
        }
    }
}

fn arc_coords(arc_ref: ArcRef, arcs: &[Vec<Coord<f64>>]) -> Vec<Coord<f64>> {
    let mut coords = arcs[arc_index(arc_ref)].clone();
    if arc_ref < 0 {
        coords.reverse();
    }
    coords
}

fn rebuild(feature: &TopoFeature, arcs: &[Vec<Coord<f64>>]) -> MultiPolygon<f64> {
    let ring = |refs: &Vec<ArcRef>| -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for &r in refs {
            let part = arc_coords(r, arcs);
            let skip = usize::from(!coords.is_empty());
            coords.extend(part.into_iter().skip(skip));
        }
        LineString::from(coords)
    };
    MultiPolygon::new(
        feature
            .polygons
            .iter()
            .filter(|rings| !rings.is_empty())
            .map(|rings| {
                let exterior = ring(&rings[0]);
                let interiors = rings[1..].iter().map(&ring).collect();
                Polygon::new(exterior, interiors)
            })
            .collect(),
    )
}

/// Douglas-Peucker with fixed end points. Closed arcs are split at the vertex
/// farthest from their start so both halves have distinct end points.
fn simplify_arc(arc: &[Coord<f64>], tolerance: f64, fragile: bool) -> Vec<Coord<f64>> {
    if arc.len() <= 2 || tolerance <= 0.0 {
        return arc.to_vec();
    }
    let first = arc[0];
    let last = arc[arc.len() - 1];
    if first != last {
        return simplify_open(arc, tolerance, fragile);
    }
    let far = (1..arc.len() - 1)
        .max_by(|&i, &j| distance(arc[i], first).total_cmp(&distance(arc[j], first)))
        .unwrap_or(1);
    let mut head = simplify_open(&arc[..=far], tolerance, true);
    let tail = simplify_open(&arc[far..], tolerance, true);
    head.pop();
    head.extend(tail);
    head
}

fn simplify_open(arc: &[Coord<f64>], tolerance: f64, keep_interior: bool) -> Vec<Coord<f64>> {
    let simplified = LineString::from(arc.to_vec()).simplify(&tolerance).0;
    if !keep_interior || simplified.len() > 2 || arc.len() <= 2 {
        return simplified;
    }
    let (a, b) = (arc[0], arc[arc.len() - 1]);
    let k = (1..arc.len() - 1)
        .max_by(|&i, &j| chord_distance(arc[i], a, b).total_cmp(&chord_distance(arc[j], a, b)))
        .unwrap_or(1);
    vec![a, arc[k], b]
}

fn distance(p: Coord<f64>, q: Coord<f64>) -> f64 {
    (p.x - q.x).hypot(p.y - q.y)
}

fn chord_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let len = distance(a, b);
    if len == 0.0 {
        return distance(p, a);
    }
    ((b.x - a.x) * (a.y - p.y) - (a.x - p.x) * (b.y - a.y)).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1),
        ]])
    }

    #[test]
    fn isolated_ring_is_one_closed_arc() {
        let topology = SharedTopology::build(&[rect(0.0, 0.0, 2.0, 1.0)], &[]);
        assert_eq!(topology.num_arcs(), 1);
        let arc = &topology.arcs()[0];
        assert_eq!(arc.first(), arc.last());
        assert_eq!(topology.feature_geometry(0), topology.original_geometry(0));
    }

    #[test]
    fn adjacent_features_share_one_arc() {
        let left = rect(0.0, 0.0, 2.0, 1.0);
        let right = rect(2.0, 0.0, 3.0, 1.0);
        let topology = SharedTopology::build(&[left, right], &[]);
        let refs = |i: usize| -> Vec<usize> { topology.features()[i].arc_indices().collect() };
        let shared: Vec<usize> = refs(0).into_iter().filter(|a| refs(1).contains(a)).collect();
        assert_eq!(shared.len(), 1);
        let arc = &topology.arcs()[shared[0]];
        assert_eq!(arc.len(), 2);
        assert!(arc.iter().all(|c| c.x == 2.0));
    }

    #[test]
    fn rebuilt_rings_match_input_area() {
        use geo::Area;
        let input = rect(0.0, 0.0, 3.0, 2.0);
        let topology = SharedTopology::build(&[input.clone()], &[&rect(0.0, 0.0, 1.0, 2.0)]);
        assert_eq!(topology.original_geometry(0).unsigned_area(), input.unsigned_area());
    }

    #[test]
    fn simplify_removes_collinear_vertices() {
        let jagged = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0),
            (x: 2.0, y: 2.0), (x: 1.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 1.0),
        ]]);
        let mut topology = SharedTopology::build(&[jagged], &[]);
        let stats = topology.simplify(0.1);
        assert_eq!(stats[0].original_vertices, 9);
        assert_eq!(stats[0].simplified_vertices, 5);
        assert!(!stats[0].restored);
        assert!(stats[0].reduction_percent > 40.0);
        assert!(is_valid_multipolygon(&topology.feature_geometry(0)));
    }

    #[test]
    fn pinned_context_junctions_survive_simplification() {
        let units = [
            rect(0.0, 0.0, 1.0, 1.0),
            rect(1.0, 0.0, 2.0, 1.0),
            rect(0.0, 1.0, 1.0, 2.0),
            rect(1.0, 1.0, 2.0, 2.0),
        ];
        let jagged = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0),
            (x: 2.0, y: 2.0), (x: 1.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 1.0),
        ]]);
        let context: Vec<&MultiPolygon<f64>> = units.iter().collect();
        let mut topology = SharedTopology::build(&[jagged], &context);
        topology.simplify(10.0);
        let ring = &topology.feature_geometry(0).0[0];
        assert!(ring.exterior().0.contains(&Coord { x: 1.0, y: 0.0 }));
        assert!(ring.exterior().0.contains(&Coord { x: 0.0, y: 1.0 }));
    }

    #[test]
    fn closed_arc_never_collapses() {
        let mut topology = SharedTopology::build(&[rect(0.0, 0.0, 1.0, 1.0)], &[]);
        let stats = topology.simplify(100.0);
        assert!(is_valid_multipolygon(&topology.feature_geometry(0)));
        assert!(stats[0].simplified_vertices >= 4);
    }

    #[test]
    fn reversed_references_use_bitwise_not() {
        assert_eq!(arc_index(0), 0);
        assert_eq!(arc_index(!0), 0);
        assert_eq!(arc_index(!5), 5);
        assert_eq!(!5_i64, -6);
    }
}
