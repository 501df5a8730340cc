//! Polygon validity for dissolved and simplified regions.
//!
//! A multipolygon is accepted when every ring is closed with at least three
//! distinct vertices and non-zero area, no two boundary segments cross or
//! overlap (touching at a shared vertex is allowed), every hole lies inside
//! its shell and no shell lies inside another polygon's interior.

use geo::{Contains, Coord, Line, LineString, MultiPolygon, Point, Polygon};

pub fn is_valid_multipolygon(geometry: &MultiPolygon<f64>) -> bool {
    if geometry.0.is_empty() {
        return false;
    }
    let rings_ok = geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .all(ring_is_well_formed);
    rings_ok
        && !has_bad_intersection(geometry)
        && holes_inside_shells(geometry)
        && shells_disjoint(geometry)
}

pub fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    is_valid_multipolygon(&MultiPolygon::new(vec![polygon.clone()]))
}

/// Twice the signed area (positive for counter-clockwise rings).
pub(crate) fn ring_signed_area2(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum()
}

fn ring_is_well_formed(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    if coords.len() < 4 || coords.first() != coords.last() {
        return false;
    }
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return false;
    }
    let mut distinct: Vec<_> = coords[..coords.len() - 1].to_vec();
    distinct.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    distinct.dedup();
    distinct.len() >= 3 && ring_signed_area2(coords) != 0.0
}

struct Segment {
    line: Line<f64>,
    min_x: f64,
    max_x: f64,
}

fn has_bad_intersection(geometry: &MultiPolygon<f64>) -> bool {
    let mut segments = Vec::new();
    let rings = geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()));
    for ring in rings {
        for line in ring.lines() {
            if line.start == line.end {
                // Repeated vertex; harmless.
                continue;
            }
            segments.push(Segment {
                line,
                min_x: line.start.x.min(line.end.x),
                max_x: line.start.x.max(line.end.x),
            });
        }
    }
    segments.sort_by(|a, b| a.min_x.total_cmp(&b.min_x));

    for (i, s) in segments.iter().enumerate() {
        for t in &segments[i + 1..] {
            if t.min_x > s.max_x {
                break;
            }
            if segments_conflict(&s.line, &t.line) {
                return true;
            }
        }
    }
    false
}

fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn on_segment(p: Coord<f64>, line: &Line<f64>) -> bool {
    p.x >= line.start.x.min(line.end.x)
        && p.x <= line.start.x.max(line.end.x)
        && p.y >= line.start.y.min(line.end.y)
        && p.y <= line.start.y.max(line.end.y)
}

/// True when two segments meet anywhere other than a shared endpoint.
///
/// Shared endpoints are allowed between any pair, which covers consecutive
/// segments of a ring as well as pinch points between rings.
fn segments_conflict(s: &Line<f64>, t: &Line<f64>) -> bool {
    let d1 = cross(t.start, t.end, s.start);
    let d2 = cross(t.start, t.end, s.end);
    let d3 = cross(s.start, s.end, t.start);
    let d4 = cross(s.start, s.end, t.end);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    let shared_endpoint = |p: Coord<f64>| p == t.start || p == t.end;
    let s_start_shared = shared_endpoint(s.start);
    let s_end_shared = shared_endpoint(s.end);
    if s_start_shared && s_end_shared {
        // Same segment twice.
        return true;
    }

    if d1 == 0.0 && d2 == 0.0 {
        // Collinear: any overlap longer than a point is a conflict.
        let overlap = (on_segment(s.start, t) && !s_start_shared)
            || (on_segment(s.end, t) && !s_end_shared)
            || (on_segment(t.start, s) && !(t.start == s.start || t.start == s.end))
            || (on_segment(t.end, s) && !(t.end == s.start || t.end == s.end));
        return overlap;
    }

    // An endpoint lying on the interior of the other segment.
    let touches_interior = (d1 == 0.0 && !s_start_shared && on_segment(s.start, t))
        || (d2 == 0.0 && !s_end_shared && on_segment(s.end, t))
        || (d3 == 0.0 && !(t.start == s.start || t.start == s.end) && on_segment(t.start, s))
        || (d4 == 0.0 && !(t.end == s.start || t.end == s.end) && on_segment(t.end, s));
    touches_interior
}

/// A point strictly inside `ring`'s edge set: midpoint of its first segment.
pub(crate) fn ring_probe(ring: &LineString<f64>) -> Option<Point<f64>> {
    ring.lines()
        .find(|l| l.start != l.end)
        .map(|l| Point::new(0.5 * (l.start.x + l.end.x), 0.5 * (l.start.y + l.end.y)))
}

fn holes_inside_shells(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.iter().all(|polygon| {
        let shell = Polygon::new(polygon.exterior().clone(), vec![]);
        polygon.interiors().iter().all(|hole| {
            ring_probe(hole).map_or(false, |probe| shell.contains(&probe))
        })
    })
}

fn shells_disjoint(geometry: &MultiPolygon<f64>) -> bool {
    let polygons = &geometry.0;
    for (i, a) in polygons.iter().enumerate() {
        let Some(probe) = ring_probe(a.exterior()) else {
            return false;
        };
        for (j, b) in polygons.iter().enumerate() {
            if i != j && b.contains(&probe) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn simple_square_is_valid() {
        assert!(is_valid_polygon(&square(0.0, 0.0, 1.0)));
    }

    #[test]
    fn bow_tie_is_invalid() {
        let bow_tie = polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0),
        ];
        assert!(!is_valid_polygon(&bow_tie));
    }

    #[test]
    fn collinear_vertices_are_fine() {
        let poly = polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0),
        ];
        assert!(is_valid_polygon(&poly));
    }

    #[test]
    fn corner_touching_parts_are_valid() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(1.0, 1.0, 1.0)]);
        assert!(is_valid_multipolygon(&mp));
    }

    #[test]
    fn edge_sharing_parts_are_invalid() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)]);
        assert!(!is_valid_multipolygon(&mp));
    }

    #[test]
    fn nested_shells_are_invalid() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 4.0), square(1.0, 1.0, 1.0)]);
        assert!(!is_valid_multipolygon(&mp));
    }

    #[test]
    fn hole_outside_shell_is_invalid() {
        let outer = square(0.0, 0.0, 1.0);
        let stray = square(5.0, 5.0, 1.0);
        let poly = Polygon::new(outer.exterior().clone(), vec![stray.exterior().clone()]);
        assert!(!is_valid_polygon(&poly));
        let inner = square(0.25, 0.25, 0.5);
        let poly = Polygon::new(
            square(0.0, 0.0, 1.0).exterior().clone(),
            vec![inner.exterior().clone()],
        );
        assert!(is_valid_polygon(&poly));
    }

    #[test]
    fn empty_is_invalid() {
        assert!(!is_valid_multipolygon(&MultiPolygon::new(vec![])));
    }
}
