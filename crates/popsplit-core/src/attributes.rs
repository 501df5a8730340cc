//! Attribute model: per-unit population and area plus the weighted adjacency
//! between units.
//!
//! [`GraphAttributes`] is computed once per dataset and shared read-only by
//! every network build, search and sweep.

use serde::{Deserialize, Serialize};

use crate::error::{PopsplitError, PopsplitResult};
use crate::graph_utils;

/// One areal region in the attribute model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub index: usize,
    pub population: u64,
    pub area: f64,
}

/// An unordered pair of adjacent units with their shared boundary length.
///
/// Stored with `a < b`; the length is the same in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    pub a: usize,
    pub b: usize,
    pub length: f64,
}

impl AdjacencyEdge {
    pub fn new(i: usize, j: usize, length: f64) -> PopsplitResult<Self> {
        if i == j {
            return Err(PopsplitError::Validation(format!(
                "self-adjacency on unit {i}"
            )));
        }
        if !length.is_finite() || length <= 0.0 {
            return Err(PopsplitError::Validation(format!(
                "edge ({i}, {j}) has non-positive shared length {length}"
            )));
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        Ok(Self { a, b, length })
    }

    /// True when the edge crosses a selection boundary.
    #[inline]
    pub fn is_cut(&self, mask: &[bool]) -> bool {
        mask[self.a] != mask[self.b]
    }
}

/// Population, area, adjacency and the characteristic length scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAttributes {
    population: Vec<u64>,
    area: Vec<f64>,
    edges: Vec<AdjacencyEdge>,
    characteristic_length: f64,
}

impl GraphAttributes {
    /// Build attributes, using `median(√area)` as the characteristic length.
    pub fn new(
        population: Vec<u64>,
        area: Vec<f64>,
        edges: Vec<AdjacencyEdge>,
    ) -> PopsplitResult<Self> {
        let rho = median_sqrt_area(&area).ok_or_else(|| {
            PopsplitError::Validation("attribute model needs at least one unit".into())
        })?;
        Self::with_characteristic_length(population, area, edges, rho)
    }

    pub fn with_characteristic_length(
        population: Vec<u64>,
        area: Vec<f64>,
        mut edges: Vec<AdjacencyEdge>,
        characteristic_length: f64,
    ) -> PopsplitResult<Self> {
        let n = population.len();
        if n == 0 {
            return Err(PopsplitError::Validation(
                "attribute model needs at least one unit".into(),
            ));
        }
        if area.len() != n {
            return Err(PopsplitError::Validation(format!(
                "population has {n} entries but area has {}",
                area.len()
            )));
        }
        if let Some((i, a)) = area
            .iter()
            .enumerate()
            .find(|(_, a)| !a.is_finite() || **a <= 0.0)
        {
            return Err(PopsplitError::Validation(format!(
                "unit {i} has non-positive area {a}"
            )));
        }
        if !characteristic_length.is_finite() || characteristic_length <= 0.0 {
            return Err(PopsplitError::Validation(format!(
                "characteristic length must be positive, got {characteristic_length}"
            )));
        }

        for edge in edges.iter_mut() {
            *edge = AdjacencyEdge::new(edge.a, edge.b, edge.length)?;
            if edge.b >= n {
                return Err(PopsplitError::Validation(format!(
                    "edge ({}, {}) references a unit outside 0..{n}",
                    edge.a, edge.b
                )));
            }
        }
        edges.sort_by_key(|edge| (edge.a, edge.b));
        if let Some(pair) = edges
            .windows(2)
            .find(|pair| (pair[0].a, pair[0].b) == (pair[1].a, pair[1].b))
        {
            return Err(PopsplitError::Validation(format!(
                "duplicate edge ({}, {})",
                pair[0].a, pair[0].b
            )));
        }

        Ok(Self {
            population,
            area,
            edges,
            characteristic_length,
        })
    }

    pub fn num_units(&self) -> usize {
        self.population.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn population(&self) -> &[u64] {
        &self.population
    }

    pub fn area(&self) -> &[f64] {
        &self.area
    }

    /// Edges sorted by `(a, b)`.
    pub fn edges(&self) -> &[AdjacencyEdge] {
        &self.edges
    }

    pub fn characteristic_length(&self) -> f64 {
        self.characteristic_length
    }

    pub fn unit(&self, index: usize) -> Option<Unit> {
        Some(Unit {
            index,
            population: *self.population.get(index)?,
            area: self.area[index],
        })
    }

    pub fn units(&self) -> impl Iterator<Item = Unit> + '_ {
        self.population
            .iter()
            .zip(&self.area)
            .enumerate()
            .map(|(index, (&population, &area))| Unit {
                index,
                population,
                area,
            })
    }

    pub fn total_population(&self) -> u64 {
        self.population.iter().sum()
    }

    pub fn total_area(&self) -> f64 {
        self.area.iter().sum()
    }

    /// Shared boundary length between two units, in either order.
    pub fn edge_length(&self, i: usize, j: usize) -> Option<f64> {
        let key = if i < j { (i, j) } else { (j, i) };
        self.edges
            .binary_search_by_key(&key, |edge| (edge.a, edge.b))
            .ok()
            .map(|idx| self.edges[idx].length)
    }

    pub fn selected_population(&self, mask: &[bool]) -> u64 {
        self.population
            .iter()
            .zip(mask)
            .filter(|(_, &selected)| selected)
            .map(|(&p, _)| p)
            .sum()
    }

    pub fn selected_area(&self, mask: &[bool]) -> f64 {
        self.area
            .iter()
            .zip(mask)
            .filter(|(_, &selected)| selected)
            .map(|(&a, _)| a)
            .sum()
    }

    pub fn check_mask(&self, mask: &[bool]) -> PopsplitResult<()> {
        if mask.len() != self.num_units() {
            return Err(PopsplitError::Validation(format!(
                "selection mask has {} entries for {} units",
                mask.len(),
                self.num_units()
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> GraphSummary {
        let total_population = self.total_population();
        let lengths = self.edges.iter().map(|edge| edge.length);
        let (sum, max) = lengths.fold((0.0_f64, 0.0_f64), |(s, m), l| (s + l, m.max(l)));
        let n = self.num_units();
        GraphSummary {
            num_units: n,
            num_edges: self.num_edges(),
            total_population,
            half_population: total_population / 2,
            total_area: self.total_area(),
            characteristic_length: self.characteristic_length,
            mean_boundary_length: if self.edges.is_empty() {
                0.0
            } else {
                sum / self.edges.len() as f64
            },
            max_boundary_length: max,
            mean_neighbors: 2.0 * self.num_edges() as f64 / n as f64,
            connected_components: graph_utils::connected_components(self),
            isolated_units: graph_utils::isolated_units(self).len(),
        }
    }
}

/// Dataset-level statistics reported by `popsplit graph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub num_units: usize,
    pub num_edges: usize,
    pub total_population: u64,
    pub half_population: u64,
    pub total_area: f64,
    pub characteristic_length: f64,
    pub mean_boundary_length: f64,
    pub max_boundary_length: f64,
    pub mean_neighbors: f64,
    pub connected_components: usize,
    pub isolated_units: usize,
}

/// Median of `√area`, averaging the two middle values for even counts.
pub fn median_sqrt_area(area: &[f64]) -> Option<f64> {
    if area.is_empty() {
        return None;
    }
    let mut roots: Vec<f64> = area.iter().map(|a| a.max(0.0).sqrt()).collect();
    roots.sort_by(f64::total_cmp);
    let mid = roots.len() / 2;
    Some(if roots.len() % 2 == 0 {
        0.5 * (roots[mid - 1] + roots[mid])
    } else {
        roots[mid]
    })
}
