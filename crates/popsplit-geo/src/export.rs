//! Quantized TopoJSON output with one `MultiPolygon` object per λ.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use geo::Coord;
use popsplit_core::{round_lambda, PopsplitError, PopsplitResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dissolve::DissolvedRegion;
use crate::topology::{ArcRef, SharedTopology};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: [f64; 4],
    pub transform: Transform,
    pub objects: BTreeMap<String, TopoObject>,
    /// Delta-encoded integer positions.
    pub arcs: Vec<Vec<[i64; 2]>>,
    pub reference: Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub arcs: Vec<Vec<Vec<ArcRef>>>,
    pub properties: RegionProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProperties {
    pub lambda_value: f64,
    pub population_selected: u64,
    pub total_population: u64,
    pub area: f64,
    pub num_parts: usize,
    pub total_area_all: f64,
    pub converged: bool,
    pub mu: f64,
}

/// Totals over every unit, shared by all objects for percentage display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub total_population: u64,
    pub total_area: f64,
}

impl TopoJson {
    /// `lambda_<λ>` at sweep-key precision, with at least two decimals.
    pub fn object_name(lambda: f64) -> String {
        let mut digits = format!("{:.4}", round_lambda(lambda));
        if let Some(dot) = digits.find('.') {
            while digits.len() - dot > 3 && digits.ends_with('0') {
                digits.pop();
            }
        }
        format!("lambda_{digits}")
    }

    /// Assemble the document; `regions[i]` is feature `i` of `topology`.
    pub fn from_topology(
        topology: &SharedTopology,
        regions: &[DissolvedRegion],
        reference: Reference,
        quantization: f64,
    ) -> PopsplitResult<Self> {
        if regions.len() != topology.features().len() {
            return Err(PopsplitError::Validation(format!(
                "{} regions for {} topology features",
                regions.len(),
                topology.features().len()
            )));
        }
        if !(quantization >= 2.0) {
            return Err(PopsplitError::Configuration(format!(
                "quantization must be at least 2 (got {quantization})"
            )));
        }

        let bbox = bounding_box(topology.arcs())
            .ok_or_else(|| PopsplitError::Geometry("topology has no coordinates".into()))?;
        let [x0, y0, x1, y1] = bbox;
        let step = |extent: f64| {
            if extent > 0.0 {
                extent / (quantization - 1.0)
            } else {
                1.0
            }
        };
        let transform = Transform {
            scale: [step(x1 - x0), step(y1 - y0)],
            translate: [x0, y0],
        };

        let arcs = topology
            .arcs()
            .iter()
            .map(|arc| encode_arc(arc, &transform))
            .collect();

        let mut objects = BTreeMap::new();
        for (feature, region) in topology.features().iter().zip(regions) {
            let object = TopoObject {
                kind: "MultiPolygon".to_string(),
                arcs: feature.polygons.clone(),
                properties: RegionProperties {
                    lambda_value: region.lambda,
                    population_selected: region.population_selected,
                    total_population: region.total_population,
                    area: region.area,
                    num_parts: region.num_parts,
                    total_area_all: reference.total_area,
                    converged: region.converged,
                    mu: region.mu,
                },
            };
            let name = Self::object_name(region.lambda);
            if let Some(previous) = objects.insert(name.clone(), object) {
                return Err(PopsplitError::Geometry(format!(
                    "λ {} and {} both export as object '{name}'",
                    previous.properties.lambda_value, region.lambda
                )));
            }
        }

        Ok(Self {
            kind: "Topology".to_string(),
            bbox,
            transform,
            objects,
            arcs,
            reference,
        })
    }

    /// Absolute coordinates of arc `index`.
    pub fn decode_arc(&self, index: usize) -> Vec<Coord<f64>> {
        let Transform { scale, translate } = self.transform;
        let (mut qx, mut qy) = (0_i64, 0_i64);
        self.arcs[index]
            .iter()
            .map(|&[dx, dy]| {
                qx += dx;
                qy += dy;
                Coord {
                    x: qx as f64 * scale[0] + translate[0],
                    y: qy as f64 * scale[1] + translate[1],
                }
            })
            .collect()
    }

    /// Absolute rings of one object, polygons then rings.
    pub fn decode_object(&self, name: &str) -> Option<Vec<Vec<Vec<Coord<f64>>>>> {
        let object = self.objects.get(name)?;
        let ring = |refs: &Vec<ArcRef>| {
            let mut coords: Vec<Coord<f64>> = Vec::new();
            for &r in refs {
                let mut part = self.decode_arc(crate::topology::arc_index(r));
                if r < 0 {
                    part.reverse();
                }
                let skip = usize::from(!coords.is_empty());
                coords.extend(part.into_iter().skip(skip));
            }
            coords
        };
        Some(
            object
                .arcs
                .iter()
                .map(|rings| rings.iter().map(&ring).collect())
                .collect(),
        )
    }

    pub fn write(&self, path: &Path) -> PopsplitResult<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        info!(
            path = %path.display(),
            objects = self.objects.len(),
            arcs = self.arcs.len(),
            "wrote topojson"
        );
        Ok(())
    }

    pub fn read(path: &Path) -> PopsplitResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn bounding_box(arcs: &[Vec<Coord<f64>>]) -> Option<[f64; 4]> {
    let mut coords = arcs.iter().flatten();
    let first = coords.next()?;
    Some(coords.fold([first.x, first.y, first.x, first.y], |b, c| {
        [b[0].min(c.x), b[1].min(c.y), b[2].max(c.x), b[3].max(c.y)]
    }))
}

fn encode_arc(arc: &[Coord<f64>], transform: &Transform) -> Vec<[i64; 2]> {
    let quantize = |c: &Coord<f64>| {
        [
            ((c.x - transform.translate[0]) / transform.scale[0]).round() as i64,
            ((c.y - transform.translate[1]) / transform.scale[1]).round() as i64,
        ]
    };
    let mut encoded = Vec::with_capacity(arc.len());
    let mut previous: Option<[i64; 2]> = None;
    for point in arc.iter().map(quantize) {
        match previous {
            None => encoded.push(point),
            Some(p) if p == point => continue,
            Some(p) => encoded.push([point[0] - p[0], point[1] - p[1]]),
        }
        previous = Some(point);
    }
    // An arc needs two positions even when it collapses under quantization.
    if encoded.len() == 1 {
        encoded.push([0, 0]);
    }
    encoded
}
