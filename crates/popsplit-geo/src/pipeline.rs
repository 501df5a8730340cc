//! Sweep → dissolve → shared topology → simplified TopoJSON.

use std::path::Path;

use geo::MultiPolygon;
use popsplit_algo::SweepResult;
use popsplit_core::{GeometryConfig, PopsplitError, PopsplitResult};
use serde::Serialize;
use tracing::{info, warn};
use web_time::Instant;

use crate::dissolve::{dissolve_lambda, DissolvedRegion};
use crate::export::{Reference, TopoJson};
use crate::io::UnitLayer;
use crate::topology::{SharedTopology, SimplifyStats};

/// A λ whose region could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryFailure {
    pub lambda: f64,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct PostProcessed {
    pub document: TopoJson,
    /// Dissolved regions in λ order, with simplified geometry.
    pub regions: Vec<DissolvedRegion>,
    /// Simplification statistics, parallel to `regions`.
    pub stats: Vec<SimplifyStats>,
    pub failures: Vec<GeometryFailure>,
}

/// Printed by the CLI after an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub objects: usize,
    pub arcs: usize,
    pub failed: Vec<f64>,
    pub original_vertices: usize,
    pub simplified_vertices: usize,
    pub elapsed_seconds: f64,
}

pub fn postprocess_sweep(
    layer: &UnitLayer,
    sweep: &SweepResult,
    config: &GeometryConfig,
) -> PopsplitResult<PostProcessed> {
    config.validate()?;

    let mut regions = Vec::new();
    let mut failures = Vec::new();
    for entry in sweep.results.values() {
        let mask_len = entry.search.result.mask.len();
        if mask_len != layer.len() {
            return Err(PopsplitError::Validation(format!(
                "sweep mask has {mask_len} entries but the unit layer has {} units",
                layer.len()
            )));
        }
        if !entry.converged() {
            warn!(
                lambda = entry.lambda,
                "exporting closest candidate of a non-converged search"
            );
        }
        match dissolve_lambda(layer, entry) {
            Ok(region) => regions.push(region),
            Err(PopsplitError::Geometry(message)) => {
                warn!(lambda = entry.lambda, error = %message, "skipping λ");
                failures.push(GeometryFailure {
                    lambda: entry.lambda,
                    error: message,
                });
            }
            Err(err) => return Err(err),
        }
    }
    if regions.is_empty() {
        return Err(PopsplitError::Geometry(
            "no λ produced an exportable region".into(),
        ));
    }

    let geometries: Vec<MultiPolygon<f64>> = regions.iter().map(|r| r.geometry.clone()).collect();
    let context: Vec<&MultiPolygon<f64>> = if config.pin_unit_junctions {
        layer.geometries().collect()
    } else {
        Vec::new()
    };
    let mut topology = SharedTopology::build(&geometries, &context);
    let stats = topology.simplify(config.simplify_tolerance);
    for (index, region) in regions.iter_mut().enumerate() {
        region.geometry = topology.feature_geometry(index);
    }

    let reference = Reference {
        total_population: layer.total_population(),
        total_area: layer.total_area(),
    };
    let document = TopoJson::from_topology(&topology, &regions, reference, config.quantization)?;
    Ok(PostProcessed {
        document,
        regions,
        stats,
        failures,
    })
}

/// Post-process `sweep` and write the TopoJSON document to `out`.
pub fn export_topojson(
    layer: &UnitLayer,
    sweep: &SweepResult,
    config: &GeometryConfig,
    out: &Path,
) -> PopsplitResult<ExportSummary> {
    let start = Instant::now();
    let processed = postprocess_sweep(layer, sweep, config)?;
    processed.document.write(out)?;

    let summary = ExportSummary {
        objects: processed.document.objects.len(),
        arcs: processed.document.arcs.len(),
        failed: processed.failures.iter().map(|f| f.lambda).collect(),
        original_vertices: processed.stats.iter().map(|s| s.original_vertices).sum(),
        simplified_vertices: processed.stats.iter().map(|s| s.simplified_vertices).sum(),
        elapsed_seconds: start.elapsed().as_secs_f64(),
    };
    info!(
        objects = summary.objects,
        arcs = summary.arcs,
        failed = summary.failed.len(),
        elapsed = summary.elapsed_seconds,
        "export complete"
    );
    Ok(summary)
}
