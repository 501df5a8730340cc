use anyhow::{Context, Result};
use popsplit_algo::load_sweep_result;
use popsplit_cli::ExportArgs;
use popsplit_core::PopsplitConfig;
use popsplit_geo::export_topojson;

use crate::commands::util::load_units;

pub fn handle(args: &ExportArgs, config: PopsplitConfig) -> Result<()> {
    let mut geometry = config.geometry;
    if let Some(tolerance) = args.simplify_tolerance {
        geometry.simplify_tolerance = tolerance;
    }
    if let Some(quantization) = args.quantization {
        geometry.quantization = quantization;
    }

    let layer = load_units(&args.units, &geometry)?;
    let sweep = load_sweep_result(&args.sweep)
        .with_context(|| format!("reading sweep from {}", args.sweep.display()))?;
    let summary = export_topojson(&layer, &sweep, &geometry, &args.out)
        .with_context(|| format!("exporting to {}", args.out.display()))?;

    println!(
        "Exported {} region(s) with {} arcs to {}",
        summary.objects,
        summary.arcs,
        args.out.display()
    );
    println!(
        "  Vertices: {} -> {}",
        summary.original_vertices, summary.simplified_vertices
    );
    if !summary.failed.is_empty() {
        let failed: Vec<String> = summary.failed.iter().map(|l| format!("{l:.2}")).collect();
        println!("  Skipped λ: {}", failed.join(", "));
    }
    Ok(())
}
