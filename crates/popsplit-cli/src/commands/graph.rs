use std::path::Path;

use anyhow::{Context, Result};
use popsplit_core::PopsplitConfig;
use popsplit_geo::build_graph_attributes;

use crate::commands::util::load_units;

pub fn handle(units: &Path, config: &PopsplitConfig) -> Result<()> {
    let layer = load_units(units, &config.geometry)?;
    let (attrs, report) = build_graph_attributes(&layer)
        .with_context(|| format!("building adjacency for {}", units.display()))?;
    let summary = attrs.summary();

    println!("Graph summary for {}:", units.display());
    println!("  Units          : {}", summary.num_units);
    println!("  Edges          : {}", summary.num_edges);
    println!("  Components     : {}", summary.connected_components);
    println!("  Isolated units : {}", summary.isolated_units);
    println!(
        "  Population     : {} (half {})",
        summary.total_population, summary.half_population
    );
    println!("  Area           : {:.4}", summary.total_area);
    println!("  ρ (median √a)  : {:.4}", summary.characteristic_length);
    println!(
        "  Boundary [mean/max]: {:.4}/{:.4}",
        summary.mean_boundary_length, summary.max_boundary_length
    );
    println!("  Mean neighbours: {:.2}", summary.mean_neighbors);
    println!("  Shared length  : {:.4}", report.total_shared_length);
    Ok(())
}
