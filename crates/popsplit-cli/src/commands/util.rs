use std::path::Path;

use anyhow::{Context, Result};
use popsplit_core::{GeometryConfig, GraphAttributes};
use popsplit_geo::{build_graph_attributes, UnitLayer};

pub fn load_units(path: &Path, config: &GeometryConfig) -> Result<UnitLayer> {
    UnitLayer::read_geojson(path, config)
        .with_context(|| format!("reading units from {}", path.display()))
}

pub fn load_graph(path: &Path, config: &GeometryConfig) -> Result<(UnitLayer, GraphAttributes)> {
    let layer = load_units(path, config)?;
    let (attrs, _) = build_graph_attributes(&layer)
        .with_context(|| format!("building adjacency for {}", path.display()))?;
    Ok((layer, attrs))
}
