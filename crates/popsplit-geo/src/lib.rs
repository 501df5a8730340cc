//! Geometry side of popsplit.
//!
//! Loads unit polygons from GeoJSON, derives the [`GraphAttributes`] the
//! optimiser needs, and turns the selection masks of a sweep into one
//! quantized TopoJSON document whose λ regions share simplified boundaries.
//!
//! [`GraphAttributes`]: popsplit_core::GraphAttributes

pub mod adjacency;
pub mod dissolve;
pub mod export;
pub mod fixtures;
pub mod io;
pub mod pipeline;
pub mod topology;
pub mod validity;

pub use adjacency::{build_graph_attributes, shared_boundary_lengths, AdjacencyReport};
pub use dissolve::{dissolve_lambda, dissolve_partition, DissolvedRegion};
pub use export::{Reference, RegionProperties, TopoJson, TopoObject, Transform};
pub use io::{UnitFeature, UnitLayer};
pub use pipeline::{export_topojson, postprocess_sweep, ExportSummary, GeometryFailure, PostProcessed};
pub use topology::{ArcRef, SharedTopology, SimplifyStats, TopoFeature};
pub use validity::{is_valid_multipolygon, is_valid_polygon};
