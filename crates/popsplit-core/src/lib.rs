//! # popsplit-core: attribute model and shared infrastructure
//!
//! Population-weighted spatial partitioning works on a collection of areal
//! units (census-tract-like regions). This crate holds what every other
//! popsplit crate builds on:
//!
//! - [`GraphAttributes`]: per-unit population and area, the adjacency edges
//!   with their shared boundary lengths, and the characteristic length `ρ`
//!   (median of `√area`) that makes area and boundary terms unitless.
//! - [`PopsplitError`]: the error taxonomy (configuration, solver, geometry,
//!   validation, I/O, parse).
//! - [`PopsplitConfig`]: sweep and geometry settings, loadable from TOML.
//! - [`maxflow`]: the max-flow/min-cut seam ([`MaxFlowBackend`]) with Dinic
//!   and Edmonds-Karp backends.
//! - [`graph_utils`]: petgraph-backed connectivity helpers.
//!
//! ## Quick Start
//!
//! ```rust
//! use popsplit_core::{AdjacencyEdge, GraphAttributes};
//!
//! let attrs = GraphAttributes::new(
//!     vec![120, 80, 5],
//!     vec![1.0, 1.0, 4.0],
//!     vec![
//!         AdjacencyEdge::new(0, 1, 1.0).unwrap(),
//!         AdjacencyEdge::new(1, 2, 1.0).unwrap(),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(attrs.total_population(), 205);
//! assert_eq!(attrs.characteristic_length(), 1.0);
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod graph_utils;
pub mod maxflow;

pub use attributes::{median_sqrt_area, AdjacencyEdge, GraphAttributes, GraphSummary, Unit};
pub use config::{round_lambda, GeometryConfig, PopsplitConfig, SweepConfig};
pub use error::{PopsplitError, PopsplitResult};
pub use maxflow::{
    DinicSolver, EdmondsKarpSolver, FlowProblem, FlowSolution, MaxFlowBackend, MaxFlowKind,
    Segment,
};
