use clap::{Args, Parser, Subcommand, ValueHint};
use popsplit_core::MaxFlowKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "popsplit", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    /// TOML file with `[sweep]` and `[geometry]` tables
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarise the adjacency graph of a unit layer
    Graph {
        /// GeoJSON FeatureCollection of unit polygons
        #[arg(long, value_hint = ValueHint::FilePath)]
        units: PathBuf,
    },
    /// Sweep the tension parameter and write the partitions as JSON
    Sweep(SweepArgs),
    /// Dissolve, simplify and export a sweep as TopoJSON
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// GeoJSON FeatureCollection of unit polygons
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub units: PathBuf,
    /// Output file for the sweep result
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,
    /// Spacing of the λ grid
    #[arg(long)]
    pub lambda_step: Option<f64>,
    /// Exclusive upper bound of the λ grid
    #[arg(long)]
    pub lambda_max: Option<f64>,
    /// Target share of the total population
    #[arg(long)]
    pub target_fraction: Option<f64>,
    /// Seed each λ with the μ of the previous converged λ
    #[arg(long)]
    pub warm_start: bool,
    /// Parallel searches (0 = all cores)
    #[arg(long)]
    pub max_workers: Option<usize>,
    /// Solver calls allowed per search
    #[arg(long)]
    pub max_iterations: Option<usize>,
    /// Max-flow backend (dinic, edmonds-karp)
    #[arg(long)]
    pub backend: Option<MaxFlowKind>,
    /// Succeed even when some λ did not converge
    #[arg(long)]
    pub skip_failures: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// GeoJSON FeatureCollection of unit polygons
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub units: PathBuf,
    /// Sweep result written by `popsplit sweep`
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub sweep: PathBuf,
    /// Output TopoJSON file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,
    /// Douglas-Peucker tolerance in input CRS units
    #[arg(long)]
    pub simplify_tolerance: Option<f64>,
    /// Grid size of the exported quantization
    #[arg(long)]
    pub quantization: Option<f64>,
}
