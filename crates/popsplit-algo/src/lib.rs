//! Population-weighted region selection by parametric min cut.
//!
//! For a tension λ and a population multiplier μ, [`PartitionSolver`] selects
//! the units minimising boundary and area cost minus population reward.
//! [`find_optimal_mu`] tunes μ until the selection holds a target share of the
//! population, and [`sweep_lambda`] repeats that across a range of λ values.

pub mod network;
pub mod observer;
pub mod search;
pub mod solver;
pub mod sweep;

pub use network::{
    build_flow_network, compute_energy, validate_lambda, EnergyBreakdown, NetworkCapacities,
};
pub use observer::{NoopObserver, SearchStep, SweepObserver, TracingObserver};
pub use search::{estimate_mu_max, find_optimal_mu, SearchOptions, SearchResult};
pub use solver::{PartitionResult, PartitionSolver};
pub use sweep::{
    load_sweep_result, save_sweep_result, sweep_lambda, LambdaFailure, LambdaResult, LambdaValue,
    SweepResult, SweepStatus,
};
