pub mod export;
pub mod graph;
pub mod sweep;
pub mod util;
