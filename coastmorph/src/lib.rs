pub mod cluster;
pub mod collect;
pub mod commons;
pub mod contextual;
pub mod geo_core;
pub mod geometric;

pub use commons::error::{MorphoError, MorphoResult};

// Per-feature morphometric characters (tessellation, blocks, meshedness, ...)
// are measured upstream and arrive here as columns of the measurement tables.
