pub mod aggregate;
pub mod excludes;
pub mod gather;
pub mod reduce;

// Re-export main functions
pub use aggregate::{Accumulated, aggregate};
pub use excludes::{Exclusions, find_excl_blocks, scan_source};
pub use gather::gather_coverage;
pub use reduce::{CoverageStats, Stats};
