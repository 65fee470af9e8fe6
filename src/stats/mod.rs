//! Summary statistics of host and pathogen abundances.

pub mod frequencies;
pub mod linkage;
pub mod raster;
pub mod transitivity;

pub use frequencies::{allele_frequencies, avirulent_frequency};
pub use linkage::{linkage_disequilibrium, normalized_disequilibrium};
pub use raster::RasterStatistics;
pub use transitivity::{FamilyTable, Transitivity, transitivity_slope, weighted_slope};
