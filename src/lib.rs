pub mod args;
pub mod config;
pub mod core;
pub mod errors;
pub mod raster;
pub mod readwrite;
pub mod runner;
pub mod stats;
