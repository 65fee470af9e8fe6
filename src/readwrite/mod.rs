//! Reading and writing trajectories and summary arrays.

mod npy;
mod trajectory;

pub use npy::write_npy;
pub use trajectory::{TrajectoryIO, trajectory_header};
