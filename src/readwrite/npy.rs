use npyz::WriterBuilder;

use crate::errors::{CoevolutionError, Result};

/// Write `data` in row major order as an `.npy` array of the given shape.
pub fn write_npy(
    writer: &mut impl std::io::Write,
    shape: &[u64],
    data: impl IntoIterator<Item = f64>,
) -> Result<()> {
    let mut npy_writer = npyz::WriteOptions::new()
        .default_dtype()
        .shape(shape)
        .writer(writer)
        .begin_nd()
        .map_err(|e| CoevolutionError::WriteError(format!("{}", e)))?;
    npy_writer
        .extend(data)
        .map_err(|e| CoevolutionError::WriteError(format!("{}", e)))?;
    npy_writer
        .finish()
        .map_err(|e| CoevolutionError::WriteError(format!("{}", e)))?;
    Ok(())
}
