use ndarray::{Array1, Array2};
use std::io;

use crate::core::genotypes::{GenotypeSpace, N_PATHOGENS, Pathogen};
use crate::core::Trajectory;
use crate::errors::{CoevolutionError, Result};

pub trait TrajectoryIO: Sized {
    fn read(reader: impl io::Read) -> Result<Self>;
    fn write(&self, space: &GenotypeSpace, writer: impl io::Write) -> Result<()>;

    fn read_from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|_err| CoevolutionError::ReadError(format!("Failed to read from {path}")))?;
        Self::read(io::BufReader::new(file))
    }

    fn write_to_file(&self, space: &GenotypeSpace, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|_err| CoevolutionError::WriteError(format!("Failed to create {path}")))?;
        self.write(space, io::BufWriter::new(file))
    }
}

/// Column names: time, one per host genotype and one per pathogen genotype.
pub fn trajectory_header(space: &GenotypeSpace) -> Vec<String> {
    std::iter::once("t".to_string())
        .chain(space.iter().map(|genotype| format!("S_{}", genotype.label())))
        .chain(Pathogen::ALL.iter().map(|pathogen| format!("I_{pathogen}")))
        .collect()
}

impl TrajectoryIO for Trajectory {
    /// Reads a CSV file with one row per time point. The number of host genotypes is taken from
    /// the `S_` columns of the header.
    fn read(reader: impl io::Read) -> Result<Trajectory> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| CoevolutionError::ReadError(format!("Failed to read header: {err}")))?;
        let n_genotypes = headers.iter().filter(|name| name.starts_with("S_")).count();
        let n_columns = 1 + n_genotypes + N_PATHOGENS;
        if headers.len() != n_columns {
            return Err(CoevolutionError::ReadError(format!(
                "Expected {n_columns} columns, found {}",
                headers.len()
            )));
        }

        let mut times = Vec::new();
        let mut states = Vec::new();
        for record in reader.deserialize() {
            let record: Vec<f64> = record.map_err(|err| {
                CoevolutionError::ReadError(format!("Failed to parse record: {err}"))
            })?;
            times.push(record[0]);
            states.extend_from_slice(&record[1..]);
        }

        let states = Array2::from_shape_vec((times.len(), n_columns - 1), states)
            .map_err(|err| CoevolutionError::ReadError(format!("{}", err)))?
            .reversed_axes();
        Ok(Trajectory {
            times: Array1::from_vec(times),
            susceptible: states.slice(ndarray::s![..n_genotypes, ..]).to_owned(),
            infected: states.slice(ndarray::s![n_genotypes.., ..]).to_owned(),
        })
    }

    fn write(&self, space: &GenotypeSpace, writer: impl io::Write) -> Result<()> {
        if self.susceptible.nrows() != space.len() {
            return Err(CoevolutionError::WriteError(format!(
                "Trajectory has {} host genotypes, expected {}",
                self.susceptible.nrows(),
                space.len()
            )));
        }

        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(trajectory_header(space))
            .map_err(|err| CoevolutionError::WriteError(format!("{}", err)))?;
        for (idx, t) in self.times.iter().enumerate() {
            let row = std::iter::once(*t)
                .chain(self.susceptible.column(idx).into_iter().copied())
                .chain(self.infected.column(idx).into_iter().copied())
                .map(|value| value.to_string());
            writer
                .write_record(row)
                .map_err(|err| CoevolutionError::WriteError(format!("{}", err)))?;
        }
        writer
            .flush()
            .map_err(|err| CoevolutionError::WriteError(format!("{}", err)))
    }
}
