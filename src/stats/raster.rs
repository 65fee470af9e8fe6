//! Summary arrays of a parameter sweep.

use itertools::Itertools;
use ndarray::{Array1, Array2, Array3};
use std::fs;
use std::io;
use std::path::Path;

use super::frequencies::{allele_frequencies, avirulent_frequency};
use super::linkage::linkage_disequilibrium;
use super::transitivity::transitivity_slope;
use crate::config::ParameterName;
use crate::core::Model;
use crate::errors::{CoevolutionError, Result};
use crate::raster::RasterResult;
use crate::readwrite::write_npy;

/// Statistics of every raster cell, indexed by the sorted unique values of two parameters.
///
/// Cells without an equilibrium are `NaN` in every array.
#[derive(Clone, Debug)]
pub struct RasterStatistics {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    /// Derived allele frequency per locus, shape `(n_loci, n_x, n_y)`.
    pub allele_frequencies: Array3<f64>,
    pub avirulent: Array2<f64>,
    pub transitivity: Array2<f64>,
    pub linkage: Array2<f64>,
    /// `1` where the equilibrium is locally stable, `0` otherwise.
    pub stability: Array2<f64>,
}

fn unique_values(raster: &RasterResult, name: ParameterName) -> Array1<f64> {
    raster
        .entries
        .iter()
        .map(|entry| entry.parameters.get(name))
        .sorted_by(f64::total_cmp)
        .dedup()
        .collect()
}

fn position(values: &Array1<f64>, value: f64) -> Result<usize> {
    values.iter().position(|&v| v == value).ok_or_else(|| {
        CoevolutionError::NumericalError(format!("Value {value} is not on the raster axis"))
    })
}

impl RasterStatistics {
    pub fn new(raster: &RasterResult, x: ParameterName, y: ParameterName) -> Result<Self> {
        let Some(first) = raster.entries.first() else {
            return Err(CoevolutionError::ReadError("Raster has no entries".to_string()));
        };
        let n_loci = Model::new(first.parameters.clone()).space().n_loci();

        let x_values = unique_values(raster, x);
        let y_values = unique_values(raster, y);
        let shape = (x_values.len(), y_values.len());

        let mut statistics = Self {
            allele_frequencies: Array3::from_elem((n_loci, shape.0, shape.1), f64::NAN),
            avirulent: Array2::from_elem(shape, f64::NAN),
            transitivity: Array2::from_elem(shape, f64::NAN),
            linkage: Array2::from_elem(shape, f64::NAN),
            stability: Array2::from_elem(shape, f64::NAN),
            x: x_values,
            y: y_values,
        };

        for entry in &raster.entries {
            let i = position(&statistics.x, entry.parameters.get(x))?;
            let j = position(&statistics.y, entry.parameters.get(y))?;
            let Some(result) = &entry.result else {
                continue;
            };

            let model = Model::new(entry.parameters.clone());
            let susceptible = Array1::from_vec(result.susceptible.clone());
            let infected = Array1::from_vec(result.infected.clone());

            for (locus, frequency) in allele_frequencies(model.space(), susceptible.view())
                .into_iter()
                .enumerate()
            {
                statistics.allele_frequencies[[locus, i, j]] = frequency;
            }
            statistics.avirulent[[i, j]] = avirulent_frequency(infected.view());
            statistics.linkage[[i, j]] = linkage_disequilibrium(model.space(), susceptible.view());
            statistics.transitivity[[i, j]] =
                transitivity_slope(&model, susceptible.view(), infected.view()).unwrap_or_else(
                    |err| {
                        log::warn!("No transitivity at {:?}: {err}", entry.coordinate);
                        f64::NAN
                    },
                );
            statistics.stability[[i, j]] = if result.stable { 1. } else { 0. };
        }

        Ok(statistics)
    }

    /// Write every array as a `.npy` file into `outdir`.
    pub fn write_to_dir(&self, outdir: &Path) -> Result<()> {
        fs::create_dir_all(outdir)
            .map_err(|err| CoevolutionError::WriteError(format!("{}", err)))?;

        let (n_loci, n_x, n_y) = self.allele_frequencies.dim();
        let files: [(&str, Vec<u64>, Vec<f64>); 7] = [
            ("x.npy", vec![n_x as u64], self.x.to_vec()),
            ("y.npy", vec![n_y as u64], self.y.to_vec()),
            (
                "allele_frequencies.npy",
                vec![n_loci as u64, n_x as u64, n_y as u64],
                self.allele_frequencies.iter().copied().collect(),
            ),
            (
                "avirulent.npy",
                vec![n_x as u64, n_y as u64],
                self.avirulent.iter().copied().collect(),
            ),
            (
                "transitivity.npy",
                vec![n_x as u64, n_y as u64],
                self.transitivity.iter().copied().collect(),
            ),
            (
                "linkage.npy",
                vec![n_x as u64, n_y as u64],
                self.linkage.iter().copied().collect(),
            ),
            (
                "stability.npy",
                vec![n_x as u64, n_y as u64],
                self.stability.iter().copied().collect(),
            ),
        ];

        for (name, shape, data) in files {
            log::info!("Writing {name}...");
            let file = fs::File::create(outdir.join(name))
                .map_err(|err| CoevolutionError::WriteError(format!("{name}: {err}")))?;
            let mut writer = io::BufWriter::new(file);
            write_npy(&mut writer, &shape, data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Axis, Parameters};
    use crate::core::{Eigenvalue, EquilibriumResult};
    use crate::raster::RasterEntry;
    use serial_test::serial;

    fn result(susceptible: Vec<f64>, infected: Vec<f64>, stable: bool) -> EquilibriumResult {
        EquilibriumResult {
            susceptible,
            infected,
            eigenvalues: vec![Eigenvalue { re: -1., im: 0. }],
            invasion_rate: 0.1,
            stable,
            converged: true,
            residual: 0.,
            message: String::new(),
        }
    }

    fn raster() -> RasterResult {
        let x = Axis {
            parameter: ParameterName::CostGeneral,
            lower: 0.,
            upper: 0.2,
        };
        let y = Axis {
            parameter: ParameterName::V,
            lower: 0.,
            upper: 0.3,
        };
        let uniform = vec![10.; 8];
        let coupled = vec![5., 0., 0., 5., 0., 0., 0., 0.];
        let entries = vec![
            ((0, 0), 0., 0., Some(result(uniform.clone(), vec![3., 1., 0.], true))),
            ((0, 1), 0., 0.3, Some(result(coupled, vec![1., 1., 0.], false))),
            ((1, 0), 0.2, 0., None),
            ((1, 1), 0.2, 0.3, Some(result(uniform, vec![0., 0., 0.], true))),
        ]
        .into_iter()
        .map(|(coordinate, c_g, v, result)| RasterEntry {
            coordinate,
            parameters: Parameters::default()
                .with(ParameterName::CostGeneral, c_g)
                .with(ParameterName::V, v),
            error: result.is_none().then(|| "failed".to_string()),
            result,
        })
        .collect();
        RasterResult {
            x,
            y,
            size: 2,
            entries,
        }
    }

    #[test]
    fn group_by_parameters() {
        let statistics =
            RasterStatistics::new(&raster(), ParameterName::CostGeneral, ParameterName::V).unwrap();
        assert_eq!(statistics.x.to_vec(), vec![0., 0.2]);
        assert_eq!(statistics.y.to_vec(), vec![0., 0.3]);
        assert_eq!(statistics.allele_frequencies.dim(), (3, 2, 2));

        assert_eq!(statistics.allele_frequencies[[1, 0, 0]], 0.5);
        assert_eq!(statistics.avirulent[[0, 0]], 0.75);
        assert_eq!(statistics.stability[[0, 0]], 1.);
        assert!(statistics.transitivity[[0, 0]] > 0.);

        assert!((statistics.linkage[[0, 1]] - 1.).abs() < 1e-12);
        assert_eq!(statistics.stability[[0, 1]], 0.);

        assert!(statistics.avirulent[[1, 0]].is_nan());
        assert!(statistics.stability[[1, 0]].is_nan());

        // pathogen free cell has no transitivity
        assert!(statistics.transitivity[[1, 1]].is_nan());
    }

    #[test]
    fn swapped_axes_transpose() {
        let raster = raster();
        let statistics =
            RasterStatistics::new(&raster, ParameterName::CostGeneral, ParameterName::V).unwrap();
        let swapped =
            RasterStatistics::new(&raster, ParameterName::V, ParameterName::CostGeneral).unwrap();
        assert_eq!(swapped.stability[[1, 0]], statistics.stability[[0, 1]]);
        assert_eq!(swapped.linkage[[1, 0]], statistics.linkage[[0, 1]]);
    }

    #[test]
    fn empty_raster_is_rejected() {
        let mut raster = raster();
        raster.entries.clear();
        assert!(
            RasterStatistics::new(&raster, ParameterName::CostGeneral, ParameterName::V).is_err()
        );
    }

    #[test]
    #[serial]
    fn write_arrays() {
        let statistics =
            RasterStatistics::new(&raster(), ParameterName::CostGeneral, ParameterName::V).unwrap();
        let outdir = std::env::temp_dir().join("test_raster_statistics");
        statistics.write_to_dir(&outdir).unwrap();

        let buffer = std::fs::read(outdir.join("allele_frequencies.npy")).unwrap();
        let npy_data = npyz::NpyFile::new(buffer.as_slice()).unwrap();
        assert_eq!(npy_data.shape(), &[3, 2, 2]);

        let buffer = std::fs::read(outdir.join("stability.npy")).unwrap();
        let npy_data = npyz::NpyFile::new(buffer.as_slice()).unwrap();
        assert_eq!(npy_data.shape(), &[2, 2]);
        let data: Vec<f64> = npy_data
            .data::<f64>()
            .unwrap()
            .map(|el| el.unwrap())
            .collect();
        assert_eq!(data[0], 1.);
        assert_eq!(data[1], 0.);
        assert!(data[2].is_nan());

        std::fs::remove_dir_all(outdir).unwrap();
    }
}
