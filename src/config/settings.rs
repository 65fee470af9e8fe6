//! Settings module.

use super::parameters::{ParameterName, Parameters};

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::core::genotypes::{GenotypeSpace, N_PATHOGENS};
use crate::errors::{self, CoevolutionError};

/// Settings of a single simulation run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub initial: InitialConditions,
    #[serde(default = "default_horizon")]
    pub horizon: f64,
    #[serde(default)]
    pub max_step: Option<f64>,
    #[serde(default)]
    pub tolerances: Tolerances,
}

fn default_horizon() -> f64 {
    5000.
}

/// Error tolerances of the adaptive integrator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Tolerances {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
        }
    }
}

/// Initial abundances of uninfected and infected hosts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InitialConditions {
    /// Explicit abundances per host genotype and per pathogen genotype.
    Abundances {
        susceptible: Vec<f64>,
        infected: Vec<f64>,
    },

    /// Host genotypes in linkage equilibrium at the given allele frequencies, and the avirulent
    /// pathogen at the given frequency among infections.
    AlleleFrequencies {
        hosts: Vec<f64>,
        avirulent: f64,
        #[serde(default = "default_host_density")]
        host_density: f64,
        #[serde(default = "default_infected_density")]
        infected_density: f64,
    },
}

fn default_host_density() -> f64 {
    400.
}

fn default_infected_density() -> f64 {
    10.
}

impl InitialConditions {
    /// Resolve the initial susceptible and infected abundance vectors.
    pub fn resolve(&self, space: &GenotypeSpace) -> errors::Result<(Array1<f64>, Array1<f64>)> {
        let (susceptible, infected) = match self {
            InitialConditions::Abundances {
                susceptible,
                infected,
            } => (
                Array1::from_vec(susceptible.clone()),
                Array1::from_vec(infected.clone()),
            ),
            InitialConditions::AlleleFrequencies {
                hosts,
                avirulent,
                host_density,
                infected_density,
            } => {
                if hosts.len() != space.n_loci() {
                    return Err(CoevolutionError::InitializationError(format!(
                        "Expected {} allele frequencies, got {}",
                        space.n_loci(),
                        hosts.len()
                    )));
                }
                let susceptible: Array1<f64> = space
                    .iter()
                    .map(|genotype| {
                        hosts
                            .iter()
                            .enumerate()
                            .map(|(locus, freq)| {
                                if genotype.carries(locus) {
                                    *freq
                                } else {
                                    1. - freq
                                }
                            })
                            .product::<f64>()
                            * host_density
                    })
                    .collect();
                let infected = Array1::from_vec(vec![
                    avirulent * infected_density,
                    (1. - avirulent) * infected_density,
                    0.,
                ]);
                (susceptible, infected)
            }
        };

        if susceptible.len() != space.len() || infected.len() != N_PATHOGENS {
            return Err(CoevolutionError::InitializationError(format!(
                "Initial state has shape ({}, {}) instead of ({}, {})",
                susceptible.len(),
                infected.len(),
                space.len(),
                N_PATHOGENS
            )));
        }
        Ok((susceptible, infected))
    }
}

/// One axis of a two dimensional parameter sweep.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Axis {
    pub parameter: ParameterName,
    pub lower: f64,
    pub upper: f64,
}

impl Axis {
    /// `size` evenly spaced values from `lower` to `upper`, both inclusive.
    pub fn values(&self, size: usize) -> Vec<f64> {
        Array1::linspace(self.lower, self.upper, size).to_vec()
    }
}

/// Settings of a two dimensional parameter sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RasterSettings {
    #[serde(default)]
    pub parameters: Parameters,
    pub x: Axis,
    pub y: Axis,
    pub size: usize,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub initial: InitialConditions,
    #[serde(default = "default_horizon")]
    pub horizon: f64,
    #[serde(default)]
    pub max_step: Option<f64>,
    #[serde(default)]
    pub tolerances: Tolerances,
}

impl RasterSettings {
    /// Both axes must vary different parameters and stay in the valid parameter range.
    pub fn validate(&self) -> errors::Result<()> {
        if self.x.parameter == self.y.parameter {
            return Err(CoevolutionError::InitializationError(format!(
                "Both raster axes vary {}",
                self.x.parameter
            )));
        }
        for axis in [&self.x, &self.y] {
            for bound in [axis.lower, axis.upper] {
                self.parameters
                    .with(axis.parameter, bound)
                    .validate()
                    .map_err(|err| {
                        CoevolutionError::InitializationError(format!("Raster axis: {err}"))
                    })?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum SettingsError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
}

impl std::error::Error for SettingsError {}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(error) => write!(formatter, "IO error: {}", error),
            SettingsError::YamlError(error) => write!(formatter, "YAML error: {}", error),
        }
    }
}

macro_rules! impl_yaml_io {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut output = vec![];
                self.write(&mut output).map_err(|_| std::fmt::Error)?;
                write!(
                    formatter,
                    "{}",
                    String::from_utf8(output).map_err(|_| std::fmt::Error)?
                )
            }
        }

        impl $name {
            pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<(), SettingsError> {
                serde_yaml::to_writer(writer, self).map_err(SettingsError::YamlError)
            }

            pub fn read(reader: &mut dyn std::io::Read) -> Result<$name, SettingsError> {
                serde_yaml::from_reader(reader).map_err(SettingsError::YamlError)
            }

            pub fn write_to_file(&self, filename: &str) -> Result<(), SettingsError> {
                let file = fs::File::create(filename).map_err(SettingsError::IoError)?;
                let mut writer = std::io::BufWriter::new(file);
                self.write(&mut writer)
            }

            pub fn read_from_file(filename: &str) -> Result<$name, SettingsError> {
                let file = fs::File::open(filename).map_err(SettingsError::IoError)?;
                let mut reader = std::io::BufReader::new(file);
                Self::read(&mut reader)
            }
        }
    };
}

impl_yaml_io!(Settings);
impl_yaml_io!(RasterSettings);
