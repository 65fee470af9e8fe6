use derive_more::Display;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

/// Where the cost of virulence is paid.
#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// The virulent pathogen pays its cost on every host.
    #[display("hard")]
    Hard,

    /// The virulent pathogen only pays its cost on hosts without specific resistance.
    #[default]
    #[display("soft")]
    Soft,
}

/// Recombination rate between the resistance loci.
///
/// The rate that applies to a mating is chosen by the modifier allele of the maternal parent. A
/// single value is used for both modifier alleles.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum Recombination {
    Uniform(f64),
    Modified([f64; 2]),
}

impl Recombination {
    /// Recombination rate for a mating whose maternal parent carries `modifier_allele`.
    #[inline]
    pub fn rate(&self, modifier_allele: u8) -> f64 {
        match self {
            Recombination::Uniform(rate) => *rate,
            Recombination::Modified(rates) => rates[modifier_allele as usize],
        }
    }

    pub fn rates(&self) -> [f64; 2] {
        [self.rate(0), self.rate(1)]
    }
}

impl Default for Recombination {
    fn default() -> Self {
        Recombination::Modified([0.05, 0.])
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    /// Coefficient of density dependent mortality.
    pub k: f64,

    /// Baseline death rate of all hosts.
    pub mu: f64,

    /// Baseline birth rate, scaling the total reproductive output of uninfected hosts.
    pub b: f64,

    /// Baseline transmission rate.
    pub beta: f64,

    /// Transmission discount of the foreign pathogen on any host.
    pub nh: f64,

    /// Strength of general resistance.
    pub g: f64,

    /// Strength of specific resistance against the avirulent pathogen.
    pub s: f64,

    /// Transmission discount paid by the virulent pathogen.
    pub v: f64,

    /// Fecundity cost of general resistance.
    pub c_g: f64,

    /// Fecundity cost of specific resistance.
    pub c_s: f64,

    /// Recombination rate(s) between the general and specific resistance loci.
    pub rho: Recombination,

    /// Selection regime on the virulent pathogen.
    pub sel: Selection,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            k: 0.001,
            mu: 0.2,
            b: 1.,
            beta: 0.5,
            nh: 0.1,
            g: 0.3,
            s: 0.9,
            v: 0.2,
            c_g: 0.1,
            c_s: 0.2,
            rho: Recombination::default(),
            sel: Selection::default(),
        }
    }
}

/// Scalar parameters that can be addressed by their configuration key.
#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterName {
    #[serde(rename = "k")]
    #[display("k")]
    K,
    #[serde(rename = "mu")]
    #[display("mu")]
    Mu,
    #[serde(rename = "b")]
    #[display("b")]
    B,
    #[serde(rename = "beta")]
    #[display("beta")]
    Beta,
    #[serde(rename = "nh")]
    #[display("nh")]
    Nh,
    #[serde(rename = "g")]
    #[display("g")]
    G,
    #[serde(rename = "s")]
    #[display("s")]
    S,
    #[serde(rename = "v")]
    #[display("v")]
    V,
    #[serde(rename = "c_g")]
    #[display("c_g")]
    CostGeneral,
    #[serde(rename = "c_s")]
    #[display("c_s")]
    CostSpecific,
    #[serde(rename = "rho_0")]
    #[display("rho_0")]
    Rho0,
    #[serde(rename = "rho_1")]
    #[display("rho_1")]
    Rho1,
}

pub static PARAMETER_NAMES: phf::Map<&'static str, ParameterName> = phf_map! {
    "k" => ParameterName::K,
    "mu" => ParameterName::Mu,
    "b" => ParameterName::B,
    "beta" => ParameterName::Beta,
    "nh" => ParameterName::Nh,
    "g" => ParameterName::G,
    "s" => ParameterName::S,
    "v" => ParameterName::V,
    "c_g" => ParameterName::CostGeneral,
    "c_s" => ParameterName::CostSpecific,
    "rho_0" => ParameterName::Rho0,
    "rho_1" => ParameterName::Rho1,
};

impl FromStr for ParameterName {
    type Err = ParametersError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        PARAMETER_NAMES
            .get(name)
            .copied()
            .ok_or_else(|| ParametersError::UnknownParameter(name.to_string()))
    }
}

#[derive(Debug)]
pub enum ParametersError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
    UnknownParameter(String),
    OutOfRange(ParameterName, f64),
}

impl std::error::Error for ParametersError {}

impl std::fmt::Display for ParametersError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParametersError::IoError(error) => write!(formatter, "IO error: {}", error),
            ParametersError::YamlError(error) => write!(formatter, "YAML error: {}", error),
            ParametersError::UnknownParameter(name) => {
                write!(formatter, "Unknown parameter: {}", name)
            }
            ParametersError::OutOfRange(name, value) => {
                write!(formatter, "Parameter {} out of range: {}", name, value)
            }
        }
    }
}

impl std::fmt::Display for Parameters {
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

impl Parameters {
    pub fn get(&self, name: ParameterName) -> f64 {
        match name {
            ParameterName::K => self.k,
            ParameterName::Mu => self.mu,
            ParameterName::B => self.b,
            ParameterName::Beta => self.beta,
            ParameterName::Nh => self.nh,
            ParameterName::G => self.g,
            ParameterName::S => self.s,
            ParameterName::V => self.v,
            ParameterName::CostGeneral => self.c_g,
            ParameterName::CostSpecific => self.c_s,
            ParameterName::Rho0 => self.rho.rate(0),
            ParameterName::Rho1 => self.rho.rate(1),
        }
    }

    pub fn set(&mut self, name: ParameterName, value: f64) {
        match name {
            ParameterName::K => self.k = value,
            ParameterName::Mu => self.mu = value,
            ParameterName::B => self.b = value,
            ParameterName::Beta => self.beta = value,
            ParameterName::Nh => self.nh = value,
            ParameterName::G => self.g = value,
            ParameterName::S => self.s = value,
            ParameterName::V => self.v = value,
            ParameterName::CostGeneral => self.c_g = value,
            ParameterName::CostSpecific => self.c_s = value,
            ParameterName::Rho0 => {
                let [_, rho_1] = self.rho.rates();
                self.rho = Recombination::Modified([value, rho_1]);
            }
            ParameterName::Rho1 => {
                let [rho_0, _] = self.rho.rates();
                self.rho = Recombination::Modified([rho_0, value]);
            }
        }
    }

    /// Copy of these parameters with a single value replaced.
    pub fn with(&self, name: ParameterName, value: f64) -> Self {
        let mut parameters = self.clone();
        parameters.set(name, value);
        parameters
    }

    /// Check that rates, costs and strengths lie in `[0, 1]` and recombination rates in
    /// `[0, 0.5]`.
    pub fn validate(&self) -> Result<(), ParametersError> {
        for (_, &name) in PARAMETER_NAMES.entries() {
            let value = self.get(name);
            let upper = match name {
                ParameterName::Rho0 | ParameterName::Rho1 => 0.5,
                _ => 1.,
            };
            if !(0. ..=upper).contains(&value) {
                return Err(ParametersError::OutOfRange(name, value));
            }
        }
        Ok(())
    }

    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<(), ParametersError> {
        serde_yaml::to_writer(writer, self).map_err(ParametersError::YamlError)
    }

    pub fn read(reader: &mut dyn std::io::Read) -> Result<Parameters, ParametersError> {
        serde_yaml::from_reader(reader).map_err(ParametersError::YamlError)
    }

    pub fn write_to_file(&self, filename: &str) -> Result<(), ParametersError> {
        let file = fs::File::create(filename).map_err(ParametersError::IoError)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: &str) -> Result<Parameters, ParametersError> {
        let file = fs::File::open(filename).map_err(ParametersError::IoError)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn read_write() {
        let mut buffer = Vec::new();
        let parameters = Parameters {
            rho: Recombination::Modified([0.05, 0.05]),
            sel: Selection::Hard,
            ..Parameters::default()
        };
        parameters.write(&mut buffer).unwrap();
        let read_parameters = Parameters::read(&mut buffer.as_slice()).unwrap();
        assert_eq!(read_parameters, parameters);
    }

    #[test]
    fn read_defaults() {
        let yaml = "c_g: 0.05\nsel: hard\n";
        let parameters = Parameters::read(&mut yaml.as_bytes()).unwrap();
        assert_eq!(parameters.c_g, 0.05);
        assert_eq!(parameters.sel, Selection::Hard);
        assert_eq!(parameters.beta, 0.5);
        assert_eq!(parameters.rho, Recombination::Modified([0.05, 0.]));
    }

    #[test]
    fn read_scalar_recombination() {
        let yaml = "rho: 0.1\n";
        let parameters = Parameters::read(&mut yaml.as_bytes()).unwrap();
        assert_eq!(parameters.rho, Recombination::Uniform(0.1));
        assert_eq!(parameters.rho.rates(), [0.1, 0.1]);
    }

    #[test]
    fn reject_unknown_keys() {
        let yaml = "c_g: 0.05\nc_x: 0.2\n";
        assert!(matches!(
            Parameters::read(&mut yaml.as_bytes()),
            Err(ParametersError::YamlError(_))
        ));
    }

    #[test]
    fn named_access() {
        let parameters = Parameters::default();
        for (key, &name) in PARAMETER_NAMES.entries() {
            assert_eq!(key.parse::<ParameterName>().unwrap(), name);
            assert_eq!(name.to_string(), *key);
            let updated = parameters.with(name, 0.25);
            assert_eq!(updated.get(name), 0.25);
        }
        assert!("gamma".parse::<ParameterName>().is_err());
    }

    #[test]
    fn set_single_recombination_rate() {
        let parameters = Parameters {
            rho: Recombination::Uniform(0.1),
            ..Parameters::default()
        };
        let updated = parameters.with(ParameterName::Rho1, 0.);
        assert_eq!(updated.rho, Recombination::Modified([0.1, 0.]));
    }

    #[test]
    fn validate_ranges() {
        assert!(Parameters::default().validate().is_ok());
        let parameters = Parameters::default().with(ParameterName::CostGeneral, 1.2);
        assert!(matches!(
            parameters.validate(),
            Err(ParametersError::OutOfRange(ParameterName::CostGeneral, _))
        ));
        let parameters = Parameters::default().with(ParameterName::Rho0, 0.6);
        assert!(parameters.validate().is_err());
    }

    #[test]
    #[serial]
    fn read_write_file() {
        let tmp_dir = std::env::temp_dir().join("test_parameters.yaml");
        let path = tmp_dir.to_str().unwrap();
        let parameters = Parameters::default();
        parameters.write_to_file(path).unwrap();
        let read_parameters = Parameters::read_from_file(path).unwrap();
        assert_eq!(read_parameters, parameters);
        std::fs::remove_file(path).unwrap();
    }
}
