//! Configuration data structures for simulation setups.

mod parameters;
mod settings;

pub use parameters::{
    PARAMETER_NAMES, ParameterName, Parameters, ParametersError, Recombination, Selection,
};
pub use settings::{
    Axis, InitialConditions, RasterSettings, Settings, SettingsError, Tolerances,
};
