//! Two dimensional parameter sweeps.
//!
//! Every cell of the raster is an independent integrate-then-equilibrate run on a freshly built
//! model, so cells can be evaluated in any order and on any thread.

use indicatif::ProgressBar;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::config::{Axis, InitialConditions, Parameters, RasterSettings};
use crate::core::genotypes::{GenotypeSpace, N_LOCI};
use crate::core::{EquilibriumResult, IntegratorOptions, Model, integrate_to_equilibrium};
use crate::errors::{CoevolutionError, Result};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RasterEntry {
    /// Position `(i, j)` along the `x` and `y` axes.
    pub coordinate: (usize, usize),
    pub parameters: Parameters,
    pub result: Option<EquilibriumResult>,
    /// Reason why the cell has no result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RasterResult {
    pub x: Axis,
    pub y: Axis,
    pub size: usize,
    pub entries: Vec<RasterEntry>,
}

impl RasterResult {
    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<()> {
        serde_yaml::to_writer(writer, self)
            .map_err(|err| CoevolutionError::WriteError(format!("{}", err)))
    }

    pub fn read(reader: &mut dyn std::io::Read) -> Result<RasterResult> {
        serde_yaml::from_reader(reader)
            .map_err(|err| CoevolutionError::ReadError(format!("{}", err)))
    }

    pub fn write_to_file(&self, filename: &str) -> Result<()> {
        let file = fs::File::create(filename)
            .map_err(|err| CoevolutionError::WriteError(format!("{filename}: {err}")))?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: &str) -> Result<RasterResult> {
        let file = fs::File::open(filename)
            .map_err(|err| CoevolutionError::ReadError(format!("{filename}: {err}")))?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }
}

/// Parameters of every cell, row major over `(x, y)`.
pub fn cells(settings: &RasterSettings) -> Vec<((usize, usize), Parameters)> {
    let x_values = settings.x.values(settings.size);
    let y_values = settings.y.values(settings.size);
    let mut cells = Vec::with_capacity(x_values.len() * y_values.len());
    for (i, &x) in x_values.iter().enumerate() {
        for (j, &y) in y_values.iter().enumerate() {
            let parameters = settings
                .parameters
                .with(settings.x.parameter, x)
                .with(settings.y.parameter, y);
            cells.push(((i, j), parameters));
        }
    }
    cells
}

fn run_cell(
    coordinate: (usize, usize),
    parameters: Parameters,
    initial: &InitialConditions,
    horizon: f64,
    options: IntegratorOptions,
) -> RasterEntry {
    let model = Model::new(parameters.clone());
    let outcome = initial.resolve(model.space()).and_then(|(susceptible, infected)| {
        integrate_to_equilibrium(
            &model,
            susceptible.view(),
            infected.view(),
            horizon,
            options,
        )
    });

    match outcome {
        Ok(result) => RasterEntry {
            coordinate,
            parameters,
            result: Some(result),
            error: None,
        },
        Err(err) => {
            log::warn!("Raster cell {coordinate:?} failed: {err}");
            RasterEntry {
                coordinate,
                parameters,
                result: None,
                error: Some(format!("{}", err)),
            }
        }
    }
}

/// Run every cell of the raster and collect the results in cell order.
///
/// Failing cells are kept with their error so the raster stays complete.
pub fn sweep(settings: &RasterSettings, progress: Option<&ProgressBar>) -> Result<RasterResult> {
    if settings.size == 0 {
        return Err(CoevolutionError::InitializationError(
            "Raster size must be positive".to_string(),
        ));
    }
    settings.validate()?;
    // reject malformed initial conditions once instead of in every cell
    settings.initial.resolve(&GenotypeSpace::new(N_LOCI))?;

    let cells = cells(settings);
    let options = IntegratorOptions::new(&settings.tolerances, settings.max_step);
    log::info!(
        "Sweeping {} cells over {} x {}",
        cells.len(),
        settings.x.parameter,
        settings.y.parameter
    );

    let evaluate = |(coordinate, parameters): ((usize, usize), Parameters)| {
        let entry = run_cell(
            coordinate,
            parameters,
            &settings.initial,
            settings.horizon,
            options,
        );
        if let Some(bar) = progress {
            bar.inc(1);
        }
        entry
    };

    #[cfg(feature = "parallel")]
    let entries: Vec<RasterEntry> = cells.into_par_iter().map(evaluate).collect();
    #[cfg(not(feature = "parallel"))]
    let entries: Vec<RasterEntry> = cells.into_iter().map(evaluate).collect();

    let n_failed = entries.iter().filter(|entry| entry.result.is_none()).count();
    if n_failed > 0 {
        log::warn!("{n_failed} of {} raster cells failed", entries.len());
    }
    log::info!("Finished raster sweep.");

    Ok(RasterResult {
        x: settings.x,
        y: settings.y,
        size: settings.size,
        entries,
    })
}
