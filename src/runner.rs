use anyhow::Result;

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io;
use std::path::Path;

use crate::args::{Args, Command};
use crate::config::{ParameterName, Parameters, RasterSettings, Settings};
use crate::core::{IntegratorOptions, Model, integrate_to_equilibrium, simulate};
use crate::raster::{RasterResult, sweep};
use crate::readwrite::TrajectoryIO;
use crate::stats::RasterStatistics;

pub struct Runner {
    args: Args,
}

impl Runner {
    pub fn new(args: Args) -> Result<Runner> {
        Self::setup_logger(&args);
        #[cfg(feature = "parallel")]
        Self::setup_rayon(&args);

        Ok(Self { args })
    }

    pub fn start(&self) -> Result<()> {
        match &self.args.command {
            Command::Simulate { settings, output } => self.simulate(settings, output),
            Command::Equilibrium { settings, output } => self.equilibrium(settings, output),
            Command::Raster { settings, output } => self.raster(settings, output),
            Command::Summarize {
                raster,
                x,
                y,
                outdir,
            } => self.summarize(raster, x, y, outdir),
        }
    }

    /// Setup logging level and file
    fn setup_logger(args: &Args) {
        let log_level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        simple_logging::log_to_file(args.log_file.as_str(), log_level).unwrap_or_else(|_| {
            eprintln!("Unable to open log file.");
            std::process::exit(1);
        });
    }

    /// Setup rayon thread pool
    #[cfg(feature = "parallel")]
    fn setup_rayon(args: &Args) {
        if let Some(n_threads) = args.threads {
            println!("Setting number of threads to {}.", n_threads);
            rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build_global()
                .unwrap_or_else(|_| {
                    eprintln!("Unable to set number of threads.");
                    std::process::exit(1);
                });
        }
    }

    fn check_parameters(parameters: &Parameters) -> Result<()> {
        parameters.validate()?;
        log::info!("Using parameters\n{}", parameters);
        Ok(())
    }

    /// Load settings from file
    fn load_settings(path: &str) -> Result<Settings> {
        let settings = Settings::read_from_file(path)?;
        Self::check_parameters(&settings.parameters)?;
        log::info!("Loaded settings\n{}", settings);
        Ok(settings)
    }

    fn simulate(&self, settings: &str, output: &str) -> Result<()> {
        let settings = Self::load_settings(settings)?;
        let model = Model::new(settings.parameters.clone());
        let (susceptible, infected) = settings.initial.resolve(model.space())?;
        let options = IntegratorOptions::new(&settings.tolerances, settings.max_step);

        let trajectory = simulate(
            &model,
            susceptible.view(),
            infected.view(),
            settings.horizon,
            options,
        )?;
        trajectory.write_to_file(model.space(), output)?;
        log::info!("Stored trajectory in {output}.");
        Ok(())
    }

    fn equilibrium(&self, settings: &str, output: &str) -> Result<()> {
        let settings = Self::load_settings(settings)?;
        let model = Model::new(settings.parameters.clone());
        let (susceptible, infected) = settings.initial.resolve(model.space())?;
        let options = IntegratorOptions::new(&settings.tolerances, settings.max_step);

        let result = integrate_to_equilibrium(
            &model,
            susceptible.view(),
            infected.view(),
            settings.horizon,
            options,
        )?;
        if !result.converged {
            eprintln!("Equilibrium search did not converge: {}", result.message);
        }

        let mut writer = io::BufWriter::new(fs::File::create(output)?);
        serde_yaml::to_writer(&mut writer, &result)?;
        log::info!("Stored equilibrium in {output}.");
        Ok(())
    }

    fn raster(&self, settings: &str, output: &str) -> Result<()> {
        let settings = RasterSettings::read_from_file(settings)?;
        Self::check_parameters(&settings.parameters)?;
        log::info!("Loaded raster settings\n{}", settings);

        let bar = match self.args.disable_progress_bar {
            true => None,
            false => {
                let bar = ProgressBar::new((settings.size * settings.size) as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "[{bar:40}] {pos:>7}/{len:7} [{elapsed_precise} / {duration_precise}] {msg}",
                        )?
                        .progress_chars("=> "),
                );
                Some(bar)
            }
        };

        let raster = sweep(&settings, bar.as_ref())?;
        if let Some(bar) = bar {
            bar.finish_with_message("Done.");
        }

        raster.write_to_file(output)?;
        log::info!("Stored raster in {output}.");
        Ok(())
    }

    fn summarize(&self, raster: &str, x: &str, y: &str, outdir: &str) -> Result<()> {
        let x: ParameterName = x.parse()?;
        let y: ParameterName = y.parse()?;
        let raster = RasterResult::read_from_file(raster)?;
        log::info!("Summarizing {} raster cells over {x} x {y}", raster.entries.len());

        let statistics = RasterStatistics::new(&raster, x, y)?;
        statistics.write_to_dir(Path::new(outdir))?;
        log::info!("Stored raster statistics in {outdir}.");
        Ok(())
    }
}
