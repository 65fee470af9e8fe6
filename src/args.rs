use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    name = "coevolve",
)]
pub struct Args {
    /// Path to log file.
    #[clap(long, default_value = "coevolve.log")]
    pub log_file: String,

    /// Increase logging verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Number of threads used by raster sweeps.
    #[clap(long)]
    pub threads: Option<usize>,

    /// Disable the progress bar.
    #[clap(long, default_value_t = false)]
    pub disable_progress_bar: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Integrate a single model and write the trajectory.
    Simulate {
        /// Path to settings.
        #[clap(long)]
        settings: String,

        /// Path to output (csv file).
        #[clap(long, short, default_value = "trajectory.csv")]
        output: String,
    },

    /// Integrate a single model and refine the final state to an equilibrium.
    Equilibrium {
        /// Path to settings.
        #[clap(long)]
        settings: String,

        /// Path to output (yaml file).
        #[clap(long, short, default_value = "equilibrium.yaml")]
        output: String,
    },

    /// Find equilibria over a two dimensional parameter grid.
    Raster {
        /// Path to raster settings.
        #[clap(long)]
        settings: String,

        /// Path to output (yaml file).
        #[clap(long, short, default_value = "raster.yaml")]
        output: String,
    },

    /// Compute summary arrays of a raster.
    Summarize {
        /// Path to raster (yaml file).
        #[clap(long)]
        raster: String,

        /// Parameter along the first array axis.
        #[clap(long)]
        x: String,

        /// Parameter along the second array axis.
        #[clap(long)]
        y: String,

        /// Output directory for npy files.
        #[clap(long, default_value = "./")]
        outdir: String,
    },
}
