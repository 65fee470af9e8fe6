use clap::Parser;
use coevolve::args::Args;
use coevolve::runner::Runner;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let runner = Runner::new(args)?;
    runner.start()
}
