use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a power-shift sigma schedule for a discrete diffusion model
    Schedule {
        #[clap(flatten)]
        args: cli::schedule::ScheduleArgs,
    },
    /// Save power-shift scheduler parameters as a JSON config file
    WriteConfig {
        #[clap(flatten)]
        args: cli::schedule::WriteConfigArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Schedule { args } => {
            cli::schedule::handle_schedule(args)?;
        }
        Commands::WriteConfig { args } => {
            cli::schedule::handle_write_config(args)?;
        }
    }

    Ok(())
}
