//! depshift CLI - collect and apply npm/yarn dependency updates.

mod commands;
mod process;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "depshift")]
#[command(about = "Collect and apply npm/yarn dependency updates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (defaults to depshift.toml in the project)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Write the current/updated schema of every manifest and lockfile
    ///
    /// Examples:
    ///   depshift collect .              # project directory
    ///   depshift collect ./yarn.lock    # explicit lockfile
    Collect {
        /// Project directory or lockfile
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply the updated constraints of a collected report
    Act {
        /// Report produced by `depshift collect`
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Write the refreshed report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Raise range lower bounds to the installed versions
    LowerBounds {
        /// Directory holding package.json
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    match &cli.command {
        Command::Collect { path, output } => commands::collect(path, output.as_deref(), config),
        Command::Act { input, output } => commands::act(input, output.as_deref(), config),
        Command::LowerBounds { dir } => commands::lower_bounds(dir, config),
    }
}
