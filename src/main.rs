//! De novo variant QC filtering main executable

pub mod common;
pub mod denovos;
pub mod err;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "De novo variant QC filtering",
    long_about = "This tool screens candidate de novo calls of parent-child trios for technical artefacts"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// De novo candidate related commands.
    Denovos(Denovos),
}

/// Parsing of "denovos *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Denovos {
    /// The sub command to run
    #[command(subcommand)]
    command: DenovosCommands,
}

/// Enum supporting the parsing of "denovos *" sub commands.
#[derive(Debug, Subcommand)]
enum DenovosCommands {
    Filter(denovos::Args),
    MinDepth(denovos::min_depth::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Denovos(denovos) => match &denovos.command {
                DenovosCommands::Filter(args) => denovos::run(&cli.common, args)?,
                DenovosCommands::MinDepth(args) => denovos::min_depth::run(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
