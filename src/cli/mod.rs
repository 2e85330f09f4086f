//! Command-line entry points.
//!
//! - `toad extract` runs the client pass over files, no host involved
//! - `toad watch` drives the full pipeline against the filesystem

mod args;
mod extract;
mod watch;

pub use args::{Cli, Commands};

use anyhow::Result;
use clap::{ColorChoice, Parser};

use crate::config::ToadConfig;
use crate::logger;

/// Parse arguments and run the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = ToadConfig::load(&cli.config)?;

    match cli.command {
        Commands::Extract { files, out } => extract::run(config, &files, out.as_deref()),
        Commands::Watch { dir, port } => watch::run(config, dir, port),
    }
}
