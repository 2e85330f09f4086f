//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Toad CSS-in-JS extractor CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: toad.toml)
    #[arg(short = 'C', long, global = true, default_value = "toad.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Extract style templates and print or write the results
    #[command(visible_alias = "x")]
    Extract {
        /// Source files to process
        #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
        files: Vec<PathBuf>,

        /// Write rewritten sources and stylesheets under this directory
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        out: Option<PathBuf>,
    },

    /// Watch sources and keep virtual stylesheets up to date
    #[command(visible_alias = "w")]
    Watch {
        /// Directory to watch (default: project root)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Port of the notification websocket
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_args() {
        let cli = Cli::parse_from(["toad", "extract", "a.tsx", "b.tsx", "--out", "dist"]);
        let Commands::Extract { files, out } = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(files, [PathBuf::from("a.tsx"), PathBuf::from("b.tsx")]);
        assert_eq!(out, Some(PathBuf::from("dist")));
        assert_eq!(cli.config, PathBuf::from("toad.toml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["toad", "watch", "src", "-C", "cfg/toad.toml", "--verbose"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("cfg/toad.toml"));
        assert!(matches!(
            cli.command,
            Commands::Watch { dir: Some(_), port: None }
        ));
    }

    #[test]
    fn test_extract_requires_files() {
        assert!(Cli::try_parse_from(["toad", "extract"]).is_err());
    }
}
