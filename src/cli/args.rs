//! Command line argument definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Disc Organizer - Remux disc images and file the tracks into a library
#[derive(Parser, Debug)]
#[command(name = "disc-organizer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <config dir>/disc_organizer/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dry run - report intended actions without launching or moving anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover discs and record them
    Scan {
        /// Directory containing movies/ and tv/ folders
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Extract tracks from discovered discs
    Remux {
        /// Directory containing movies/ and tv/ folders
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Classify and place tracks of discs already remuxed
    Rename {
        /// Directory containing movies/ and tv/ folders
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Run the whole pipeline
    Run {
        /// Directory containing movies/ and tv/ folders
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Reprocess discs that are already done
        #[arg(long)]
        force: bool,
    },

    /// Show the state of recorded discs
    Report {
        /// Only list failed discs
        #[arg(long)]
        failed: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ReportFormat,
    },

    /// Remove leftover temporary extraction directories
    Clean {
        /// Also drop records of failed discs so they start over
        #[arg(long)]
        records: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
}
