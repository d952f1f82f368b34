//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure. A build needs a target and a
//! configuration, given either as flags or through a hand-off file written by
//! an editor integration.

use clap::Parser;
use std::path::PathBuf;

mod parsing;

use parsing::parse_name;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_FILE: &str = ".vscode/crossbuild.json";

/// Builds native targets described by a crossbuild configuration, using Ninja.
#[derive(Debug, Clone, Parser, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target name.
    #[arg(
        short,
        long,
        value_name = "TARGET",
        value_parser = parse_name,
        required_unless_present = "tcfpath"
    )]
    pub target: Option<String>,

    /// Configuration name.
    #[arg(
        short,
        long,
        value_name = "CONFIGURATION",
        value_parser = parse_name,
        required_unless_present = "tcfpath"
    )]
    pub config: Option<String>,

    /// Hand-off file providing the target and configuration.
    #[arg(long, value_name = "FILE")]
    pub tcfpath: Option<PathBuf>,

    /// Path to the configuration file.
    #[arg(short = 'f', long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub file: PathBuf,

    /// Ninja executable to run, if not `ninja` on the `PATH`.
    ///
    /// Falls back to the `CROSSBUILD_NINJA` environment variable.
    #[arg(short = 'n', long, value_name = "PATH")]
    pub ninja: Option<camino::Utf8PathBuf>,

    /// Run as if started in this directory.
    ///
    /// This affects config lookup, source paths and the generated graph name.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Clean instead of build.
    #[arg(long)]
    pub clean: bool,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            target: None,
            config: None,
            tcfpath: None,
            file: PathBuf::from(DEFAULT_CONFIG_FILE),
            ninja: None,
            directory: None,
            clean: false,
            verbose: false,
        }
    }
}
