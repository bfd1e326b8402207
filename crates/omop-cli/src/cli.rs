//! CLI argument definitions for the ECG to OMOP pipeline.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use omop_cli::config::ConfigOverrides;

#[derive(Parser)]
#[command(
    name = "ecg-omop",
    version,
    about = "ECG to OMOP - Load flat ECG exam tables into an OMOP database",
    long_about = "Convert flat per-exam ECG tables into OMOP CDM entity tables.\n\n\
                  Concepts are resolved against CSV vocabulary documents; loading is\n\
                  incremental, so re-running the same inputs writes nothing new."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow patient identifiers and free text in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// Pipeline configuration file (default: ./ecg-omop.toml when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import, assemble and load an input tree into the database.
    Run(RunArgs),

    /// Import and assemble an input tree, writing each entity table as CSV.
    Assemble(AssembleArgs),

    /// Load and validate a vocabulary directory.
    Vocab(VocabArgs),

    /// List the entity tables in load order with their key columns.
    Tables,
}

/// Options shared by the commands that assemble.
#[derive(Args)]
pub struct AssemblyArgs {
    /// Input root with one sub-directory per dataset.
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory of vocabulary CSV documents.
    #[arg(long = "vocabulary-dir", value_name = "DIR")]
    pub vocabulary_dir: Option<PathBuf>,

    /// Fail on source terms without a concept instead of mapping them to 0.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub assembly: AssemblyArgs,

    /// SQLite database file (created when missing).
    #[arg(long = "database", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Reconcile and report without writing to the database.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Write the load summary as JSON.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct AssembleArgs {
    #[command(flatten)]
    pub assembly: AssemblyArgs,

    /// Output directory for the entity CSV files (default: <INPUT_DIR>/omop).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct VocabArgs {
    /// Vocabulary directory (default: the configured one).
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            vocabulary_dir: self.assembly.vocabulary_dir.clone(),
            database: self.database.clone(),
            strict: self.assembly.strict,
            dry_run: self.dry_run,
            output_dir: None,
        }
    }
}

impl AssembleArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            vocabulary_dir: self.assembly.vocabulary_dir.clone(),
            strict: self.assembly.strict,
            output_dir: self.output_dir.clone(),
            ..ConfigOverrides::default()
        }
    }
}

impl VocabArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            vocabulary_dir: self.dir.clone(),
            ..ConfigOverrides::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_become_overrides() {
        let cli = Cli::parse_from([
            "ecg-omop",
            "run",
            "input",
            "--database",
            "cdm.sqlite",
            "--strict",
            "--dry-run",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.database, Some(PathBuf::from("cdm.sqlite")));
        assert!(overrides.strict);
        assert!(overrides.dry_run);
        assert_eq!(overrides.vocabulary_dir, None);
    }
}
