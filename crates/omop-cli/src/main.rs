//! ECG to OMOP CLI.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::{ColorChoice, Parser};
use omop_cli::commands::{
    error_kind, run_assemble, run_pipeline, run_vocab, table_keys, write_report,
};
use omop_cli::config::PipelineConfig;
use omop_cli::logging::{LogConfig, LogFormat, init_logging};
use omop_cli::summary::{
    print_assemble_summary, print_run_summary, print_tables, print_vocab_summary,
};
use tracing::level_filters::LevelFilter;

mod cli;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(()) => 0,
        Err(error) => {
            match error_kind(&error) {
                Some(kind) => eprintln!("error[{}]: {error:#}", kind.as_str()),
                None => eprintln!("error: {error:#}"),
            }
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Run(args) => {
            let config = config.with_overrides(&args.overrides());
            let summary = run_pipeline(&args.assembly.input_dir, &config)?;
            print_run_summary(&summary);
            if let Some(path) = &args.report {
                write_report(path, &summary)?;
            }
        }
        Command::Assemble(args) => {
            let config = config.with_overrides(&args.overrides());
            let summary = run_assemble(&args.assembly.input_dir, &config)?;
            print_assemble_summary(&summary);
        }
        Command::Vocab(args) => {
            let config = config.with_overrides(&args.overrides());
            let summary = run_vocab(&config.vocabulary_dir)?;
            print_vocab_summary(&summary);
        }
        Command::Tables => print_tables(&table_keys()),
    }
    Ok(())
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig::default()
        .with_level_filter(cli.verbosity.tracing_level_filter())
        .with_log_file(cli.log_file.clone())
        .with_log_data(cli.log_data);
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
