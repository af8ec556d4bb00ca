mod cli;
mod commands;
mod config;
mod stack;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::StackConfig;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Command::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "cumulo", &mut io::stdout());
        return Ok(());
    }

    let config = StackConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Synth(args) => {
            commands::synth::run(&ctx, &config, args.output.as_deref(), args.compact)
        }
        Command::Validate => commands::validate::run(&ctx, &config),
        Command::Graph(args) => commands::graph::run(&ctx, &config, args.format),
        Command::Completions { .. } => Ok(()),
    }
}
