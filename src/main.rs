mod cli;
mod commands;
mod config;
mod paths;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, InputArgs};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub settings: Option<PathBuf>,
    pub inputs: InputArgs,
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
        settings: cli.settings,
        inputs: cli.inputs,
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args.json),
        Command::Diff(args) => commands::diff::run(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Watch => commands::watch::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "linkd", &mut io::stdout());
            Ok(())
        }
    }
}
