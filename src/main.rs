mod agent;
mod analysis;
mod collision;
mod config;
mod manager;
mod mask;
mod network;
mod obstacle;
mod population;
mod simulation;
mod stats;
mod trainer;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create,

    Resume {
        #[arg(long)]
        run_idx: usize,
    },

    Analyze,

    Replay {
        #[arg(long)]
        run_idx: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create => mgr.run_training(None)?,
        Command::Resume { run_idx } => mgr.run_training(Some(run_idx))?,
        Command::Analyze => mgr.run_analysis()?,
        Command::Replay { run_idx, seed } => mgr.run_replay(run_idx, seed)?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
