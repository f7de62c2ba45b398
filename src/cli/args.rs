use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetbridge")]
#[command(about = "Meeting detection and recording bridge for Google Meet", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Drive an in-memory meeting tab through a scripted scenario
    Simulate(SimulateCliArgs),
    /// Print the effective configuration
    Config(ConfigCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct SimulateCliArgs {
    /// Scenario file (TOML) with the steps to run
    pub script: PathBuf,
    /// Use this config file instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct ConfigCliArgs {
    /// Read this config file instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Also print where the config file lives
    #[arg(long)]
    pub path: bool,
}
