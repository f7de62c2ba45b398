use anyhow::Result;
use clap::Parser;
use meetbridge::cli::{handle_config_command, handle_simulate_command, Cli, CliCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        CliCommand::Version => {
            println!("meetbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Config(args) => handle_config_command(args),
        CliCommand::Simulate(args) => handle_simulate_command(args).await,
    }
}
