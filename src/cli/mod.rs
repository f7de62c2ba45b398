use crate::config::Config;
use crate::global;
use anyhow::Result;

pub mod args;
pub mod simulate;

pub use args::{Cli, CliCommand, ConfigCliArgs, SimulateCliArgs};
pub use simulate::{handle_simulate_command, SimulationScript, Step};

pub fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

pub fn handle_config_command(args: ConfigCliArgs) -> Result<()> {
    if args.path {
        match &args.config {
            Some(path) => println!("# {}", path.display()),
            None => println!("# {}", global::config_file()?.display()),
        }
    }

    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}
