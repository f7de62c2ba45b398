//! Where meetbridge keeps its files.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

const APP_DIR: &str = "meetbridge";
const CONFIG_FILE: &str = "config.toml";

/// Points at a config file to use instead of the per-user one.
pub const CONFIG_ENV: &str = "MEETBRIDGE_CONFIG";

/// The config file in effect: `$MEETBRIDGE_CONFIG` when set, otherwise
/// `config.toml` in the per-user config directory.
pub fn config_file() -> Result<PathBuf> {
    resolve_config_file(std::env::var_os(CONFIG_ENV), dirs::config_dir())
}

fn resolve_config_file(
    env_override: Option<OsString>,
    user_config_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = env_override {
        if path.is_empty() {
            bail!("{} is set but empty", CONFIG_ENV);
        }
        debug!("Using config file from {}", CONFIG_ENV);
        return Ok(PathBuf::from(path));
    }

    let dir = user_config_dir.context("Unable to determine config directory")?;
    Ok(dir.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lives_under_user_config_dir() {
        let path = resolve_config_file(None, Some(PathBuf::from("/home/ada/.config"))).unwrap();
        assert_eq!(path, PathBuf::from("/home/ada/.config/meetbridge/config.toml"));
    }

    #[test]
    fn test_env_override_wins() {
        let path = resolve_config_file(
            Some(OsString::from("/tmp/bridge.toml")),
            Some(PathBuf::from("/home/ada/.config")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/bridge.toml"));
    }

    #[test]
    fn test_empty_override_is_rejected() {
        let err = resolve_config_file(Some(OsString::new()), None).unwrap_err();
        assert!(err.to_string().contains(CONFIG_ENV));
    }

    #[test]
    fn test_missing_config_dir_is_an_error() {
        let err = resolve_config_file(None, None).unwrap_err();
        assert!(err.to_string().contains("config directory"));
    }
}
