// src/config.rs

//! Configuration loading utilities.
//!
//! Resolution order: built-in defaults, then the TOML file (when present),
//! then environment variables. A `.env` file in the working directory is
//! loaded into the environment first.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "data/config.toml";

/// Load `.env` into the process environment if one exists.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring unreadable .env file: {e}"),
    }
}

/// Load configuration from `path` and the environment.
///
/// A missing file means defaults; a file that exists but does not parse is
/// an error.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit variable lookup.
pub fn load_config_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    let mut config = if path.exists() {
        let config = Config::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        config
    } else {
        log::info!("No configuration file at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env_from(lookup);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_with(tmp.path().join("absent.toml"), no_env).unwrap();
        assert_eq!(config.state.capacity, 2000);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[search\nkeywords = ").unwrap();

        let err = load_config_with(&path, no_env).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_env_overrides_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[search]\nkeywords = [\"Rust\"]\nlocation = \"Sydney NSW\"\n",
        )
        .unwrap();

        let config = load_config_with(&path, |key| {
            (key == "SEARCH_LOCATION").then(|| "Hobart TAS".to_string())
        })
        .unwrap();

        assert_eq!(config.search.keywords, vec!["Rust"]);
        assert_eq!(config.search.location, "Hobart TAS");
    }
}
