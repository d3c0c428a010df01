//! Startup steps shared by both binaries.

use std::env;
use std::io::ErrorKind;

use crate::config::AppConfig;
use crate::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use crate::observability;

pub const CONFIG_ENV_VAR: &str = "STATIONAUTH_CONFIG";

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From STATIONAUTH_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (stationauth.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable ({CONFIG_ENV_VAR})"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: STATIONAUTH_CONFIG
/// 3. Default: stationauth.toml
pub fn resolve_config_path(
    args: impl IntoIterator<Item = String>,
    env_value: Option<String>,
) -> (String, ConfigSource) {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    if let Some(path) = env_value.filter(|p| !p.is_empty()) {
        return (path, ConfigSource::EnvironmentVariable);
    }

    (DEFAULT_CONFIG_FILE.to_string(), ConfigSource::Default)
}

/// Load `.env`, start tracing and load configuration. Exits with status 2 on
/// a configuration error.
pub fn load_or_exit() -> AppConfig {
    // .env is optional
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing();

    let (config_path, source) =
        resolve_config_path(env::args().skip(1), env::var(CONFIG_ENV_VAR).ok());

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cli_argument_wins() {
        let (path, source) = resolve_config_path(
            args(&["--config", "/etc/sa.toml"]),
            Some("/from/env.toml".into()),
        );
        assert_eq!(path, "/etc/sa.toml");
        assert_eq!(source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_env_then_default() {
        let (path, source) = resolve_config_path(args(&[]), Some("/from/env.toml".into()));
        assert_eq!(path, "/from/env.toml");
        assert_eq!(source, ConfigSource::EnvironmentVariable);

        let (path, source) = resolve_config_path(args(&["--config"]), Some(String::new()));
        assert_eq!(path, DEFAULT_CONFIG_FILE);
        assert_eq!(source, ConfigSource::Default);
    }
}
