use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Values passed on the command line; highest precedence
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub bind_addr: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Builds the effective configuration.
///
/// Layers, lowest to highest: defaults, JSON file, environment, CLI flags.
pub fn load_config(overrides: &CliOverrides) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: config file (~/.solvemate/config.json unless --config is given)
    let config_file = overrides.config_path.clone().or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = read_config_file(path)?;
        } else if overrides.config_path.is_some() {
            // An explicit path that does not exist is a user error
            return Err(ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))
            .into());
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment variables
    tracing::debug!("Applying environment variable overrides");
    config = merge_env_variables(config);

    // Layer 3: CLI flags
    apply_cli_overrides(&mut config, overrides);

    config
        .validate()
        .map_err(ConfigError::Invalid)
        .context("Configuration rejected")?;

    let summary = config.get_safe_summary();
    tracing::debug!(
        api_key_configured = summary.api_key_configured,
        model = %summary.model,
        session_ttl_secs = summary.session_ttl_secs,
        bind_addr = %summary.bind_addr,
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn apply_cli_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(ref model) = overrides.model {
        tracing::debug!(model = %model, "Applying CLI model override");
        config.model = model.clone();
    }
    if let Some(ref bind) = overrides.bind_addr {
        tracing::debug!(bind_addr = %bind, "Applying CLI bind address override");
        config.bind_addr = bind.clone();
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".solvemate").join("config.json"))
}

fn read_config_file(path: &Path) -> Result<Config> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)
            .context("Failed to read metadata for config file")?
            .permissions()
            .mode()
            & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                "Config file {:?} has permissions {:o}; it may contain an API key, consider 0600",
                path,
                mode
            );
        }
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;
    Ok(config)
}

fn merge_env_variables(config: Config) -> Config {
    merge_env_from(config, |key| std::env::var(key).ok())
}

/// Applies environment overrides read through `lookup`. Empty values are ignored.
pub(crate) fn merge_env_from<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("GROQ_API_KEY") {
        config.groq_api_key = Some(key);
    }
    if let Some(url) = get("GROQ_API_URL") {
        config.api_url = url;
    }
    if let Some(model) = get("SOLVEMATE_MODEL") {
        config.model = model;
    }
    if let Some(bind) = get("SOLVEMATE_BIND_ADDR") {
        config.bind_addr = bind;
    }
    if let Some(raw) = get("SESSION_TTL_SECONDS") {
        match raw.trim().parse::<u64>() {
            Ok(secs) => config.session_ttl_secs = secs,
            Err(e) => tracing::warn!(
                value = %raw,
                error = %e,
                "Ignoring SESSION_TTL_SECONDS, not a whole number of seconds"
            ),
        }
    }

    config
}
