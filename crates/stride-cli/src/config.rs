//! Configuration file management for stride.
//!
//! Provides a TOML-based config file at `~/.config/stride/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stride_core::generator::GeneratorConfig;
use stride_db::config::DbConfig;

/// Default number of concurrent generation jobs.
pub const DEFAULT_WORKERS: usize = 2;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub worker: WorkerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerSection {
    pub concurrency: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_WORKERS,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the stride config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/stride` or `~/.config/stride`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("stride");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("stride")
}

/// Return the path to the stride config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since it may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct StrideConfig {
    pub db_config: DbConfig,
    pub generator: GeneratorConfig,
    pub workers: usize,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl StrideConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `STRIDE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - API key: `ANTHROPIC_API_KEY` > `CLAUDE_API_KEY` > `generation.api_key` > unset
    /// - Model: `STRIDE_MODEL` > `generation.model` > `GeneratorConfig::DEFAULT_MODEL`
    ///
    /// A missing API key is not an error here; generation jobs fail with a
    /// "not configured" message instead.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();
        let generation = file_config.as_ref().map(|c| &c.generation);

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Some(url) = env_nonempty("STRIDE_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let defaults = GeneratorConfig::default();
        let api_key = env_nonempty("ANTHROPIC_API_KEY")
            .or_else(|| env_nonempty("CLAUDE_API_KEY"))
            .or_else(|| generation.and_then(|g| g.api_key.clone()));
        if api_key.is_none() {
            tracing::warn!("no generation API key configured; plan generation will fail");
        }
        let model = env_nonempty("STRIDE_MODEL")
            .or_else(|| generation.and_then(|g| g.model.clone()))
            .unwrap_or(defaults.model);
        let base_url = generation
            .and_then(|g| g.base_url.clone())
            .unwrap_or(defaults.base_url);
        let max_tokens = generation
            .and_then(|g| g.max_tokens)
            .unwrap_or(defaults.max_tokens);

        let workers = file_config
            .as_ref()
            .map(|c| c.worker.concurrency)
            .unwrap_or(DEFAULT_WORKERS)
            .max(1);
        // The API server and the workers share one pool.
        let db_config = DbConfig::new(db_url)
            .with_max_connections(DbConfig::DEFAULT_MAX_CONNECTIONS.max(workers as u32 + 4));

        Ok(Self {
            db_config,
            generator: GeneratorConfig {
                api_key,
                model,
                base_url,
                max_tokens,
            },
            workers,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
