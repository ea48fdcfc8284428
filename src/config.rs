// Configuration loading and parsing (config/bot.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the token from the config file.
pub const TOKEN_ENV_VAR: &str = "TELEGRAM_BOT_TOKEN";

/// Default long-poll timeout passed to Telegram's getUpdates.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub db_path: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token, from bot.toml or the `TELEGRAM_BOT_TOKEN` env var
    /// (the env var wins).
    pub token: String,
    pub poll_timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// bot.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire bot.toml file.
#[derive(Debug, Clone, Deserialize)]
struct BotFile {
    telegram: TelegramSection,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
struct TelegramSection {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/bot.toml` relative to
/// `base_dir`, resolving the token against the process environment.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let bot_path = base_dir.join("config").join("bot.toml");
    let bot_text = read_file(&bot_path)?;
    let bot_file: BotFile = toml::from_str(&bot_text).map_err(|e| ConfigError::ParseError {
        path: bot_path.clone(),
        source: e,
    })?;

    let token = resolve_token(bot_file.telegram.token, std::env::var(TOKEN_ENV_VAR).ok());

    let config = Config {
        telegram: TelegramConfig {
            token: token.unwrap_or_default(),
            poll_timeout_secs: bot_file
                .telegram
                .poll_timeout_secs
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
        },
        db_path: bot_file.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working
/// directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

/// The env var takes precedence over the file token; empty strings count
/// as absent.
fn resolve_token(file_token: Option<String>, env_token: Option<String>) -> Option<String> {
    env_token
        .filter(|t| !t.trim().is_empty())
        .or(file_token.filter(|t| !t.trim().is_empty()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.telegram.token.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "telegram.token".into(),
            message: format!("must be set in bot.toml or via {TOKEN_ENV_VAR}"),
        });
    }

    let timeout = config.telegram.poll_timeout_secs;
    if timeout == 0 || timeout > 300 {
        return Err(ConfigError::ValidationError {
            field: "telegram.poll_timeout_secs".into(),
            message: format!("must be between 1 and 300, got {timeout}"),
        });
    }

    if config.db_path.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
