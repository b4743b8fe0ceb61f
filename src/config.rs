//! Layered configuration. Precedence: CLI > env > config files > defaults.

use crate::errors::RunnerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";
pub const APP_NAME: &str = "plp-bookstore";
pub const CONFIG_FILE_NAME: &str = "plp-bookstore.toml";

pub const ENV_CONFIG: &str = "PLP_BOOKSTORE_CONFIG";
pub const ENV_URI: &str = "PLP_BOOKSTORE_URI";
pub const ENV_DB: &str = "PLP_BOOKSTORE_DB";
pub const ENV_COLLECTION: &str = "PLP_BOOKSTORE_COLLECTION";
pub const ENV_LOG_LEVEL: &str = "PLP_BOOKSTORE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PLP_BOOKSTORE_LOG_DIR";
pub const ENV_SERVER_SELECTION_TIMEOUT_MS: &str = "PLP_BOOKSTORE_SERVER_SELECTION_TIMEOUT_MS";
pub const ENV_DEV6: &str = "PLP_BOOKSTORE_DEV6";

/// One configuration layer; unset keys fall through to the next layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub server_selection_timeout_ms: Option<u64>,
    pub dev6: Option<bool>,
}

impl AppConfig {
    /// Keeps keys already set here and fills the rest from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            uri: self.uri.or(lower.uri),
            database: self.database.or(lower.database),
            collection: self.collection.or(lower.collection),
            log_level: self.log_level.or(lower.log_level),
            log_dir: self.log_dir.or(lower.log_dir),
            server_selection_timeout_ms: self
                .server_selection_timeout_ms
                .or(lower.server_selection_timeout_ms),
            dev6: self.dev6.or(lower.dev6),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub server_selection_timeout_ms: Option<u64>,
    pub dev6: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_layer(AppConfig::default())
    }
}

impl Settings {
    #[must_use]
    pub fn from_layer(cfg: AppConfig) -> Self {
        Self {
            uri: cfg.uri.unwrap_or_else(|| DEFAULT_URI.to_string()),
            database: cfg.database.unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            collection: cfg.collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            log_level: cfg.log_level.unwrap_or_else(|| "info".to_string()),
            log_dir: cfg.log_dir,
            server_selection_timeout_ms: cfg.server_selection_timeout_ms,
            dev6: cfg.dev6.unwrap_or(false),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        crate::types::namespace(&self.database, &self.collection)
    }
}

/// Candidate config files, highest priority first.
pub fn config_paths(cli_cfg: Option<&Path>, env: &impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env(ENV_CONFIG) {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Merges every existing file in `paths`; an earlier file wins per key.
///
/// # Errors
/// Returns `RunnerError::Config` when an existing file cannot be read or parsed.
pub fn load_file_layer(paths: &[PathBuf]) -> Result<AppConfig, RunnerError> {
    let mut cfg = AppConfig::default();
    for p in paths.iter().filter(|p| p.exists()) {
        let s = std::fs::read_to_string(p)
            .map_err(|e| RunnerError::Config(format!("{}: {e}", p.display())))?;
        let file_cfg = toml::from_str::<AppConfig>(&s)
            .map_err(|e| RunnerError::Config(format!("{}: {e}", p.display())))?;
        log::debug!("loaded config file {}", p.display());
        cfg = cfg.or(file_cfg);
    }
    Ok(cfg)
}

/// Reads the `PLP_BOOKSTORE_*` variables through `env`.
///
/// # Errors
/// Returns `RunnerError::Config` when a numeric or boolean variable does not parse.
pub fn env_layer(env: &impl Fn(&str) -> Option<String>) -> Result<AppConfig, RunnerError> {
    let timeout = match env(ENV_SERVER_SELECTION_TIMEOUT_MS) {
        Some(s) => Some(s.trim().parse::<u64>().map_err(|e| {
            RunnerError::Config(format!("{ENV_SERVER_SELECTION_TIMEOUT_MS}={s}: {e}"))
        })?),
        None => None,
    };
    let dev6 = match env(ENV_DEV6) {
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => return Err(RunnerError::Config(format!("{ENV_DEV6}={s}: expected a boolean"))),
        },
        None => None,
    };
    Ok(AppConfig {
        uri: env(ENV_URI),
        database: env(ENV_DB),
        collection: env(ENV_COLLECTION),
        log_level: env(ENV_LOG_LEVEL),
        log_dir: env(ENV_LOG_DIR).map(PathBuf::from),
        server_selection_timeout_ms: timeout,
        dev6,
    })
}

/// Resolves settings from the CLI layer, an environment lookup and the config files.
///
/// # Errors
/// Propagates config file and environment parse errors.
pub fn resolve_with(
    cli_cfg: Option<&Path>,
    cli: AppConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, RunnerError> {
    if let Some(p) = cli_cfg
        && !p.exists()
    {
        return Err(RunnerError::Config(format!("config file not found: {}", p.display())));
    }
    let env_cfg = env_layer(&env)?;
    let file_cfg = load_file_layer(&config_paths(cli_cfg, &env))?;
    let settings = Settings::from_layer(cli.or(env_cfg).or(file_cfg));
    if settings.database.is_empty() || settings.collection.is_empty() {
        return Err(RunnerError::Config("database and collection names must not be empty".into()));
    }
    Ok(settings)
}

/// [`resolve_with`] over the process environment.
///
/// # Errors
/// Propagates config file and environment parse errors.
pub fn resolve(cli_cfg: Option<&Path>, cli: AppConfig) -> Result<Settings, RunnerError> {
    resolve_with(cli_cfg, cli, |k| std::env::var(k).ok())
}

/// Masks the password in a connection string before it is logged or printed.
#[must_use]
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return uri.to_string();
    };
    match rest[..at].split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{}", &rest[at + 1..]),
        None => uri.to_string(),
    }
}
