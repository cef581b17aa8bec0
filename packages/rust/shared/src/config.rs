//! Application configuration for prospectclean.
//!
//! User config lives at `~/.prospectclean/prospectclean.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProspectCleanError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospectclean.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospectclean";

// ---------------------------------------------------------------------------
// Config structs (matching prospectclean.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Runtime defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Reasoning service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Input column names.
    #[serde(default)]
    pub columns: ColumnsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Rows accumulated before each incremental save.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum rows in flight against the reasoning service.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_max_concurrency() -> usize {
    5
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model used for field validation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the chat-completions endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[columns]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Last name column.
    #[serde(default = "default_last_name_col")]
    pub last_name: String,

    /// First name column.
    #[serde(default = "default_first_name_col")]
    pub first_name: String,

    /// Company name column.
    #[serde(default = "default_company_col")]
    pub company: String,

    /// Email column (context only, never corrected).
    #[serde(default = "default_email_col")]
    pub email: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            last_name: default_last_name_col(),
            first_name: default_first_name_col(),
            company: default_company_col(),
            email: default_email_col(),
        }
    }
}

fn default_last_name_col() -> String {
    "nom".into()
}
fn default_first_name_col() -> String {
    "prenom".into()
}
fn default_company_col() -> String {
    "raison_sociale".into()
}
fn default_email_col() -> String {
    "email".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
///
/// Inner components receive only the values they need from here; nothing
/// reads the application config ad hoc.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum rows in flight against the reasoning service.
    pub max_concurrency: usize,
    /// Rows accumulated before each incremental save.
    pub batch_size: usize,
    /// Input column names.
    pub columns: ColumnsConfig,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.defaults.max_concurrency,
            batch_size: config.defaults.batch_size,
            columns: config.columns.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospectclean/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectCleanError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospectclean/prospectclean.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProspectCleanError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProspectCleanError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectCleanError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectCleanError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectCleanError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the reasoning-service API key env var is set and non-empty,
/// then return the key.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ProspectCleanError::config(format!(
            "reasoning service API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("batch_size"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("raison_sociale"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.batch_size, 10);
        assert_eq!(parsed.defaults.max_concurrency, 5);
        assert_eq!(parsed.openai.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn config_with_overrides() {
        let toml_str = r#"
[defaults]
batch_size = 25

[columns]
last_name = "surname"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.batch_size, 25);
        assert_eq!(config.defaults.max_concurrency, 5);
        assert_eq!(config.columns.last_name, "surname");
        assert_eq!(config.columns.first_name, "prenom");
    }

    #[test]
    fn run_config_from_app_config() {
        let app = AppConfig::default();
        let run = RunConfig::from(&app);
        assert_eq!(run.max_concurrency, 5);
        assert_eq!(run.batch_size, 10);
        assert_eq!(run.columns.company, "raison_sociale");
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openai.api_key_env = "PC_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
