//! Configuration management for lexicond.
//!
//! Settings come from a TOML file (/etc/lexicon/config.toml, then
//! ./lexicon.toml) or defaults. Credentials never live in the file: they are
//! read from the environment, optionally seeded from a `.env` file.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// System config file path
pub const CONFIG_PATH: &str = "/etc/lexicon/config.toml";

/// Config file next to the working directory, for development
pub const LOCAL_CONFIG_PATH: &str = "lexicon.toml";

/// Acquisition loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Entries to accept per run
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Pause after an accepted or duplicate candidate
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,

    /// Pause after a generator, parse or store failure
    #[serde(default = "default_error_delay")]
    pub error_delay_ms: u64,
}

fn default_target_count() -> usize {
    5
}

fn default_step_delay() -> u64 {
    5_000
}

fn default_error_delay() -> u64 {
    15_000
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            step_delay_ms: default_step_delay(),
            error_delay_ms: default_error_delay(),
        }
    }
}

impl AcquisitionConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }
}

/// Generator (Gemini) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API base URL, without the model path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Per-request timeout in seconds
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_max_output_tokens() -> u32 {
    200
}

fn default_generator_timeout() -> u64 {
    30
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: None,
            timeout_secs: default_generator_timeout(),
        }
    }
}

/// Record store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. LEXICON_DB_PATH overrides it.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Default database location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lexicon")
            .join("words.db")
    }
}

/// Outbound mail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// Implicit-TLS port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_subject")]
    pub subject: String,

    /// Sender address, defaults to EMAIL_USER
    #[serde(default)]
    pub from: Option<String>,

    /// Recipient address, defaults to EMAIL_USER
    #[serde(default)]
    pub to: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_subject() -> String {
    "Your Daily Vocabulary".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            subject: default_subject(),
            from: None,
            to: None,
        }
    }
}

/// Daily trigger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression, 5-field or with seconds
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone the expression is evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Deadline for one pipeline run in seconds, 0 = unbounded
    #[serde(default)]
    pub run_timeout_secs: u64,
}

fn default_cron() -> String {
    "0 8 * * *".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            timezone: default_timezone(),
            run_timeout_secs: 0,
        }
    }
}

impl ScheduleConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load config from an explicit path, or the first standard location
    /// that parses, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        for path in [CONFIG_PATH, LOCAL_CONFIG_PATH] {
            let path = Path::new(path);
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring unreadable config {}: {:#}", path.display(), e),
            }
        }

        warn!("Config not found, using defaults");
        Ok(Config::default())
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Database file: environment override, then config, then default
    pub fn store_path(&self, secrets: &Secrets) -> PathBuf {
        secrets
            .db_path
            .clone()
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(StoreConfig::default_path)
    }
}

/// Credentials sourced from the environment
#[derive(Clone)]
pub struct Secrets {
    pub api_key: String,
    pub db_path: Option<PathBuf>,
    pub email_user: Option<String>,
    pub email_password: Option<String>,
}

impl Secrets {
    /// Read secrets from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read secrets through a lookup function (testable without touching
    /// the process environment)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or_else(|| anyhow!("GEMINI_API_KEY is not set"))?;

        Ok(Self {
            api_key,
            db_path: get("LEXICON_DB_PATH").map(PathBuf::from),
            email_user: get("EMAIL_USER"),
            email_password: get("EMAIL_PASSWORD"),
        })
    }

    /// Mail account credentials, required unless mail is disabled
    pub fn mail_credentials(&self) -> Result<(&str, &str)> {
        match (&self.email_user, &self.email_password) {
            (Some(user), Some(password)) => Ok((user.as_str(), password.as_str())),
            (None, _) => Err(anyhow!("EMAIL_USER is not set")),
            (_, None) => Err(anyhow!("EMAIL_PASSWORD is not set")),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &"<redacted>")
            .field("db_path", &self.db_path)
            .field("email_user", &self.email_user)
            .field("email_password", &self.email_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
