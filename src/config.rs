//! Configuration loader and validator for the batch mailer.
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: u64 = 10;
pub const DEFAULT_MIN_DELAY_SECONDS: u64 = 20;
pub const DEFAULT_MAX_DELAY_SECONDS: u64 = 45;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub smtp: Smtp,
    pub campaign: Settings,
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub database_url: String,
    pub templates_dir: String,
    pub assets_dir: String,
    pub drafts_dir: String,
}

/// Outgoing SMTP relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Smtp {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
}

/// Per-run settings snapshot. Loaded once at the start of a run and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub send_time: Option<String>,
    #[serde(default)]
    pub template_male: String,
    #[serde(default)]
    pub template_female: String,
    #[serde(default, deserialize_with = "de_toggle")]
    pub use_inline_image: bool,
    #[serde(default)]
    pub image_folder_id: String,
    #[serde(default = "default_batch_size", deserialize_with = "de_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_min_delay", deserialize_with = "de_min_delay")]
    pub min_delay_seconds: u64,
    #[serde(default = "default_max_delay", deserialize_with = "de_max_delay")]
    pub max_delay_seconds: u64,
    #[serde(default, deserialize_with = "de_toggle")]
    pub use_attachment: bool,
    #[serde(default)]
    pub attachment_folder_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subject: String::new(),
            send_time: None,
            template_male: String::new(),
            template_female: String::new(),
            use_inline_image: false,
            image_folder_id: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            min_delay_seconds: DEFAULT_MIN_DELAY_SECONDS,
            max_delay_seconds: DEFAULT_MAX_DELAY_SECONDS,
            use_attachment: false,
            attachment_folder_id: String::new(),
        }
    }
}

impl Settings {
    /// Image folder, only when inline images are switched on and a folder is set.
    pub fn inline_image_folder(&self) -> Option<&str> {
        let folder = self.image_folder_id.trim();
        (self.use_inline_image && !folder.is_empty()).then_some(folder)
    }

    /// Attachment folder, only when attachments are switched on and a folder is set.
    pub fn shared_attachment_folder(&self) -> Option<&str> {
        let folder = self.attachment_folder_id.trim();
        (self.use_attachment && !folder.is_empty()).then_some(folder)
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Local>> {
        self.send_time.as_deref().and_then(parse_send_time)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.drafts_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.app.drafts_dir)
    }

    /// `DATABASE_URL` from the environment wins over the file.
    pub fn resolved_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.app.database_url.clone())
    }

    /// `SMTP_PASSWORD` from the environment wins over the file.
    pub fn resolved_smtp_password(&self) -> String {
        std::env::var("SMTP_PASSWORD").unwrap_or_else(|_| self.smtp.password.clone())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("app.database_url must be non-empty"));
    }
    if cfg.app.templates_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.templates_dir must be non-empty"));
    }
    if cfg.app.assets_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.assets_dir must be non-empty"));
    }
    if cfg.app.drafts_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.drafts_dir must be non-empty"));
    }

    if cfg.smtp.host.trim().is_empty() {
        return Err(ConfigError::Invalid("smtp.host must be non-empty"));
    }
    if cfg.smtp.port == 0 {
        return Err(ConfigError::Invalid("smtp.port must be > 0"));
    }
    if cfg.smtp.from.trim().is_empty() {
        return Err(ConfigError::Invalid("smtp.from must be non-empty"));
    }

    Ok(())
}

/// Parse the scheduled send time. Accepts RFC 3339, local
/// `YYYY-MM-DD HH:MM[:SS]` (space or `T` separator) and a bare local date.
pub fn parse_send_time(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    let normalized = raw.replacen(' ', "T", 1);
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

fn default_smtp_port() -> u16 {
    587
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

fn default_min_delay() -> u64 {
    DEFAULT_MIN_DELAY_SECONDS
}

fn default_max_delay() -> u64 {
    DEFAULT_MAX_DELAY_SECONDS
}

/// Positive whole number from a YAML scalar, else `default`. Zero counts as absent.
fn positive_or(value: &Value, default: u64) -> u64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() && n >= 1.0 => n.floor() as u64,
        _ => default,
    }
}

fn de_batch_size<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(positive_or(&Value::deserialize(d)?, DEFAULT_BATCH_SIZE))
}

fn de_min_delay<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(positive_or(&Value::deserialize(d)?, DEFAULT_MIN_DELAY_SECONDS))
}

fn de_max_delay<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(positive_or(&Value::deserialize(d)?, DEFAULT_MAX_DELAY_SECONDS))
}

/// YAML bool, or "yes"/"true" strings.
fn de_toggle<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true")
        }
        _ => false,
    })
}

/// Returns the sample configuration shipped with the binaries.
pub fn example() -> &'static str {
    r#"app:
  database_url: "sqlite://./data/mailer.db"
  templates_dir: "./templates"
  assets_dir: "./assets"
  drafts_dir: "./data/drafts"

smtp:
  host: "smtp.gmail.com"
  port: 587
  username: "sender@example.com"
  password: "APP_PASSWORD"
  from: "Admissions Office <sender@example.com>"

campaign:
  subject: "Welcome to the new academic year"
  send_time: "2025-09-01 08:00"
  template_male: "male.html"
  template_female: "female.html"
  use_inline_image: "yes"
  image_folder_id: "cards"
  batch_size: 10
  min_delay_seconds: 20
  max_delay_seconds: 45
  use_attachment: "no"
  attachment_folder_id: ""
"#
}
