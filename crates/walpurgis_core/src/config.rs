//! Bot configuration.
//!
//! Loaded from TOML, then overridden field by field from the environment.
//! Discord credentials are not part of this file; the gateway crate reads them
//! from the environment on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialogue::Persona;
use crate::error::{ArchiveError, ConfigError, CoreResult};

/// Runtime settings for the archive bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    /// The one user whose posts are archived automatically
    pub submitter_id: u64,

    /// Channel for reminders and announcements
    pub default_channel_id: u64,

    /// IANA timezone name used for archive timestamps and reminders
    pub timezone: String,

    pub database_path: PathBuf,

    pub cooldown_hours: i64,

    /// How long to wait for the submitter to answer a prompt
    pub reply_timeout_secs: u64,

    /// How long to wait for a yes/no on destructive commands
    pub confirm_timeout_secs: u64,

    pub persona: Persona,

    /// Local hour (0-23) for the daily reminder
    pub reminder_hour: u32,

    /// Days per page in status reports
    pub status_page_size: usize,

    /// Required for backup scans; scans are refused while unset
    pub backup_password: Option<String>,

    /// Users allowed to run administrative commands
    pub admin_users: Vec<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            submitter_id: 0,
            default_channel_id: 0,
            timezone: "America/Chicago".to_string(),
            database_path: default_database_path(),
            cooldown_hours: 12,
            reply_timeout_secs: 60,
            confirm_timeout_secs: 30,
            persona: Persona::default(),
            reminder_hour: 16,
            status_page_size: 20,
            backup_password: None,
            admin_users: Vec::new(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("walpurgis")
        .join("daily_johans.db")
}

impl BotConfig {
    /// Configured timezone, falling back to UTC when the name is unknown.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            warn!("Unknown timezone '{}', using UTC", self.timezone);
            Tz::UTC
        })
    }

    pub fn cooldown(&self) -> TimeDelta {
        TimeDelta::hours(self.cooldown_hours)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        user_id == self.submitter_id || self.admin_users.contains(&user_id)
    }

    /// Apply `JOHAN_USER_ID`, `DEFAULT_CHANNEL_ID`, `TIMEZONE`, `WALPURGIS_DB`,
    /// `BACKUP_PASSWORD` and `WALPURGIS_PERSONA` when set.
    pub fn apply_env_overrides(mut self) -> CoreResult<Self> {
        if let Some(value) = env_var("JOHAN_USER_ID") {
            self.submitter_id = parse_id("JOHAN_USER_ID", &value)?;
        }
        if let Some(value) = env_var("DEFAULT_CHANNEL_ID") {
            self.default_channel_id = parse_id("DEFAULT_CHANNEL_ID", &value)?;
        }
        if let Some(value) = env_var("TIMEZONE") {
            self.timezone = value;
        }
        if let Some(value) = env_var("WALPURGIS_DB") {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = env_var("BACKUP_PASSWORD") {
            self.backup_password = Some(value);
        }
        if let Some(value) = env_var("WALPURGIS_PERSONA") {
            self.persona = value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "persona".to_string(),
                reason: format!("unknown persona '{}'", value),
            })?;
        }
        Ok(self)
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.cooldown_hours < 0 {
            return Err(invalid("cooldown_hours", "must not be negative"));
        }
        if self.reminder_hour > 23 {
            return Err(invalid("reminder_hour", "must be between 0 and 23"));
        }
        if self.status_page_size == 0 {
            return Err(invalid("status_page_size", "must be at least 1"));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_id(field: &str, value: &str) -> CoreResult<u64> {
    value.trim().parse().map_err(|_| {
        invalid(field, &format!("'{}' is not a numeric id", value))
    })
}

fn invalid(field: &str, reason: &str) -> ArchiveError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> CoreResult<BotConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

    let config: BotConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::TomlParse(format!("{}: {}", path.display(), e)))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Standard config file locations
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("walpurgis.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("walpurgis").join("config.toml"));
    }

    paths
}

/// Load configuration from standard locations
pub async fn load_config_from_standard_locations() -> CoreResult<BotConfig> {
    for path in config_paths() {
        if path.exists() {
            return load_config(&path).await;
        }
    }

    // No config found, return default
    Ok(BotConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
submitter_id = 1234
timezone = "Europe/Berlin"
persona = "gentleman"
admin_users = [42]
"#
        )
        .unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.submitter_id, 1234);
        assert_eq!(config.tz(), chrono_tz::Europe::Berlin);
        assert_eq!(config.persona, Persona::Gentleman);
        assert_eq!(config.cooldown_hours, 12);
        assert_eq!(config.reply_timeout_secs, 60);
        assert!(config.is_admin(42));
        assert!(config.is_admin(1234));
        assert!(!config.is_admin(7));
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "submitter_id = [").unwrap();

        let err = load_config(file.path()).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Config(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let config = BotConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tz(), Tz::UTC);
    }

    #[test]
    fn test_validate_rejects_bad_reminder_hour() {
        let config = BotConfig {
            reminder_hour: 24,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
