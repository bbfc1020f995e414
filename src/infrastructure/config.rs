use crate::domain::models::DEFAULT_TIMEZONE;
use crate::domain::timer::{TimerPreset, default_presets};
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const APP_JSON: &str = "app.json";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;
const CONFIG_SCHEMA: u64 = 1;
const MAX_PRESET_MINUTES: u32 = 240;

const API_URL_KEYS: [&str; 2] = ["ADHD_HELPER_API_URL", "API_BASE_URL"];
const TIMEZONE_KEYS: [&str; 1] = ["ADHD_HELPER_TIMEZONE"];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreKind {
    #[default]
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    pub api_base_url: String,
    pub timezone: String,
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub token_store: TokenStoreKind,
    #[serde(default = "default_presets")]
    pub presets: Vec<TimerPreset>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            token_store: TokenStoreKind::Keyring,
            presets: default_presets(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.api_base_url.trim().is_empty() {
            return Err(InfraError::InvalidConfig("apiBaseUrl must not be empty".to_string()));
        }
        parse_timezone(&self.timezone)?;
        if self.poll_interval_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "pollIntervalSeconds must be at least 1".to_string(),
            ));
        }
        if self.presets.is_empty() {
            return Err(InfraError::InvalidConfig("presets must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for preset in &self.presets {
            if !(1..=MAX_PRESET_MINUTES).contains(&preset.duration_minutes) {
                return Err(InfraError::InvalidConfig(format!(
                    "preset {} must last between 1 and {MAX_PRESET_MINUTES} minutes",
                    preset.session_type
                )));
            }
            if !seen.insert(preset.session_type) {
                return Err(InfraError::InvalidConfig(format!(
                    "duplicate preset {}",
                    preset.session_type
                )));
            }
        }
        Ok(())
    }

    pub fn zone(&self) -> Tz {
        parse_timezone(&self.timezone).unwrap_or(Tz::UTC)
    }

    /// Environment values win over the file. Blank values are ignored.
    pub fn with_overrides_from_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_base_url) = optional_lookup_value(&lookup, &API_URL_KEYS) {
            self.api_base_url = api_base_url;
        }
        if let Some(timezone) = optional_lookup_value(&lookup, &TIMEZONE_KEYS) {
            self.timezone = timezone;
        }
        self
    }
}

fn parse_timezone(raw: &str) -> Result<Tz, InfraError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| InfraError::InvalidConfig(format!("unknown timezone: {}", raw.trim())))
}

fn default_files() -> Result<Vec<(&'static str, serde_json::Value)>, InfraError> {
    Ok(vec![(APP_JSON, serde_json::to_value(AppConfig::default())?)])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files()? {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != CONFIG_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw = read_config(&path)?;
    let config: AppConfig = serde_json::from_value(raw).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {}: {error}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_app_config_from_lookup<F>(config_dir: &Path, lookup: F) -> Result<AppConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = load_app_config(config_dir)?.with_overrides_from_lookup(lookup);
    config.validate()?;
    Ok(config)
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SessionType;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_written_once_and_load_back() {
        let dir = tempdir().expect("tempdir");
        ensure_default_configs(dir.path()).expect("write defaults");
        let loaded = load_app_config(dir.path()).expect("load");
        assert_eq!(loaded, AppConfig::default());
        assert_eq!(loaded.presets[0].session_type, SessionType::Pomodoro);

        fs::write(
            dir.path().join(APP_JSON),
            r#"{"schema":1,"apiBaseUrl":"https://api.example.com","timezone":"UTC","pollIntervalSeconds":10}"#,
        )
        .expect("overwrite");
        ensure_default_configs(dir.path()).expect("keeps existing file");
        let loaded = load_app_config(dir.path()).expect("load");
        assert_eq!(loaded.api_base_url, "https://api.example.com");
        assert_eq!(loaded.token_store, TokenStoreKind::Keyring);
        assert_eq!(loaded.presets, default_presets());
    }

    #[test]
    fn missing_or_unknown_schema_is_rejected() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(APP_JSON), r#"{"apiBaseUrl":"x"}"#).expect("write");
        assert!(matches!(load_app_config(dir.path()), Err(InfraError::InvalidConfig(_))));

        fs::write(dir.path().join(APP_JSON), r#"{"schema":2}"#).expect("write");
        let error = load_app_config(dir.path()).expect_err("schema 2");
        assert!(error.to_string().contains("unsupported schema 2"));
    }

    #[test]
    fn env_lookup_overrides_file_values() {
        let dir = tempdir().expect("tempdir");
        ensure_default_configs(dir.path()).expect("write defaults");
        let env = HashMap::from([
            ("API_BASE_URL", "https://fallback.example.com"),
            ("ADHD_HELPER_API_URL", "  "),
            ("ADHD_HELPER_TIMEZONE", "Europe/Berlin"),
        ]);
        let config = load_app_config_from_lookup(dir.path(), |key| {
            env.get(key).map(|value| (*value).to_string())
        })
        .expect("load");
        assert_eq!(config.api_base_url, "https://fallback.example.com");
        assert_eq!(config.zone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig {
            timezone: "Nowhere/Special".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        config.timezone = "UTC".to_string();
        config.poll_interval_seconds = 0;
        assert!(config.validate().is_err());

        config.poll_interval_seconds = 5;
        config.presets.push(TimerPreset::new(SessionType::Pomodoro, 50));
        assert!(config.validate().unwrap_err().to_string().contains("duplicate preset"));

        config.presets = vec![TimerPreset::new(SessionType::Custom, 0)];
        assert!(config.validate().is_err());
    }
}
