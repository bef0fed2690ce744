use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{EtlError, Result};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub browser: BrowserSettings,
    pub transfer: TransferSettings,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    pub headless: bool,
    #[serde(with = "humantime_serde")]
    pub navigation_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub settle_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(30),
            settle_timeout: Duration::from_secs(10),
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSettings {
    #[serde(with = "humantime_serde")]
    pub webhook_timeout: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            webhook_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// `$CONFIG_DIR/etl/config.toml`, if a config dir exists on this platform.
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("etl").join("config.toml"))
    }

    /// Load config from an explicit path, the central config, or defaults,
    /// then apply `ETL_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::central_config_path().filter(|p| p.exists()) {
                Some(central) => Self::from_file(&central)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| EtlError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ETL_HEADLESS") {
            self.browser.headless = parse_bool(&raw).ok_or_else(|| {
                EtlError::Config(format!("ETL_HEADLESS must be a boolean, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup("ETL_NAVIGATION_TIMEOUT") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                EtlError::Config(format!(
                    "ETL_NAVIGATION_TIMEOUT must be milliseconds, got '{raw}'"
                ))
            })?;
            self.browser.navigation_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("ETL_LOG_LEVEL") {
            self.logging.level = raw.trim().to_ascii_lowercase();
        }
        if let Some(raw) = lookup("ETL_CHROME_EXECUTABLE") {
            if !raw.trim().is_empty() {
                self.browser.chrome_executable = Some(PathBuf::from(raw.trim()));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.browser.navigation_timeout.is_zero() {
            return Err(EtlError::Config(
                "browser.navigation_timeout must be greater than zero".into(),
            ));
        }
        if self.browser.settle_timeout.is_zero() {
            return Err(EtlError::Config(
                "browser.settle_timeout must be greater than zero".into(),
            ));
        }
        if self.transfer.webhook_timeout.is_zero() {
            return Err(EtlError::Config(
                "transfer.webhook_timeout must be greater than zero".into(),
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(EtlError::Config(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_values_match_expected() {
        let cfg = Config::default();

        assert!(cfg.browser.headless);
        assert_eq!(cfg.browser.navigation_timeout, Duration::from_secs(30));
        assert_eq!(cfg.browser.settle_timeout, Duration::from_secs(10));
        assert!(cfg.browser.chrome_executable.is_none());
        assert_eq!(cfg.transfer.webhook_timeout, Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_humantime_durations_from_toml() {
        let cfg = Config::from_toml(
            r#"
            [browser]
            headless = false
            navigation_timeout = "45s"
            settle_timeout = "500ms"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert!(!cfg.browser.headless);
        assert_eq!(cfg.browser.navigation_timeout, Duration::from_secs(45));
        assert_eq!(cfg.browser.settle_timeout, Duration::from_millis(500));
        assert_eq!(cfg.transfer.webhook_timeout, Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(Config::from_toml("[browser]\nheadles = true\n").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("ETL_HEADLESS", "false"),
            ("ETL_NAVIGATION_TIMEOUT", "15000"),
            ("ETL_LOG_LEVEL", "WARN"),
            ("ETL_CHROME_EXECUTABLE", "/opt/chrome/chrome"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(!cfg.browser.headless);
        assert_eq!(cfg.browser.navigation_timeout, Duration::from_secs(15));
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(
            cfg.browser.chrome_executable,
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
    }

    #[test]
    fn env_override_rejects_garbage() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env(|key| (key == "ETL_HEADLESS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn validate_rejects_zero_timeouts_and_bad_levels() {
        let mut cfg = Config::default();
        cfg.browser.navigation_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_file_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[browser]\nnavigation_timeout = 12\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
