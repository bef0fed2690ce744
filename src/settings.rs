use std::path::Path;

use etl_lib::{Config, EtlError};

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/etl/config.toml > defaults, then ETL_* env vars.
pub fn load_config(path: Option<&Path>) -> Result<Config, EtlError> {
    let cfg = Config::load(path)?;

    cfg.validate().map_err(|e| match e {
        EtlError::Config(msg) => EtlError::Config(
            path.map(|p| format!("Invalid config ({}): {}", p.display(), msg))
                .unwrap_or_else(|| format!("Invalid config: {}", msg)),
        ),
        other => other,
    })?;
    Ok(cfg)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .or_else(|| {
            Config::central_config_path()
                .filter(|p| p.exists())
                .map(|p| p.display().to_string())
        })
        .unwrap_or_else(|| "defaults".to_string());
    format!(
        "Effective config [{source}]: headless={}, navigation_timeout={}ms, settle_timeout={}ms, webhook_timeout={}ms, chrome={}, log_level={}, json_logs={}",
        config.browser.headless,
        config.browser.navigation_timeout.as_millis(),
        config.browser.settle_timeout.as_millis(),
        config.transfer.webhook_timeout.as_millis(),
        config
            .browser
            .chrome_executable
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "auto".to_string()),
        config.logging.level,
        config.logging.json,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn load_config_reads_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etl.toml");
        std::fs::write(
            &path,
            "[browser]\nnavigation_timeout = \"12s\"\n[transfer]\nwebhook_timeout = \"3s\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        if std::env::var("ETL_NAVIGATION_TIMEOUT").is_err() {
            assert_eq!(cfg.browser.navigation_timeout, Duration::from_secs(12));
        }
        assert_eq!(cfg.transfer.webhook_timeout, Duration::from_secs(3));
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etl.toml");
        std::fs::write(&path, "[transfer]\nwebhook_timeout = \"0s\"\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, EtlError::Config(ref msg) if msg.contains("Invalid config")));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn format_effective_config_includes_all_fields() {
        let summary = format_effective_config(&Config::default(), Some(Path::new("etl.toml")));
        assert!(summary.contains("etl.toml"));
        assert!(summary.contains("headless=true"));
        assert!(summary.contains("navigation_timeout=30000ms"));
        assert!(summary.contains("settle_timeout=10000ms"));
        assert!(summary.contains("webhook_timeout=30000ms"));
        assert!(summary.contains("chrome=auto"));
        assert!(summary.contains("log_level=info"));
    }
}
