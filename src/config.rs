use crate::error::{ExporterError, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REDIS_URI: &str = "redis://localhost:6379/0";
pub const DEFAULT_SCAN_COUNT: usize = 1_000_000;
pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_HTTP_PORT: u16 = 9124;
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Fully resolved exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub redis_uris: Vec<String>,
    pub scan_count: usize,
    pub sleep_interval: Duration,
    pub http_host: String,
    pub http_port: u16,
    pub command_timeout: Duration,
    /// Series not refreshed within this window stop being exported.
    pub metric_ttl: Option<Duration>,
}

/// Values given on the command line or through the environment.
/// These take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub redis_uris: Option<String>,
    pub scan_count: Option<usize>,
    pub sleep_interval: Option<Duration>,
    pub http_host: Option<String>,
    pub http_port: Option<u16>,
    pub command_timeout: Option<Duration>,
    pub metric_ttl: Option<Duration>,
}

/// Optional TOML configuration file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    redis_uris: Option<UriList>,
    #[serde(default)]
    scan_count: Option<usize>,
    #[serde(with = "humantime_serde", default)]
    sleep_interval: Option<Duration>,
    #[serde(default)]
    http_host: Option<String>,
    #[serde(default)]
    http_port: Option<u16>,
    #[serde(with = "humantime_serde", default)]
    command_timeout: Option<Duration>,
    #[serde(with = "humantime_serde", default)]
    metric_ttl: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UriList {
    Joined(String),
    List(Vec<String>),
}

impl UriList {
    fn into_uris(self) -> Vec<String> {
        match self {
            Self::Joined(s) => split_uris(&s),
            Self::List(list) => list
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Split a comma-separated URI list, dropping blank entries.
pub fn split_uris(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl Config {
    /// Resolve configuration: overrides, then the optional file, then defaults.
    pub fn load(path: Option<&str>, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => Self::read_file(path)?,
            None => FileConfig::default(),
        };

        let redis_uris = match overrides.redis_uris {
            Some(list) => split_uris(&list),
            None => file
                .redis_uris
                .map_or_else(|| vec![DEFAULT_REDIS_URI.to_string()], UriList::into_uris),
        };

        let config = Self {
            redis_uris,
            scan_count: overrides
                .scan_count
                .or(file.scan_count)
                .unwrap_or(DEFAULT_SCAN_COUNT),
            sleep_interval: overrides
                .sleep_interval
                .or(file.sleep_interval)
                .unwrap_or(DEFAULT_SLEEP_INTERVAL),
            http_host: overrides
                .http_host
                .or(file.http_host)
                .unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            http_port: overrides
                .http_port
                .or(file.http_port)
                .unwrap_or(DEFAULT_HTTP_PORT),
            command_timeout: overrides
                .command_timeout
                .or(file.command_timeout)
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            metric_ttl: overrides.metric_ttl.or(file.metric_ttl),
        };

        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &str) -> Result<FileConfig> {
        if !Path::new(path).exists() {
            return Err(ExporterError::Config(format!(
                "Configuration file not found: {path}"
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let content = substitute_env_vars(&content)?;

        toml::from_str(&content)
            .map_err(|e| ExporterError::Config(format!("TOML parse error: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_uris.is_empty() {
            return Err(ExporterError::Config(
                "At least one Redis URI must be configured".to_string(),
            ));
        }

        if self.scan_count == 0 {
            return Err(ExporterError::Config(
                "scan_count must be greater than zero".to_string(),
            ));
        }

        if self.sleep_interval.is_zero() {
            return Err(ExporterError::Config(
                "sleep_interval must be greater than zero".to_string(),
            ));
        }

        if self.command_timeout.is_zero() {
            return Err(ExporterError::Config(
                "command_timeout must be greater than zero".to_string(),
            ));
        }

        if self.metric_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(ExporterError::Config(
                "metric_ttl must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }
}

// Supports:
// - ${VAR} - replaced with env var value, empty string if not set
// - ${VAR:-default} - replaced with env var value, or "default" if not set
// - ${?VAR} - same as ${VAR}
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{\??([^}:-]+)(?::-([^}]*))?\}")?;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map_or("", |m| m.as_str());
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_values() {
        let config = Config::load(None, Overrides::default()).unwrap();
        assert_eq!(config.redis_uris, vec![DEFAULT_REDIS_URI.to_string()]);
        assert_eq!(config.scan_count, 1_000_000);
        assert_eq!(config.sleep_interval, Duration::from_secs(10));
        assert_eq!(config.http_port, 9124);
        assert_eq!(config.http_host, "0.0.0.0");
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.metric_ttl, None);
    }

    #[test]
    fn test_config_loads_from_file() {
        let file = write_config(
            r#"
redis_uris = ["redis://a:6379/0", "redis://b:6380/2"]
scan_count = 500
sleep_interval = "30s"
http_port = 9200
command_timeout = "2s"
metric_ttl = "5m"
"#,
        );

        let config = Config::load(file.path().to_str(), Overrides::default()).unwrap();
        assert_eq!(config.redis_uris.len(), 2);
        assert_eq!(config.redis_uris[1], "redis://b:6380/2");
        assert_eq!(config.scan_count, 500);
        assert_eq!(config.sleep_interval, Duration::from_secs(30));
        assert_eq!(config.http_port, 9200);
        assert_eq!(config.command_timeout, Duration::from_secs(2));
        assert_eq!(config.metric_ttl, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_file_accepts_comma_separated_uris() {
        let file = write_config(r#"redis_uris = "redis://a:6379/0, redis://b:6379/1,""#);

        let config = Config::load(file.path().to_str(), Overrides::default()).unwrap();
        assert_eq!(
            config.redis_uris,
            vec!["redis://a:6379/0".to_string(), "redis://b:6379/1".to_string()]
        );
    }

    #[test]
    fn test_overrides_take_precedence_over_file() {
        let file = write_config(
            r#"
redis_uris = "redis://file:6379/0"
scan_count = 500
http_port = 9200
"#,
        );

        let overrides = Overrides {
            redis_uris: Some("redis://cli:6379/0".to_string()),
            scan_count: Some(10),
            ..Overrides::default()
        };

        let config = Config::load(file.path().to_str(), overrides).unwrap();
        assert_eq!(config.redis_uris, vec!["redis://cli:6379/0".to_string()]);
        assert_eq!(config.scan_count, 10);
        // Not overridden, so the file value stays
        assert_eq!(config.http_port, 9200);
    }

    #[test]
    fn test_config_env_with_default() {
        // Ensure env var is NOT set
        unsafe { std::env::remove_var("TEST_RSE_NONEXISTENT_VAR") };

        let file = write_config(r#"redis_uris = "${TEST_RSE_NONEXISTENT_VAR:-redis://fallback:6379/0}""#);

        let config = Config::load(file.path().to_str(), Overrides::default()).unwrap();
        assert_eq!(config.redis_uris, vec!["redis://fallback:6379/0".to_string()]);
    }

    #[test]
    fn test_config_env_override_default() {
        unsafe { std::env::set_var("TEST_RSE_REDIS_HOST", "cache.internal") };

        let file = write_config(r#"redis_uris = "redis://${TEST_RSE_REDIS_HOST:-localhost}:6379/0""#);

        let config = Config::load(file.path().to_str(), Overrides::default()).unwrap();
        assert_eq!(config.redis_uris, vec!["redis://cache.internal:6379/0".to_string()]);

        unsafe { std::env::remove_var("TEST_RSE_REDIS_HOST") };
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::load(Some("/nonexistent/exporter.toml"), Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ExporterError::Config(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let file = write_config("scan_cuont = 10\n");
        let err = Config::load(file.path().to_str(), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_zero_scan_count_rejected() {
        let overrides = Overrides {
            scan_count: Some(0),
            ..Overrides::default()
        };
        let err = Config::load(None, overrides).unwrap_err();
        assert!(err.to_string().contains("scan_count"));
    }

    #[test]
    fn test_zero_sleep_interval_rejected() {
        let overrides = Overrides {
            sleep_interval: Some(Duration::ZERO),
            ..Overrides::default()
        };
        assert!(Config::load(None, overrides).is_err());
    }

    #[test]
    fn test_empty_uri_list_rejected() {
        let overrides = Overrides {
            redis_uris: Some(" , ".to_string()),
            ..Overrides::default()
        };
        let err = Config::load(None, overrides).unwrap_err();
        assert!(err.to_string().contains("At least one Redis URI"));
    }

    #[test]
    fn test_split_uris() {
        assert_eq!(
            split_uris("redis://a:1/0,redis://b:2/1"),
            vec!["redis://a:1/0".to_string(), "redis://b:2/1".to_string()]
        );
        assert!(split_uris("").is_empty());
    }
}
