use crate::backoff::{Backoff, ExponentialBackoff, WithMaxRetries};
use crate::http::{CurlTransport, Timeouts};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exponential backoff parameters (`[backoff]` in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First wait after a failure, in milliseconds.
    pub initial_interval_ms: u64,
    /// Growth factor between waits.
    pub multiplier: f64,
    /// Jitter: each wait is randomized within `interval * [1 - f, 1 + f]`.
    pub randomization_factor: f64,
    /// Upper bound on the interval, in seconds.
    pub max_interval_secs: u64,
    /// Give up once this many seconds passed since the last successful
    /// connection. 0 = never give up.
    pub max_elapsed_secs: u64,
    /// Optional cap on consecutive retries.
    pub max_retries: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval_secs: 60,
            max_elapsed_secs: 15 * 60,
            max_retries: None,
        }
    }
}

impl BackoffConfig {
    pub fn build(&self) -> Box<dyn Backoff> {
        let max_elapsed = match self.max_elapsed_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let exp = ExponentialBackoff::new(
            Duration::from_millis(self.initial_interval_ms),
            self.multiplier,
            Duration::from_secs(self.max_interval_secs),
            max_elapsed,
        )
        .with_randomization_factor(self.randomization_factor);
        match self.max_retries {
            Some(n) => Box::new(WithMaxRetries::new(exp, n)),
            None => Box::new(exp),
        }
    }
}

/// Connection deadlines in seconds (`[timeouts]` in config.toml). A missing
/// key leaves that deadline unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default)]
    pub dial_secs: Option<u64>,
    #[serde(default)]
    pub keep_alive_secs: Option<u64>,
    #[serde(default)]
    pub inactivity_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_secs: Some(30),
            keep_alive_secs: Some(30),
            inactivity_secs: Some(60),
        }
    }
}

impl TimeoutConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            dial: self.dial_secs.map(Duration::from_secs),
            keep_alive: self.keep_alive_secs.map(Duration::from_secs),
            inactivity: self.inactivity_secs.map(Duration::from_secs),
        }
    }

    pub fn transport(&self) -> CurlTransport {
        CurlTransport::new(self.timeouts())
    }
}

/// Global configuration loaded from `~/.config/httpretry/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRetryConfig {
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("httpretry")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HttpRetryConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HttpRetryConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<HttpRetryConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HttpRetryConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = HttpRetryConfig::default();
        assert_eq!(cfg.backoff.initial_interval_ms, 500);
        assert_eq!(cfg.backoff.max_interval_secs, 60);
        assert_eq!(cfg.backoff.max_elapsed_secs, 900);
        assert_eq!(cfg.timeouts.inactivity_secs, Some(60));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = HttpRetryConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: HttpRetryConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_sections() {
        let toml = r#"
            [backoff]
            initial_interval_ms = 100
            max_retries = 3

            [timeouts]
            dial_secs = 5
        "#;
        let cfg: HttpRetryConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.backoff.initial_interval_ms, 100);
        assert_eq!(cfg.backoff.max_retries, Some(3));
        assert_eq!(cfg.backoff.max_interval_secs, 60);
        assert_eq!(cfg.timeouts.dial_secs, Some(5));
        assert!(cfg.timeouts.inactivity_secs.is_none());
    }

    #[test]
    fn empty_file_is_default() {
        let cfg: HttpRetryConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, HttpRetryConfig::default());
    }

    #[test]
    fn built_backoff_honors_max_retries() {
        let cfg = BackoffConfig {
            initial_interval_ms: 1,
            randomization_factor: 0.0,
            max_retries: Some(2),
            ..BackoffConfig::default()
        };
        let mut b = cfg.build();
        assert_eq!(b.next_backoff(), Some(Duration::from_millis(1)));
        assert!(b.next_backoff().is_some());
        assert_eq!(b.next_backoff(), None);
        b.reset();
        assert_eq!(b.next_backoff(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn timeouts_map_to_transport() {
        let cfg = TimeoutConfig {
            dial_secs: Some(2),
            keep_alive_secs: None,
            inactivity_secs: Some(9),
        };
        let t = cfg.transport().timeouts();
        assert_eq!(t.dial, Some(Duration::from_secs(2)));
        assert_eq!(t.keep_alive, None);
        assert_eq!(t.inactivity, Some(Duration::from_secs(9)));
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[timeouts]\ninactivity_secs = 7\n").unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.timeouts.inactivity_secs, Some(7));
        assert!(load_from(&dir.path().join("missing.toml")).is_err());
    }
}
