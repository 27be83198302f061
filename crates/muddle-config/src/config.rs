//! `.muddle/Config.toml` plus `MUDDLE_*` environment overrides.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

pub const CONFIG_FILE: &str = "Config.toml";

fn default_claim_timeout_ms() -> u64 {
    5_000
}

fn default_worker_count() -> Option<usize> {
    None
}

/// The comparison/diff style `stamp diff` uses by default (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampFormat {
    #[default]
    Unified,
    Context,
    Ndiff,
    Html,
}

impl StampFormat {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "unified" => Some(StampFormat::Unified),
            "context" => Some(StampFormat::Context),
            "ndiff" => Some(StampFormat::Ndiff),
            "html" => Some(StampFormat::Html),
            _ => None,
        }
    }
}

/// Layered scheduler/stamp configuration (§1.1, §3.1).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Worker thread count for the scheduler's parallel pool; `None`
    /// means "use available parallelism" (§4.4).
    #[serde(default = "default_worker_count")]
    pub worker_count: Option<usize>,

    /// How long a claim transaction may block waiting for the database's
    /// own lock before giving up (§5).
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_claim_timeout_ms_duration")]
    pub claim_timeout: Duration,

    #[serde(default)]
    pub default_roles: Vec<String>,

    #[serde(default)]
    pub default_deployments: Vec<String>,

    #[serde(default)]
    pub stamp_format: StampFormat,
}

fn default_claim_timeout_ms_duration() -> Duration {
    Duration::from_millis(default_claim_timeout_ms())
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker_count: default_worker_count(),
            claim_timeout: default_claim_timeout_ms_duration(),
            default_roles: Vec::new(),
            default_deployments: Vec::new(),
            stamp_format: StampFormat::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_path(root: &Path) -> std::path::PathBuf {
        root.join(".muddle").join(CONFIG_FILE)
    }

    /// Load `<root>/.muddle/Config.toml` if it exists (otherwise
    /// defaults), then apply `MUDDLE_*` environment overrides.
    pub fn load(root: &Path) -> Result<Config> {
        let path = Self::config_path(root);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("MUDDLE_WORKER_COUNT")
            && let Ok(count) = value.parse()
        {
            self.worker_count = Some(count);
        }
        if let Ok(value) = env::var("MUDDLE_CLAIM_TIMEOUT_MS")
            && let Ok(ms) = value.parse()
        {
            self.claim_timeout = Duration::from_millis(ms);
        }
        if let Ok(value) = env::var("MUDDLE_STAMP_FORMAT")
            && let Some(format) = StampFormat::parse(&value)
        {
            self.stamp_format = format;
        }
    }

    /// Merge this config with another (other takes precedence for any
    /// field it set to a non-default value).
    pub fn merge(&self, other: &Config) -> Config {
        Config {
            worker_count: other.worker_count.or(self.worker_count),
            claim_timeout: if other.claim_timeout != default_claim_timeout_ms_duration() {
                other.claim_timeout
            } else {
                self.claim_timeout
            },
            default_roles: if other.default_roles.is_empty() {
                self.default_roles.clone()
            } else {
                other.default_roles.clone()
            },
            default_deployments: if other.default_deployments.is_empty() {
                self.default_deployments.clone()
            } else {
                other.default_deployments.clone()
            },
            stamp_format: if other.stamp_format != StampFormat::default() {
                other.stamp_format
            } else {
                self.stamp_format
            },
        }
    }
}

impl Default for StampFormat {
    fn default() -> Self {
        StampFormat::Unified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_returns_defaults_when_file_missing() {
        let td = tempdir().unwrap();
        let config = Config::load(td.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_parses_toml_file() {
        let td = tempdir().unwrap();
        let dir = td.path().join(".muddle");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(CONFIG_FILE),
            "worker_count = 4\nclaim_timeout = 9000\ndefault_roles = [\"role_1\"]\n",
        )
        .unwrap();
        let config = Config::load(td.path()).unwrap();
        assert_eq!(config.worker_count, Some(4));
        assert_eq!(config.claim_timeout, Duration::from_millis(9000));
        assert_eq!(config.default_roles, vec!["role_1".to_string()]);
    }

    #[test]
    fn env_override_wins_over_file() {
        let td = tempdir().unwrap();
        temp_env::with_var("MUDDLE_WORKER_COUNT", Some("8"), || {
            let config = Config::load(td.path()).unwrap();
            assert_eq!(config.worker_count, Some(8));
        });
    }

    #[test]
    fn merge_prefers_other_nondefault_fields() {
        let base = Config::default();
        let mut override_cfg = Config::default();
        override_cfg.worker_count = Some(2);
        let merged = base.merge(&override_cfg);
        assert_eq!(merged.worker_count, Some(2));
        assert_eq!(merged.claim_timeout, base.claim_timeout);
    }
}
