use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use fedidir_artifacts::PublishMode;

/// Overrides `[filter] max_age_secs`.
pub const MAX_AGE_ENV: &str = "FEDIDIR_MAX_AGE_SECS";

pub const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub storage: StorageConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// SQLite mirror of the crawl store. Relative paths resolve against the
    /// config file's directory.
    pub db_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub dir: String,
    #[serde(default)]
    pub publish: PublishMode,
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_max_age_secs() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { max_age_secs: DEFAULT_MAX_AGE_SECS }
    }
}

impl Config {
    pub fn default_for_dir() -> Self {
        Self {
            storage: StorageConfig { db_path: "data/crawl.db".to_string() },
            output: OutputConfig {
                dir: "public".to_string(),
                publish: PublishMode::Staged,
                pretty: false,
            },
            filter: FilterConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Applies `FEDIDIR_MAX_AGE_SECS` when set.
    pub fn with_env_overrides(self) -> Result<Self> {
        let value = std::env::var(MAX_AGE_ENV).ok();
        self.with_max_age_override(value.as_deref())
    }

    pub fn with_max_age_override(mut self, value: Option<&str>) -> Result<Self> {
        if let Some(v) = value {
            self.filter.max_age_secs = v
                .trim()
                .parse()
                .with_context(|| {
                    format!("{} must be a whole number of seconds, got {:?}", MAX_AGE_ENV, v)
                })?;
        }
        Ok(self)
    }

    pub fn max_age_ms(&self) -> i64 {
        i64::try_from(self.filter.max_age_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    pub fn db_path(&self, base: &Path) -> PathBuf {
        resolve(base, &self.storage.db_path)
    }

    pub fn output_dir(&self, base: &Path) -> PathBuf {
        resolve(base, &self.output.dir)
    }

    pub fn default_path(cwd: &Path) -> PathBuf {
        cwd.join("fedidir.toml")
    }
}

fn resolve(base: &Path, p: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(p).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
