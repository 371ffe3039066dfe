// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8017/v1";
pub const DEV_API_ROOT: &str = "http://localhost:8017";
pub const PRODUCTION_API_ROOT: &str = "https://api.movie.eziio.site";

pub const API_URL_ENV: &str = "MOVIEHUB_API_URL";
pub const BUILD_MODE_ENV: &str = "BUILD_MODE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// No timeout unless set; failures then come from the transport itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_categories_ttl")]
    pub categories_ttl_secs: u64,
    #[serde(default = "default_movies_ttl")]
    pub movies_ttl_secs: u64,
    #[serde(default = "default_series_ttl")]
    pub series_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Overrides the per-API session file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_agent() -> String {
    format!("moviehub/{}", env!("CARGO_PKG_VERSION"))
}

fn default_categories_ttl() -> u64 {
    10 * 60
}

fn default_movies_ttl() -> u64 {
    10 * 60
}

fn default_series_ttl() -> u64 {
    5 * 60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            categories_ttl_secs: default_categories_ttl(),
            movies_ttl_secs: default_movies_ttl(),
            series_ttl_secs: default_series_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn categories_ttl(&self) -> Duration {
        Duration::from_secs(self.categories_ttl_secs)
    }

    pub fn movies_ttl(&self) -> Duration {
        Duration::from_secs(self.movies_ttl_secs)
    }

    pub fn series_ttl(&self) -> Duration {
        Duration::from_secs(self.series_ttl_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Config {
        if !path.as_ref().exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Could not load config file, using defaults: {:#}", e);
            Self::default()
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("moviehub"))
    }

    pub fn ensure_config_dir() -> Result<PathBuf> {
        let dir = Self::config_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        Ok(dir)
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir()
            .map(|dir| dir.join("config.toml"))
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// Apply `MOVIEHUB_API_URL` / `BUILD_MODE` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        let api_url = std::env::var(API_URL_ENV).ok();
        let build_mode = std::env::var(BUILD_MODE_ENV).ok();
        self.with_overrides(api_url.as_deref(), build_mode.as_deref())
    }

    /// An explicit URL wins; otherwise a known build mode picks its API root.
    pub fn with_overrides(mut self, api_url: Option<&str>, build_mode: Option<&str>) -> Self {
        if let Some(url) = api_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.api.base_url = url.to_string();
            return self;
        }

        match build_mode {
            Some("dev") => self.api.base_url = DEV_API_ROOT.to_string(),
            Some("production") => self.api.base_url = PRODUCTION_API_ROOT.to_string(),
            _ => {}
        }
        self
    }

    /// Per-API state directory, so sessions for different hosts never mix.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let root = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join("moviehub");
        Ok(root.join(api_hash(&self.api.base_url)))
    }

    pub fn session_file(&self) -> Result<PathBuf> {
        match &self.session.file {
            Some(file) => Ok(file.clone()),
            None => Ok(self.data_dir()?.join(crate::session::SESSION_FILE_NAME)),
        }
    }
}

fn api_hash(base_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_url.trim_end_matches('/').as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_catalog_ttls() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout(), None);
        assert_eq!(config.cache.categories_ttl(), Duration::from_secs(600));
        assert_eq!(config.cache.movies_ttl(), Duration::from_secs(600));
        assert_eq!(config.cache.series_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.test/v1"
            timeout_secs = 15

            [cache]
            series_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://api.example.test/v1");
        assert_eq!(config.api.timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.cache.series_ttl_secs, 60);
        assert_eq!(config.cache.categories_ttl_secs, 600);
        assert!(config.session.file.is_none());
    }

    #[test]
    fn explicit_url_beats_build_mode() {
        let config = Config::default().with_overrides(Some("http://api.local/v2"), Some("production"));
        assert_eq!(config.api.base_url, "http://api.local/v2");

        let config = Config::default().with_overrides(None, Some("production"));
        assert_eq!(config.api.base_url, PRODUCTION_API_ROOT);

        let config = Config::default().with_overrides(Some("  "), Some("dev"));
        assert_eq!(config.api.base_url, DEV_API_ROOT);

        let config = Config::default().with_overrides(None, Some("staging"));
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn api_hash_ignores_trailing_slash() {
        assert_eq!(api_hash("http://a/v1"), api_hash("http://a/v1/"));
        assert_ne!(api_hash("http://a/v1"), api_hash("http://b/v1"));
        assert_eq!(api_hash("http://a/v1").len(), 16);
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("moviehub-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.cache.movies_ttl_secs = 42;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.cache.movies_ttl_secs, 42);
        let _ = fs::remove_file(&path);
    }
}
