//! Service configuration.
//!
//! Everything has a default, so the service runs without a config file. An
//! optional YAML file may override any section, and command-line flags
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use renderer::{RenderOptions, DEFAULT_FIGURE_SIZE};
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_SKYVIEW_URL: &str = "https://skyview.gsfc.nasa.gov";

/// Root configuration loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("outputs")
}

/// SkyView connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_skyview_url")]
    pub base_url: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_skyview_url(),
            timeout_secs: default_upstream_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_skyview_url() -> String {
    DEFAULT_SKYVIEW_URL.to_string()
}

fn default_upstream_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    30
}

/// Figure settings shared by every rendered tile.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_figure_size")]
    pub figure_size: u32,
    #[serde(default = "default_true")]
    pub grid: bool,
    #[serde(default = "default_colorbar_label")]
    pub colorbar_label: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            figure_size: default_figure_size(),
            grid: true,
            colorbar_label: default_colorbar_label(),
        }
    }
}

impl RenderConfig {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            figure_size: self.figure_size,
            grid: self.grid,
            colorbar_label: self.colorbar_label.clone(),
            ..RenderOptions::default()
        }
    }
}

fn default_figure_size() -> u32 {
    DEFAULT_FIGURE_SIZE
}

fn default_true() -> bool {
    true
}

fn default_colorbar_label() -> String {
    "Arbitrary units".to_string()
}

/// The `/proxy/` pass-through. Off unless explicitly enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Host names that may be fetched. Subdomains of an entry are allowed.
    #[serde(default)]
    pub allow_hosts: Vec<String>,
    #[serde(default = "default_proxy_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_hosts: Vec::new(),
            max_bytes: default_proxy_max_bytes(),
            timeout_secs: default_proxy_timeout(),
        }
    }
}

fn default_proxy_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_proxy_timeout() -> u64 {
    30
}

/// Static front-end locations.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_aladin_dir")]
    pub aladin_dir: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            dir: default_web_dir(),
            aladin_dir: default_aladin_dir(),
        }
    }
}

fn default_web_dir() -> PathBuf {
    PathBuf::from("web/dist")
}

fn default_aladin_dir() -> PathBuf {
    PathBuf::from("web/aladin")
}

impl ServiceConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty map.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.cache.dir = dir;
        }
        self
    }

    pub fn with_web_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.web.dir = dir;
        }
        self
    }

    pub fn with_skyview_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.upstream.base_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.cache.dir, PathBuf::from("outputs"));
        assert_eq!(config.upstream.base_url, DEFAULT_SKYVIEW_URL);
        assert_eq!(config.upstream.timeout(), Duration::from_secs(120));
        assert_eq!(config.render.figure_size, 1200);
        assert!(!config.proxy.enabled);
        assert!(config.proxy.allow_hosts.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cache:
  dir: /var/cache/sky
proxy:
  enabled: true
  allow_hosts: [skyview.gsfc.nasa.gov]
"#;
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("/var/cache/sky"));
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.allow_hosts, vec!["skyview.gsfc.nasa.gov"]);
        assert_eq!(config.proxy.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.upstream.timeout_secs, 120);
        assert!(config.render.grid);
    }

    #[test]
    fn test_empty_yaml() {
        let config = ServiceConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.web.dir, PathBuf::from("web/dist"));
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            ServiceConfig::from_yaml(include_str!("../../../config/tile-api.yaml")).unwrap();
        assert_eq!(config.upstream.base_url, DEFAULT_SKYVIEW_URL);
        assert!(!config.proxy.enabled);
        assert_eq!(config.web.aladin_dir, PathBuf::from("web/aladin"));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(ServiceConfig::from_yaml("cache: [not, a, map]").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = ServiceConfig::default()
            .with_cache_dir(Some(PathBuf::from("/tmp/cutouts")))
            .with_web_dir(None)
            .with_skyview_url(Some("http://localhost:9000".to_string()));
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/cutouts"));
        assert_eq!(config.web.dir, PathBuf::from("web/dist"));
        assert_eq!(config.upstream.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_render_options() {
        let config = RenderConfig {
            figure_size: 600,
            grid: false,
            colorbar_label: "Counts".to_string(),
        };
        let options = config.options();
        assert_eq!(options.figure_size, 600);
        assert!(!options.grid);
        assert_eq!(options.colorbar_label, "Counts");
        assert!(options.title.is_none());
    }
}
