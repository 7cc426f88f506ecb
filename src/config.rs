use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::request::BypassRules;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Base URL assets are fetched from
  pub origin: Url,
  /// Version-tagged store name (e.g. "app-cache-v2"). Bumping it is the sole
  /// invalidation mechanism: the next activation deletes every other store.
  pub cache_name: String,
  /// Root-relative paths precached on install
  #[serde(default = "default_assets")]
  pub assets: Vec<String>,
  #[serde(default)]
  pub bypass: BypassConfig,
  /// Page served when a network fetch fails and this path is cached.
  /// Empty string disables the fallback.
  #[serde(default = "default_fallback")]
  pub fallback_path: String,
  /// Whether status-200 responses from other origins are cached on miss
  #[serde(default)]
  pub cache_cross_origin: bool,
  #[serde(default)]
  pub install_failure: InstallFailure,
  #[serde(default = "default_fetch_timeout")]
  pub fetch_timeout_secs: u64,
  /// Overrides the default store location
  pub data_dir: Option<PathBuf>,
}

/// URL markers that exclude a request from caching.
#[derive(Debug, Clone, Deserialize)]
pub struct BypassConfig {
  #[serde(default = "default_api_markers")]
  pub api_markers: Vec<String>,
  #[serde(default = "default_upgrade_markers")]
  pub upgrade_markers: Vec<String>,
}

impl Default for BypassConfig {
  fn default() -> Self {
    Self {
      api_markers: default_api_markers(),
      upgrade_markers: default_upgrade_markers(),
    }
  }
}

/// What to do when an asset-list entry fails to precache.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallFailure {
  /// Any failed asset fails the whole install
  #[default]
  Abort,
  /// Log a warning and keep going
  Continue,
}

fn default_assets() -> Vec<String> {
  vec!["/".to_string()]
}

fn default_fallback() -> String {
  "/".to_string()
}

fn default_api_markers() -> Vec<String> {
  vec!["/api/".to_string()]
}

fn default_upgrade_markers() -> Vec<String> {
  vec!["/ws".to_string()]
}

fn default_fetch_timeout() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./precache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/precache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/precache/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("precache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("precache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolve a root-relative path against the configured origin.
  pub fn asset_url(&self, path: &str) -> Result<Url> {
    self
      .origin
      .join(path)
      .map_err(|e| eyre!("Invalid asset path {}: {}", path, e))
  }

  pub fn bypass_rules(&self) -> BypassRules {
    BypassRules {
      api_markers: self.bypass.api_markers.clone(),
      upgrade_markers: self.bypass.upgrade_markers.clone(),
    }
  }

  pub fn fetch_timeout(&self) -> Duration {
    Duration::from_secs(self.fetch_timeout_secs)
  }
}
