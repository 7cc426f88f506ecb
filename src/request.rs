//! Request identity and bypass guard rules.

use sha2::{Digest, Sha256};
use url::Url;

/// A request as seen at the interception point: method plus absolute URL.
#[derive(Debug, Clone)]
pub struct AssetRequest {
  pub method: String,
  pub url: Url,
}

impl AssetRequest {
  /// Create a request with an explicit method.
  pub fn new(method: &str, url: Url) -> Self {
    Self {
      method: method.to_uppercase(),
      url,
    }
  }

  /// Create a GET request.
  pub fn get(url: Url) -> Self {
    Self::new("GET", url)
  }

  pub fn is_get(&self) -> bool {
    self.method == "GET"
  }

  /// Store key for this request: SHA256 over method plus URL.
  /// Stable and fixed-length regardless of URL shape.
  pub fn store_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_str().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Guard rules deciding which requests skip the cache entirely.
#[derive(Debug, Clone)]
pub struct BypassRules {
  /// URL substrings marking API traffic (e.g. "/api/")
  pub api_markers: Vec<String>,
  /// URL substrings marking realtime/socket upgrade paths (e.g. "/ws")
  pub upgrade_markers: Vec<String>,
}

impl BypassRules {
  /// True when the request must pass through to default network handling:
  /// any non-GET method, API paths, and realtime upgrade paths.
  pub fn should_bypass(&self, request: &AssetRequest) -> bool {
    if !request.is_get() {
      return true;
    }

    let url = request.url.as_str();
    self
      .api_markers
      .iter()
      .chain(self.upgrade_markers.iter())
      .any(|marker| url.contains(marker.as_str()))
  }
}
