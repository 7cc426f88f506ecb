//! Network fetching seam and the reqwest-backed implementation.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use url::Url;

/// A response captured off the network, before any caching decision.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  /// URL the response was ultimately served from (after redirects)
  pub final_url: Url,
}

impl FetchedResponse {
  /// Whether the response came from the given origin
  /// (scheme, host and port all equal).
  pub fn is_same_origin(&self, origin: &Url) -> bool {
    self.final_url.scheme() == origin.scheme()
      && self.final_url.host_str() == origin.host_str()
      && self.final_url.port_or_known_default() == origin.port_or_known_default()
  }
}

/// Trait for network fetchers.
#[async_trait]
pub trait Fetch: Send + Sync {
  /// Perform a network fetch for the given method and URL.
  async fn fetch(&self, method: &str, url: &Url) -> Result<FetchedResponse>;
}

/// reqwest-backed fetcher with a request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Fetch for HttpFetcher {
  async fn fetch(&self, method: &str, url: &Url) -> Result<FetchedResponse> {
    let method = reqwest::Method::from_bytes(method.as_bytes())
      .map_err(|e| eyre!("Invalid HTTP method {}: {}", method, e))?;

    let response = self
      .client
      .request(method, url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", url, e))?
      .to_vec();

    Ok(FetchedResponse {
      status,
      headers,
      body,
      final_url,
    })
  }
}
