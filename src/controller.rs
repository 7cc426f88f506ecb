//! Cache controller: lifecycle state machine and request interception.
//!
//! One controller instance serves one cache generation (one store name).
//! A new deployment constructs a new instance with a bumped cache name;
//! its activation sweeps every store the previous generations left behind.

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info, warn};

use crate::config::{Config, InstallFailure};
use crate::net::{Fetch, FetchedResponse};
use crate::request::{AssetRequest, BypassRules};
use crate::store::{StoreBackend, StoredResponse};

/// Lifecycle phase of a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Uninitialized,
  Installing,
  /// Store populated; eligible for activation without any host reload
  Installed,
  Active,
}

/// Outcome of intercepting a request.
#[derive(Debug)]
pub enum Intercept {
  /// Request is excluded from caching; the host performs its default
  /// network handling. No store read or write happened.
  Bypass,
  /// Served from the current store
  Hit(StoredResponse),
  /// Served from the network (and cached when eligible)
  Network(StoredResponse),
  /// Network failed; served the cached fallback page instead
  Fallback(StoredResponse),
}

impl Intercept {
  /// The response carried by this outcome, if any.
  pub fn response(&self) -> Option<&StoredResponse> {
    match self {
      Intercept::Bypass => None,
      Intercept::Hit(r) | Intercept::Network(r) | Intercept::Fallback(r) => Some(r),
    }
  }
}

/// Offline-first cache controller.
///
/// `initialize` and `activate` take `&mut self` and must be awaited to
/// completion by the host before the phase is considered done. `intercept`
/// takes `&self`; any number may run concurrently against the shared backend.
pub struct CacheController<S: StoreBackend, F: Fetch> {
  storage: S,
  fetcher: F,
  config: Config,
  rules: BypassRules,
  phase: Phase,
}

impl<S: StoreBackend, F: Fetch> CacheController<S, F> {
  pub fn new(config: Config, storage: S, fetcher: F) -> Self {
    let rules = config.bypass_rules();
    Self {
      storage,
      fetcher,
      config,
      rules,
      phase: Phase::Uninitialized,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  fn store_name(&self) -> &str {
    &self.config.cache_name
  }

  /// Open the current store and populate it from the asset list.
  ///
  /// Per-asset failures follow the configured `install_failure` policy:
  /// under `abort` the first failure fails the install and the controller
  /// returns to `Uninitialized` so the install can be retried; under
  /// `continue` the asset is logged and skipped.
  pub async fn initialize(&mut self) -> Result<()> {
    if self.phase != Phase::Uninitialized {
      return Err(eyre!("initialize() called in phase {:?}", self.phase));
    }
    self.phase = Phase::Installing;

    self.storage.open_store(self.store_name())?;

    for path in self.config.assets.clone() {
      match self.precache(&path).await {
        Ok(()) => debug!(path = %path, "precached asset"),
        Err(e) => match self.config.install_failure {
          InstallFailure::Abort => {
            self.phase = Phase::Uninitialized;
            return Err(e.wrap_err(format!("Failed to precache {}", path)));
          }
          InstallFailure::Continue => {
            warn!(path = %path, error = %e, "skipping asset that failed to precache");
          }
        },
      }
    }

    self.phase = Phase::Installed;
    info!(
      store = self.store_name(),
      assets = self.config.assets.len(),
      "install complete"
    );

    Ok(())
  }

  /// Fetch one asset-list path and store the captured response.
  /// Anything but a 200 fails the asset.
  async fn precache(&self, path: &str) -> Result<()> {
    let request = AssetRequest::get(self.config.asset_url(path)?);
    let fetched = self.fetcher.fetch(&request.method, &request.url).await?;

    if fetched.status != 200 {
      return Err(eyre!("Unexpected status {} for {}", fetched.status, request.url));
    }

    self
      .storage
      .put(self.store_name(), &request.store_key(), &capture(&fetched))
  }

  /// Delete every store whose name differs from the current cache name and
  /// take control. Idempotent; safe to run on every startup.
  pub async fn activate(&mut self) -> Result<()> {
    for name in self.storage.list_stores()? {
      if name != self.store_name() {
        info!(store = %name, "deleting superseded store");
        self.storage.delete_store(&name)?;
      }
    }

    self.phase = Phase::Active;
    info!(store = self.store_name(), "activated");

    Ok(())
  }

  /// Intercept a request.
  ///
  /// Bypassed requests (non-GET, API paths, upgrade paths) touch neither the
  /// store nor the network. Otherwise: serve from the store on hit; on miss
  /// fetch from the network exactly once, caching the response when it is
  /// eligible (status 200, same-origin unless `cache_cross_origin`). When the
  /// fetch fails and the fallback page is cached, serve that instead.
  pub async fn intercept(&self, request: &AssetRequest) -> Result<Intercept> {
    if self.rules.should_bypass(request) {
      debug!(url = %request.url, method = %request.method, "bypassing cache");
      return Ok(Intercept::Bypass);
    }

    let key = request.store_key();
    if let Some(cached) = self.storage.get(self.store_name(), &key)? {
      debug!(url = %request.url, "cache hit");
      return Ok(Intercept::Hit(cached));
    }

    match self.fetcher.fetch(&request.method, &request.url).await {
      Ok(fetched) => {
        let response = capture(&fetched);
        if self.is_cacheable(&fetched) {
          // Write failure is logged; the response still goes back to the caller
          if let Err(e) = self.storage.put(self.store_name(), &key, &response) {
            warn!(url = %request.url, error = %e, "failed to cache response");
          }
        }
        Ok(Intercept::Network(response))
      }
      Err(e) => {
        if let Some(fallback) = self.lookup_fallback()? {
          warn!(url = %request.url, error = %e, "network failed, serving fallback page");
          return Ok(Intercept::Fallback(fallback));
        }
        Err(e.wrap_err(format!("Failed to fetch {}", request.url)))
      }
    }
  }

  fn is_cacheable(&self, fetched: &FetchedResponse) -> bool {
    fetched.status == 200
      && (self.config.cache_cross_origin || fetched.is_same_origin(&self.config.origin))
  }

  fn lookup_fallback(&self) -> Result<Option<StoredResponse>> {
    if self.config.fallback_path.is_empty() {
      return Ok(None);
    }

    let request = AssetRequest::get(self.config.asset_url(&self.config.fallback_path)?);
    self.storage.get(self.store_name(), &request.store_key())
  }
}

/// Capture a network response for storage.
fn capture(fetched: &FetchedResponse) -> StoredResponse {
  StoredResponse {
    status: fetched.status,
    headers: fetched.headers.clone(),
    body: fetched.body.clone(),
    url: fetched.final_url.to_string(),
    fetched_at: chrono::Utc::now(),
  }
}
