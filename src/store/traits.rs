//! Store backend trait and the captured response type.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// A captured HTTP response held in a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
  pub status: u16,
  /// Header name/value pairs in response order
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  /// URL the response was served from
  pub url: String,
  /// When the response was captured
  pub fetched_at: DateTime<Utc>,
}

impl StoredResponse {
  /// Look up a header value by case-insensitive name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Trait for store backends.
///
/// A backend holds any number of named stores, each an independent key/value
/// map of captured responses. Entry-level operations are atomic; a backend
/// may be shared across concurrent interceptions.
pub trait StoreBackend: Send + Sync {
  /// Open the named store, creating it if absent.
  fn open_store(&self, name: &str) -> Result<()>;

  /// Look up an entry in the named store.
  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>>;

  /// Insert or replace an entry in the named store.
  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()>;

  /// Delete the named store and all of its entries.
  fn delete_store(&self, name: &str) -> Result<()>;

  /// Names of all stores currently present.
  fn list_stores(&self) -> Result<Vec<String>>;

  /// Number of entries in the named store.
  fn entry_count(&self, store: &str) -> Result<u64>;
}

impl<S: StoreBackend> StoreBackend for std::sync::Arc<S> {
  fn open_store(&self, name: &str) -> Result<()> {
    (**self).open_store(name)
  }

  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>> {
    (**self).get(store, key)
  }

  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()> {
    (**self).put(store, key, response)
  }

  fn delete_store(&self, name: &str) -> Result<()> {
    (**self).delete_store(name)
  }

  fn list_stores(&self) -> Result<Vec<String>> {
    (**self).list_stores()
  }

  fn entry_count(&self, store: &str) -> Result<u64> {
    (**self).entry_count(store)
  }
}
