//! In-memory store backend.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::{StoreBackend, StoredResponse};

/// Store backend held entirely in memory. Nothing survives the process;
/// used by tests and hosts that don't want persistence.
#[derive(Default)]
pub struct MemoryStore {
  stores: Mutex<HashMap<String, HashMap<String, StoredResponse>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StoreBackend for MemoryStore {
  fn open_store(&self, name: &str) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores.entry(name.to_string()).or_default();
    Ok(())
  }

  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.get(store).and_then(|s| s.get(key)).cloned())
  }

  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores
      .entry(store.to_string())
      .or_default()
      .insert(key.to_string(), response.clone());
    Ok(())
  }

  fn delete_store(&self, name: &str) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores.remove(name);
    Ok(())
  }

  fn list_stores(&self) -> Result<Vec<String>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut names: Vec<String> = stores.keys().cloned().collect();
    names.sort();
    Ok(names)
  }

  fn entry_count(&self, store: &str) -> Result<u64> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.get(store).map(|s| s.len() as u64).unwrap_or(0))
  }
}
