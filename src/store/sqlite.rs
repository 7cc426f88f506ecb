//! SQLite store backend.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{StoreBackend, StoredResponse};

/// SQLite-backed store. All named stores share one database file; deleting a
/// store is a row sweep keyed by store name.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (creating if needed) the database at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Open the database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("precache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for store tables.
const STORE_SCHEMA: &str = r#"
-- Known store names (a store can exist while still empty)
CREATE TABLE IF NOT EXISTS stores (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Captured responses, scoped by store name
CREATE TABLE IF NOT EXISTS entries (
    store_name TEXT NOT NULL,
    request_key TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (store_name, request_key)
);

CREATE INDEX IF NOT EXISTS idx_entries_store ON entries(store_name);
"#;

impl StoreBackend for SqliteStore {
  fn open_store(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO stores (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open store {}: {}", name, e))?;

    Ok(())
  }

  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT url, status, headers, body, fetched_at FROM entries
         WHERE store_name = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare entry lookup: {}", e))?;

    let row: Option<(String, u16, String, Vec<u8>, String)> = stmt
      .query_row(params![store, key], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
        ))
      })
      .ok();

    match row {
      Some((url, status, headers_json, body, fetched_at_str)) => {
        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        let fetched_at = parse_datetime(&fetched_at_str)?;

        Ok(Some(StoredResponse {
          status,
          headers,
          body,
          url,
          fetched_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers_json = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;
    let fetched_at = response.fetched_at.format("%Y-%m-%d %H:%M:%S").to_string();

    // Register the store name so the activation sweep sees entries written
    // before the store was ever opened
    conn
      .execute(
        "INSERT OR IGNORE INTO stores (name) VALUES (?)",
        params![store],
      )
      .map_err(|e| eyre!("Failed to register store {}: {}", store, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries (store_name, request_key, url, status, headers, body, fetched_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
          store,
          key,
          response.url,
          response.status,
          headers_json,
          response.body,
          fetched_at
        ],
      )
      .map_err(|e| eyre!("Failed to store entry: {}", e))?;

    Ok(())
  }

  fn delete_store(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    conn
      .execute("DELETE FROM entries WHERE store_name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of store {}: {}", name, e))?;
    conn
      .execute("DELETE FROM stores WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete store {}: {}", name, e))?;

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn list_stores(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM stores ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare store listing: {}", e))?;

    let names: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list stores: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn entry_count(&self, store: &str) -> Result<u64> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: u64 = conn
      .query_row(
        "SELECT COUNT(*) FROM entries WHERE store_name = ?",
        params![store],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of store {}: {}", store, e))?;

    Ok(count)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // Stored as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;

  fn sample(url: &str) -> StoredResponse {
    StoredResponse {
      status: 200,
      headers: vec![("content-type".to_string(), "text/html".to_string())],
      body: b"<html></html>".to_vec(),
      url: url.to_string(),
      fetched_at: Utc::now(),
    }
  }

  fn open_temp() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("cache.db")).unwrap();
    (dir, store)
  }

  #[test]
  fn test_roundtrip() {
    let (_dir, store) = open_temp();
    store.open_store("app-v1").unwrap();
    store
      .put("app-v1", "key1", &sample("https://example.com/"))
      .unwrap();

    let got = store.get("app-v1", "key1").unwrap().unwrap();
    assert_eq!(got.status, 200);
    assert_eq!(got.url, "https://example.com/");
    assert_eq!(got.header("Content-Type"), Some("text/html"));
    assert_eq!(got.body, b"<html></html>");
  }

  #[test]
  fn test_miss_returns_none() {
    let (_dir, store) = open_temp();
    store.open_store("app-v1").unwrap();
    assert!(store.get("app-v1", "missing").unwrap().is_none());
  }

  #[test]
  fn test_entries_are_scoped_by_store() {
    let (_dir, store) = open_temp();
    store.open_store("app-v1").unwrap();
    store.open_store("app-v2").unwrap();
    store
      .put("app-v1", "key1", &sample("https://example.com/"))
      .unwrap();

    assert!(store.get("app-v2", "key1").unwrap().is_none());
    assert_eq!(store.entry_count("app-v1").unwrap(), 1);
    assert_eq!(store.entry_count("app-v2").unwrap(), 0);
  }

  #[test]
  fn test_open_store_is_idempotent() {
    let (_dir, store) = open_temp();
    store.open_store("app-v1").unwrap();
    store.open_store("app-v1").unwrap();
    assert_eq!(store.list_stores().unwrap(), vec!["app-v1".to_string()]);
  }

  #[test]
  fn test_put_without_open_store_is_visible_to_sweep() {
    let (_dir, store) = open_temp();

    // Opportunistic write under a generation that never ran install
    store
      .put("app-v1", "key1", &sample("https://example.com/"))
      .unwrap();

    assert_eq!(store.list_stores().unwrap(), vec!["app-v1".to_string()]);

    // Activation sweep for the next generation must find and delete it
    for name in store.list_stores().unwrap() {
      if name != "app-v2" {
        store.delete_store(&name).unwrap();
      }
    }

    assert!(store.get("app-v1", "key1").unwrap().is_none());
    assert!(store.list_stores().unwrap().is_empty());
  }

  #[test]
  fn test_delete_store_removes_entries() {
    let (_dir, store) = open_temp();
    store.open_store("app-v1").unwrap();
    store
      .put("app-v1", "key1", &sample("https://example.com/"))
      .unwrap();

    store.delete_store("app-v1").unwrap();

    assert!(store.list_stores().unwrap().is_empty());
    assert!(store.get("app-v1", "key1").unwrap().is_none());
  }
}
