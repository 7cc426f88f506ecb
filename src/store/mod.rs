//! Named stores of captured network responses.
//!
//! A store is a key/value map of responses, identified by a version-tagged
//! name. Backends implement `StoreBackend`:
//! - `SqliteStore` persists all stores in a single database file
//! - `MemoryStore` keeps everything in-process

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{StoreBackend, StoredResponse};
