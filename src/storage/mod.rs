//! DevChain Storage
//!
//! All tracker state is stored as JSON blobs under fixed string keys:
//!
//! - **kv**: the [`KeyValueStore`] trait and the in-memory backend
//! - **sqlite**: SQLite backend (default for the server)
//! - **json_file**: one JSON file per key
//! - **keys**: the fixed key names
//! - **repository**: typed access on top of any backend
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use devchain::storage::{Repository, SqliteStore};
//! use devchain::model::User;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open("./devchain_data/devchain.db")?;
//!     let repo = Repository::new(Arc::new(store));
//!
//!     repo.save_user(&User::new("ada", "ada@example.com"))?;
//!     println!("{} users", repo.users()?.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod json_file;
pub mod keys;
pub mod kv;
pub mod repository;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use json_file::JsonFileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use repository::{BadgeClaim, Repository};
pub use sqlite::SqliteStore;

use std::path::Path;
use std::sync::Arc;

/// Open the backend named in configuration
pub fn open_store(backend: &str, data_dir: &Path) -> StorageResult<Arc<dyn KeyValueStore>> {
    match backend.to_lowercase().as_str() {
        "sqlite" => Ok(Arc::new(SqliteStore::open(data_dir.join("devchain.db"))?)),
        "json" => Ok(Arc::new(JsonFileStore::open(data_dir.join("kv"))?)),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(StorageError::Config(format!(
            "Unknown storage backend: {}. Use sqlite, json or memory",
            other
        ))),
    }
}
