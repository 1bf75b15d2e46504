//! # DevChain
//!
//! Learning milestone tracker. Users log what they learned, earn milestone
//! badges as their entry count grows, and can anchor entries and badges on
//! the Hedera network.
//!
//! ## Modules
//!
//! - [`tracker`]: Entry, badge, settings and backup operations
//! - [`storage`]: Key-value stores (SQLite, JSON files, memory) and the typed repository
//! - [`ledger`]: Hedera gateway client with local fallback
//! - [`notify`]: Email backends and templates
//! - [`scheduler`]: Inactivity reminders and the weekly digest
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use devchain::events::EventHub;
//! use devchain::ledger::LedgerService;
//! use devchain::model::{Category, NewEntry};
//! use devchain::notify::LogOnly;
//! use devchain::storage::MemoryStore;
//! use devchain::tracker::Tracker;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = Tracker::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(LedgerService::disabled()),
//!         Arc::new(LogOnly),
//!         None,
//!         Arc::new(EventHub::default()),
//!     );
//!
//!     let user = tracker.register_user("ada", "ada@example.com").await?;
//!     let submission = tracker
//!         .submit_entry(
//!             &user.id,
//!             NewEntry {
//!                 title: "Learned Rust ownership".to_string(),
//!                 description: "Moves, borrows and lifetimes".to_string(),
//!                 category: Category::Tutorial,
//!                 date: chrono::Utc::now().date_naive(),
//!             },
//!         )
//!         .await?;
//!
//!     for badge in submission.unlocked {
//!         println!("{} {}", badge.icon, badge.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backup;
pub mod badges;
pub mod cloud;
pub mod config;
pub mod events;
pub mod format;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod notify;
pub mod rate_limit;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod tracker;
pub mod validation;

// Re-export top-level types for convenience
pub use model::{Badge, Category, Entry, NewEntry, Profile, Rarity, Settings, User};

pub use storage::{
    open_store, JsonFileStore, KeyValueStore, MemoryStore, Repository, SqliteStore,
    StorageError, StorageResult,
};

pub use tracker::{EntrySubmission, RestoreSummary, Tracker, TrackerError, TrackerResult};

pub use ledger::{LedgerError, LedgerOutcome, LedgerService, LedgerStatus};

pub use api::{build_router, serve, ApiError, AppState};

pub use events::{EventHub, TrackerEvent};

pub use scheduler::{Scheduler, SchedulerError, TickReport};

pub use config::{Config, ConfigError, LoggingConfig};

pub use validation::ValidationErrors;
