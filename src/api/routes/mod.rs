//! API Routes
//!
//! Route handlers organized by functionality.

pub mod backup;
pub mod badges;
pub mod entries;
pub mod health;
pub mod ledger;
pub mod scheduler;
pub mod settings;
pub mod users;
