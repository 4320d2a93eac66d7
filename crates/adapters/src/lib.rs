//! crosspost adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `facebook`: Graph API publishing and post insights
//! - `telegram`: Bot API publishing and chat lookup
//! - `store`: SQLite and in-memory account/post stores

mod http;
mod store_memory;
mod store_sqlite;

pub mod facebook;
pub mod telegram;

pub use http::DEFAULT_TIMEOUT;

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryStore;
    pub use crate::store_sqlite::SqliteStore;
}
