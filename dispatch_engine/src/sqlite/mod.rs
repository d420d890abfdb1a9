//! SQLite database module for the dispatch engine.
//!
//! Schema migrations live in `migrations/` and are embedded into the binary. Call
//! [`SqliteDatabase::run_migrations`] at start-up.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
