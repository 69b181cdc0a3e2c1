//! # konbit-store
//!
//! Conversation store for Konbit (SQLite-backed).

pub mod store;

pub use store::{InsertOutcome, Store, StoredTurn};
