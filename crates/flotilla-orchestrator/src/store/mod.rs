//! Transactional state store for task and node records.
//!
//! The orchestrator's collaborators read and write cluster state through
//! short transactions: [`MemoryStore::update`] runs a closure against a
//! [`Tx`], applies its staged writes atomically on success, and publishes
//! the transaction's events to the [`WatchQueue`] in commit order. A
//! closure error discards every staged write and every event.
//!
//! [`WatchQueue`]: crate::watch::WatchQueue

pub mod memory;

pub use memory::{MemoryStore, ReadView, Tx};
