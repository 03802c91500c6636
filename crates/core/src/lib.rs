//! Core synchronization engine for a one-to-one chat client.
//!
//! This crate contains everything between the remote chat store and the
//! rendering layer: the backend seam and its in-memory implementation, the
//! ordered viewer-scoped message projection, the two-tier soft-deletion
//! policy, decaying typing presence, atomic read-receipt batching and the
//! per-conversation [`chat::SyncEngine`] that orchestrates them.

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod platform;

pub use backend::{ChatBackend, DeletionUpdate, MemoryBackend, Subscription};
pub use chat::{ChatSnapshot, SyncEngine};
pub use config::Config;
pub use error::{Error, PolicyViolation, Result, WriteAction};
