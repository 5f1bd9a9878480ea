//! Persistent player state for SkyArena.
//!
//! Gameplay never waits on storage. Every read and write goes through
//! the [`Gateway`], which forwards it to a single storage thread and
//! later hands the result back to the main context:
//!
//! ```text
//! main context ── request ──→ storage thread (PlayerStore, in order)
//!      ▲                              │
//!      └──── collect() ◀── reply ─────┘
//! ```
//!
//! # Key types
//!
//! - [`Gateway`] — the non-blocking request/response boundary
//! - [`PlayerStore`] — the backend trait ([`MemoryStore`], [`JsonFileStore`])
//! - [`PlayerData`] — one player's statistics and purchased permissions
//! - [`StoreError`] — what a failed call resolves with

mod error;
mod gateway;
mod json;
mod record;
mod store;

pub use error::StoreError;
pub use gateway::{Gateway, Operation, RequestId, Resolved, discard};
pub use json::JsonFileStore;
pub use record::{PlayerData, StatChange, decode_permissions, encode_permissions};
pub use store::{MemoryStore, PlayerStore};
