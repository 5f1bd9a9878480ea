//! Arena lifecycle for SkyArena.
//!
//! An arena is an isolated game session bound to one world. This crate
//! owns the registry of arenas, their configuration documents, and the
//! status and flags the rest of the server uses to decide where players
//! go. The round logic inside an arena lives elsewhere; here it is only
//! visible as [`ArenaStatus`].
//!
//! # Key types
//!
//! - [`ArenaManager`] — discovers, creates, selects, and deletes arenas
//! - [`Arena`] — one instance: world, roster, status, flags
//! - [`ArenaConfig`] — the YAML document behind an arena
//! - [`ArenaStatus`] / [`ArenaFlags`] — what selection looks at

mod arena;
mod config;
mod error;
mod manager;
mod state;

pub use arena::{Arena, Participation};
pub use config::{ArenaConfig, DEFAULT_TEMPLATE};
pub use error::ArenaError;
pub use manager::{ArenaManager, Deletion, DiscoveryReport, SkippedConfig};
pub use state::{ArenaFlag, ArenaFlags, ArenaStatus};
