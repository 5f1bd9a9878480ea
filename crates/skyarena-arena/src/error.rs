//! Error types for the arena layer.

use std::path::PathBuf;

use skyarena_protocol::{ArenaName, PlayerName, ProtocolError};
use skyarena_worker::PoolError;

/// Errors that can occur during arena and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// No arena is registered under this name.
    #[error("arena {0} not found")]
    NotFound(String),

    /// An arena with this name is registered, or its config file exists.
    #[error("arena {0} already exists")]
    AlreadyExists(ArenaName),

    /// The config document has no usable `arena-name`.
    #[error("config {} is missing its arena name", path.display())]
    MissingName { path: PathBuf },

    /// The config document is not valid YAML, or not a mapping.
    #[error("config {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// The player is already on this arena's roster.
    #[error("player {0} already in arena {1}")]
    AlreadyInArena(PlayerName, ArenaName),

    /// The player is not on this arena's roster.
    #[error("player {0} not in arena {1}")]
    NotInArena(PlayerName, ArenaName),

    #[error(transparent)]
    InvalidName(#[from] ProtocolError),

    /// The arena's world does not resolve to a folder directly under
    /// the worlds directory, so deleting it is refused.
    #[error("arena {arena} has world {world:?} outside the worlds directory")]
    UnsafeWorld { arena: ArenaName, world: String },

    /// The worker pool refused the deletion job.
    #[error("deletion could not be scheduled: {0}")]
    Pool(#[from] PoolError),

    #[error("arena config I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
