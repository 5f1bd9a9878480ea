//! Unified error type for SkyArena.

use std::path::PathBuf;

use skyarena_arena::ArenaError;
use skyarena_protocol::{PlayerName, ProtocolError};
use skyarena_store::StoreError;
use skyarena_worker::PoolError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on the wrapping variants lets `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum SkyArenaError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The settings document could not be parsed.
    #[error(
        "invalid settings{}: {source}",
        path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default()
    )]
    Settings {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The host never announced this player, or they already left.
    #[error("player {0} is not online")]
    NotOnline(PlayerName),

    #[error("player {0} is not in an arena")]
    NotInArena(PlayerName),

    /// Every arena is full, running, flagged, or being deleted.
    #[error("no arena is accepting players")]
    NoArenaAvailable,

    /// The player has no permission attachment (not online).
    #[error("player {0} has no permission attachment")]
    NotAttached(PlayerName),

    #[error("unknown cage {0}")]
    UnknownCage(String),

    #[error("unknown kit {0}")]
    UnknownKit(String),

    /// The player lacks the permission that unlocks this item.
    #[error("player {player} lacks permission {permission}")]
    Locked {
        player: PlayerName,
        permission: String,
    },

    /// The player already has a form open.
    #[error("player {0} already has a form open")]
    FormPending(PlayerName),
}

#[cfg(test)]
mod tests {
    use skyarena_protocol::ArenaName;

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err: SkyArenaError = ProtocolError::EmptyName.into();
        assert!(matches!(err, SkyArenaError::Protocol(_)));
    }

    #[test]
    fn test_from_arena_error() {
        let name = ArenaName::new("a").unwrap();
        let err: SkyArenaError = ArenaError::AlreadyExists(name).into();
        assert!(matches!(err, SkyArenaError::Arena(_)));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_from_store_error() {
        let err: SkyArenaError = StoreError::LobbyNotLoaded.into();
        assert!(matches!(err, SkyArenaError::Store(_)));
    }

    #[test]
    fn test_from_pool_error() {
        let err: SkyArenaError = PoolError::ShutDown.into();
        assert!(matches!(err, SkyArenaError::Pool(_)));
    }
}
