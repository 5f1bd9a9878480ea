//! # SkyArena
//!
//! SkyWars arena orchestration for a block-game server.
//!
//! The host feeds [`HostEvent`]s in and receives [`HostAction`]s back;
//! [`SkyArenaServer`] owns everything in between:
//!
//! - the arena registry ([`ArenaManager`]): discovery, creation,
//!   selection, and deletion of arenas;
//! - a worker pool for disk work, and a storage gateway for player
//!   records, both delivering their results as callbacks on the main
//!   context;
//! - per-player subsystems: permissions, cages, kits, the leaderboard
//!   pedestal, chat routing, and open menus.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyarena::prelude::*;
//!
//! # async fn demo() -> Result<(), SkyArenaError> {
//! let settings = ServerSettings::load(std::path::Path::new("skyarena.yml"))?;
//! let server = SkyArenaServer::start(settings, Box::new(Ledger::new()))?;
//!
//! let (_events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
//! let (actions_tx, _actions_rx) = tokio::sync::mpsc::unbounded_channel();
//! server.run(events_rx, actions_tx, std::future::pending()).await;
//! # Ok(())
//! # }
//! ```

pub mod cages;
pub mod chat;
pub mod economy;
mod error;
pub mod forms;
pub mod kits;
pub mod pedestal;
pub mod permissions;
pub mod presence;
mod server;
pub mod settings;

pub use error::SkyArenaError;
pub use server::{SkyArenaServer, Task};

pub use skyarena_arena::{Arena, ArenaManager, ArenaStatus, Deletion};
pub use skyarena_protocol::{ArenaName, BlockPos, HostAction, HostEvent, PlayerName, Position, WorldName};
pub use skyarena_store::{MemoryStore, PlayerData, PlayerStore, StoreError};

/// Everything a host integration usually needs.
pub mod prelude {
    pub use crate::cages::{Cage, CageManager};
    pub use crate::economy::{Economy, Ledger};
    pub use crate::forms::Menu;
    pub use crate::kits::{Kit, KitManager};
    pub use crate::pedestal::{Pedestal, PedestalEntry};
    pub use crate::settings::{ServerSettings, StorageSettings};
    pub use crate::{SkyArenaError, SkyArenaServer, Task};

    pub use skyarena_arena::{Arena, ArenaFlag, ArenaManager, ArenaStatus, Deletion};
    pub use skyarena_protocol::{
        ArenaName, BlockPos, HostAction, HostEvent, PlayerName, Position, WorldName,
    };
    pub use skyarena_store::{JsonFileStore, MemoryStore, PlayerData, PlayerStore, StoreError};
}
