//! Identity, position, and event types shared across SkyArena.
//!
//! Names are plain strings on the host side. Wrapping them in newtypes
//! keeps a `PlayerName` from being passed where an `ArenaName` is
//! expected, and lets `ArenaName` enforce that it is safe to use as a
//! file stem (arena configs live at `<arenas_dir>/<name>.yml`).

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's name, the key for every per-player map and database row.
///
/// `#[serde(transparent)]` stores this as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    /// Wraps a player name. Host-provided names are trusted as-is.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unique name of an arena.
///
/// Unique across the registry. Validated on construction: non-empty, no
/// path separators, no leading dot, because the name is also the stem of
/// the arena's config file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArenaName(String);

impl ArenaName {
    /// Validates and wraps an arena name.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProtocolError::EmptyName);
        }
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ProtocolError::InvalidArenaName(name));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArenaName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArenaName> for String {
    fn from(name: ArenaName) -> Self {
        name.0
    }
}

/// Lets registries keyed by `ArenaName` be queried with a plain `&str`.
impl Borrow<str> for ArenaName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArenaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The folder name of a world/level on the host.
///
/// Host-reported names are wrapped as-is with [`new`](Self::new). Names
/// read from arena documents end up joined onto the worlds directory, so
/// those go through [`folder`](Self::folder) instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldName(String);

impl WorldName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Wraps a name that must denote exactly one folder directly under
    /// the worlds directory.
    pub fn folder(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let world = Self(name.into());
        if world.0.trim().is_empty() {
            return Err(ProtocolError::EmptyName);
        }
        if !world.is_folder_name() {
            return Err(ProtocolError::InvalidWorldName(world.0));
        }
        Ok(world)
    }

    /// True when the name is a single plain path component: no
    /// separators, not `.` or `..`, no drive prefix.
    pub fn is_folder_name(&self) -> bool {
        let name = self.0.as_str();
        !name.trim().is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', ':', '\0'])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for WorldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Centre of the block, the point players are teleported to.
    pub fn center(&self) -> (f64, f64, f64) {
        (
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

/// A block position inside a named world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldName,
    pub pos: BlockPos,
}

impl Position {
    pub fn new(world: impl Into<WorldName>, pos: BlockPos) -> Self {
        Self {
            world: world.into(),
            pos,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pos, self.world)
    }
}

// ---------------------------------------------------------------------------
// Host events
// ---------------------------------------------------------------------------

/// Events the host server delivers to the core.
///
/// The host owns the transport and the player entities; the core only
/// sees names and worlds. Ticks are not events: the core drives its own
/// tick clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A player finished logging in and stands in `world`.
    PlayerJoined {
        player: PlayerName,
        world: WorldName,
        /// Whether the host granted the moderation permission.
        moderator: bool,
    },

    /// A player disconnected.
    PlayerQuit { player: PlayerName },

    /// A player sent a chat line. `recipients` is the host's default
    /// audience, which the core may narrow.
    PlayerChat {
        player: PlayerName,
        message: String,
        recipients: Vec<PlayerName>,
    },

    /// A player moved between worlds.
    WorldChanged {
        player: PlayerName,
        from: WorldName,
        to: WorldName,
    },
}

impl HostEvent {
    /// The player this event is about.
    pub fn player(&self) -> &PlayerName {
        match self {
            Self::PlayerJoined { player, .. }
            | Self::PlayerQuit { player }
            | Self::PlayerChat { player, .. }
            | Self::WorldChanged { player, .. } => player,
        }
    }
}

/// Things the core asks the host to do. The host owns delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    /// Deliver a chat line to exactly these players.
    Chat {
        recipients: Vec<PlayerName>,
        message: String,
    },

    /// Show a system message to one player.
    Notify { player: PlayerName, message: String },
}
