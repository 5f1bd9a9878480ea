//! Arena configuration documents.
//!
//! Each arena is backed by one YAML file. The document is kept as a raw
//! [`serde_yaml::Mapping`] so keys this crate does not know about (the
//! round logic's own settings) survive a load/save cycle untouched.
//!
//! ```yaml
//! arena-name: Skylands
//! enabled: true
//! arena-mode: 0
//! signs:   { join-sign-x: 10, ..., status-line-1: "[SkyWars]" }
//! arena:   { arena-world: skylands, max-players: 12, spawn-positions: { pos-1: "0.5:70:0.5" } }
//! team-settings: { players-per-team: 2, ... }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use skyarena_protocol::{ArenaName, BlockPos, WorldName};

use crate::ArenaError;

/// The template `create` copies for new arenas.
pub const DEFAULT_TEMPLATE: &str = include_str!("../resources/default.yml");

/// A mutable arena document bound to its file.
///
/// Setters only touch memory; nothing reaches disk until [`save`](Self::save).
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    path: PathBuf,
    name: ArenaName,
    doc: Mapping,
}

impl ArenaConfig {
    /// Reads and parses `path`.
    ///
    /// # Errors
    ///
    /// `Malformed` if the file is not a YAML mapping, `MissingName` if
    /// `arena-name` is absent, blank, or not a usable name.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ArenaError> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        Self::parse(path, &text)
    }

    /// Parses `text` as the document stored at `path`.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, ArenaError> {
        let path = path.into();
        let doc = match serde_yaml::from_str::<Value>(text) {
            Ok(Value::Mapping(doc)) => doc,
            Ok(_) => {
                return Err(ArenaError::Malformed {
                    path,
                    reason: "top level is not a mapping".into(),
                });
            }
            Err(e) => {
                return Err(ArenaError::Malformed {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let name = doc
            .get("arena-name")
            .and_then(Value::as_str)
            .and_then(|s| ArenaName::new(s).ok());
        let Some(name) = name else {
            return Err(ArenaError::MissingName { path });
        };

        Ok(Self { path, name, doc })
    }

    /// Builds a document from template text and stamps `name` into it.
    pub(crate) fn from_template(
        path: impl Into<PathBuf>,
        template: &str,
        name: ArenaName,
    ) -> Result<Self, ArenaError> {
        let path = path.into();
        let doc = match serde_yaml::from_str::<Value>(template) {
            Ok(Value::Mapping(doc)) => doc,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) | Err(_) => {
                return Err(ArenaError::Malformed {
                    path,
                    reason: "arena template is not a YAML mapping".into(),
                });
            }
        };
        let mut config = Self { path, name, doc };
        let stamped = config.name.to_string();
        config.doc.insert("arena-name".into(), stamped.into());
        Ok(config)
    }

    pub fn name(&self) -> &ArenaName {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the document back to its file.
    pub fn save(&self) -> Result<(), ArenaError> {
        let text = serde_yaml::to_string(&self.doc).map_err(|e| ArenaError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, text)?;
        tracing::debug!(arena = %self.name, path = %self.path.display(), "arena config saved");
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    /// Looks up a dotted key such as `arena.max-players`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut value = self.doc.get(parts.next()?)?;
        for part in parts {
            value = value.as_mapping()?.get(part)?;
        }
        Some(value)
    }

    /// The world the arena plays in, if one has been set.
    ///
    /// A value that is not a single folder name (`.`, `..`, a path) is
    /// treated as unset.
    pub fn arena_world(&self) -> Option<WorldName> {
        let raw = self
            .get("arena.arena-world")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())?;
        match WorldName::folder(raw) {
            Ok(world) => Some(world),
            Err(e) => {
                tracing::warn!(arena = %self.name, error = %e, "ignoring arena world");
                None
            }
        }
    }

    /// Whether the arena is switched on. A missing key means off.
    pub fn is_enabled(&self) -> bool {
        self.get("enabled").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_team_mode(&self) -> bool {
        self.get("arena-mode").and_then(Value::as_i64) == Some(1)
    }

    pub fn max_players(&self) -> Option<u32> {
        self.get_u32("arena.max-players")
    }

    pub fn min_players(&self) -> Option<u32> {
        self.get_u32("arena.min-players")
    }

    /// Spawn pedestals as `(index, x, y, z)`, ordered by index. Entries
    /// that do not parse are skipped.
    pub fn spawn_positions(&self) -> Vec<(u32, [f64; 3])> {
        let Some(map) = self.get("arena.spawn-positions").and_then(Value::as_mapping) else {
            return Vec::new();
        };
        let mut spawns: Vec<(u32, [f64; 3])> = map
            .iter()
            .filter_map(|(key, value)| {
                let index = key.as_str()?.strip_prefix("pos-")?.parse().ok()?;
                let mut coords = value.as_str()?.split(':').map(|c| c.parse::<f64>().ok());
                let xyz = [coords.next()??, coords.next()??, coords.next()??];
                Some((index, xyz))
            })
            .collect();
        spawns.sort_by_key(|(index, _)| *index);
        spawns
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    // -- writes -------------------------------------------------------------

    /// Sets a dotted key, creating intermediate sections as needed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let mut node = &mut self.doc;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.insert(part.into(), value.into());
                break;
            }
            let entry = node
                .entry(part.into())
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            let Value::Mapping(next) = entry else {
                break;
            };
            node = next;
        }
        self
    }

    pub fn set_join_sign(&mut self, pos: BlockPos, world: &WorldName) -> &mut Self {
        self.set("signs.join-sign-x", pos.x)
            .set("signs.join-sign-y", pos.y)
            .set("signs.join-sign-z", pos.z)
            .set("signs.join-sign-world", world.as_str())
    }

    /// Sets one of the sign's status lines (1-based).
    pub fn set_status_line(&mut self, line: u8, text: &str) -> &mut Self {
        self.set(&format!("signs.status-line-{line}"), text)
    }

    pub fn set_arena_world(&mut self, world: &WorldName) -> &mut Self {
        self.set("arena.arena-world", world.as_str())
    }

    pub fn enable_spectator(&mut self, enabled: bool) -> &mut Self {
        self.set("arena.spectator-mode", enabled)
    }

    pub fn set_spectator_spawn(&mut self, pos: BlockPos) -> &mut Self {
        self.set("arena.spec-spawn-x", pos.x)
            .set("arena.spec-spawn-y", pos.y)
            .set("arena.spec-spawn-z", pos.z)
    }

    pub fn set_player_count(&mut self, max_players: u32, min_players: u32) -> &mut Self {
        self.set("arena.max-players", max_players)
            .set("arena.min-players", min_players)
    }

    /// Countdown length in seconds.
    pub fn set_start_time(&mut self, secs: u32) -> &mut Self {
        self.set("arena.starting-time", secs)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.set("enabled", enabled)
    }

    pub fn set_grace_time(&mut self, secs: u32) -> &mut Self {
        self.set("arena.grace-time", secs)
    }

    pub fn set_start_when_full(&mut self, start: bool) -> &mut Self {
        self.set("arena.start-when-full", start)
    }

    /// Stores pedestal `index` as `"x:y:z"`.
    pub fn set_spawn_position(&mut self, index: u32, pos: [f64; 3]) -> &mut Self {
        let encoded = pos.map(|c| c.to_string()).join(":");
        self.set(&format!("arena.spawn-positions.pos-{index}"), encoded)
    }

    pub fn reset_spawn_positions(&mut self) -> &mut Self {
        self.set("arena.spawn-positions", Value::Mapping(Mapping::new()))
    }

    /// Renames the arena inside the document. The registry key and the
    /// file name are unchanged until the arena is rediscovered.
    pub fn set_arena_name(&mut self, name: ArenaName) -> &mut Self {
        let stamped = name.to_string();
        self.name = name;
        self.set("arena-name", stamped)
    }

    pub fn set_team_mode(&mut self, teams: bool) -> &mut Self {
        self.set("arena-mode", i32::from(teams))
    }

    pub fn set_team_data(
        &mut self,
        players_per_team: u32,
        min_teams: u32,
        max_teams: u32,
        colours: &[i32],
    ) -> &mut Self {
        self.set("team-settings.players-per-team", players_per_team)
            .set("team-settings.minimum-teams", min_teams)
            .set("team-settings.maximum-teams", max_teams)
            .set("team-settings.team-colours", colours.to_vec())
    }
}
