//! The storage backend trait and the in-memory backend.

use std::collections::HashMap;

use skyarena_protocol::{PlayerName, Position};

use crate::{PlayerData, StatChange, StoreError};

/// A synchronous storage backend.
///
/// Backends run on the gateway's storage thread and never on the main
/// context, so they are free to block. Calls arrive in submission
/// order. Mutations on a player with no record are no-ops.
pub trait PlayerStore: Send + 'static {
    /// Creates a record for `name` unless one exists. Returns whether a
    /// record was created.
    fn upsert_player(&mut self, name: &PlayerName) -> Result<bool, StoreError>;

    fn fetch_player(&mut self, name: &PlayerName) -> Result<Option<PlayerData>, StoreError>;

    /// Up to `limit` records ordered by wins, highest first. Ties keep
    /// storage order.
    fn top_entries(&mut self, limit: usize) -> Result<Vec<PlayerData>, StoreError>;

    fn apply_change(&mut self, name: &PlayerName, change: StatChange) -> Result<(), StoreError>;

    /// Replaces the player's permission list.
    fn set_permissions(
        &mut self,
        name: &PlayerName,
        permissions: &[String],
    ) -> Result<(), StoreError>;

    fn set_lobby(&mut self, lobby: &Position) -> Result<(), StoreError>;

    fn load_lobby(&mut self) -> Result<Option<Position>, StoreError>;

    /// Called once when the gateway shuts down.
    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Keeps everything in memory. Records keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    players: Vec<PlayerData>,
    index: HashMap<PlayerName, usize>,
    lobby: Option<Position>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from existing records, in order. Later duplicates
    /// are ignored.
    pub fn from_records(records: impl IntoIterator<Item = PlayerData>, lobby: Option<Position>) -> Self {
        let mut store = Self {
            lobby,
            ..Self::default()
        };
        for record in records {
            if !store.index.contains_key(&record.name) {
                store.index.insert(record.name.clone(), store.players.len());
                store.players.push(record);
            }
        }
        store
    }

    pub fn records(&self) -> &[PlayerData] {
        &self.players
    }

    pub fn lobby(&self) -> Option<&Position> {
        self.lobby.as_ref()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn record_mut(&mut self, name: &PlayerName) -> Option<&mut PlayerData> {
        let idx = *self.index.get(name)?;
        self.players.get_mut(idx)
    }
}

impl PlayerStore for MemoryStore {
    fn upsert_player(&mut self, name: &PlayerName) -> Result<bool, StoreError> {
        if self.index.contains_key(name) {
            return Ok(false);
        }
        self.index.insert(name.clone(), self.players.len());
        self.players.push(PlayerData::new(name.clone()));
        Ok(true)
    }

    fn fetch_player(&mut self, name: &PlayerName) -> Result<Option<PlayerData>, StoreError> {
        Ok(self.index.get(name).map(|&idx| self.players[idx].clone()))
    }

    fn top_entries(&mut self, limit: usize) -> Result<Vec<PlayerData>, StoreError> {
        let mut ranked: Vec<&PlayerData> = self.players.iter().collect();
        // Stable: equal win counts stay in insertion order.
        ranked.sort_by(|a, b| b.wins.cmp(&a.wins));
        Ok(ranked.into_iter().take(limit).cloned().collect())
    }

    fn apply_change(&mut self, name: &PlayerName, change: StatChange) -> Result<(), StoreError> {
        if let Some(record) = self.record_mut(name) {
            record.apply(change);
        }
        Ok(())
    }

    fn set_permissions(
        &mut self,
        name: &PlayerName,
        permissions: &[String],
    ) -> Result<(), StoreError> {
        if let Some(record) = self.record_mut(name) {
            record.permissions = permissions.to_vec();
        }
        Ok(())
    }

    fn set_lobby(&mut self, lobby: &Position) -> Result<(), StoreError> {
        self.lobby = Some(lobby.clone());
        Ok(())
    }

    fn load_lobby(&mut self) -> Result<Option<Position>, StoreError> {
        Ok(self.lobby.clone())
    }
}
