//! A single-file JSON backend.
//!
//! The whole dataset is rewritten after every mutation: write to a
//! sibling temp file, then rename over the original. A crash leaves
//! either the old file or the new one, never a torn write.
//!
//! Mutations are staged on a copy of the dataset and only replace it
//! once the write succeeded, so a failed write leaves memory and disk
//! agreeing on the previous state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skyarena_protocol::{BlockPos, PlayerName, Position, WorldName};

use crate::store::MemoryStore;
use crate::{PlayerData, PlayerStore, StatChange, StoreError, decode_permissions, encode_permissions};

/// On-disk layout of one player row.
#[derive(Debug, Serialize, Deserialize)]
struct PlayerRow {
    #[serde(rename = "playerName")]
    player_name: PlayerName,
    time: u64,
    kills: u32,
    deaths: u32,
    wins: u32,
    lost: u32,
    /// Space-delimited permission list.
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LobbyRow {
    world: WorldName,
    x: i32,
    y: i32,
    z: i32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    players: Vec<PlayerRow>,
    #[serde(default)]
    lobby: Option<LobbyRow>,
}

impl From<PlayerRow> for PlayerData {
    fn from(row: PlayerRow) -> Self {
        Self {
            name: row.player_name,
            time_played: row.time,
            kills: row.kills,
            deaths: row.deaths,
            wins: row.wins,
            losses: row.lost,
            permissions: decode_permissions(&row.data),
        }
    }
}

impl From<&PlayerData> for PlayerRow {
    fn from(data: &PlayerData) -> Self {
        Self {
            player_name: data.name.clone(),
            time: data.time_played,
            kills: data.kills,
            deaths: data.deaths,
            wins: data.wins,
            lost: data.losses,
            data: encode_permissions(&data.permissions),
        }
    }
}

/// Persists players and the lobby in one JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Document::default(),
            Ok(text) => serde_json::from_str::<Document>(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };

        let lobby = doc
            .lobby
            .map(|row| Position::new(row.world, BlockPos::new(row.x, row.y, row.z)));
        let inner = MemoryStore::from_records(doc.players.into_iter().map(PlayerData::from), lobby);
        tracing::debug!(path = %path.display(), players = inner.len(), "player store opened");

        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `change` against a staged copy and keeps it only if the
    /// result reaches disk.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut staged = self.inner.clone();
        let out = change(&mut staged)?;
        write_document(&self.path, &staged)?;
        self.inner = staged;
        Ok(out)
    }
}

fn write_document(path: &Path, data: &MemoryStore) -> Result<(), StoreError> {
    let doc = Document {
        players: data.records().iter().map(PlayerRow::from).collect(),
        lobby: data.lobby().map(|p| LobbyRow {
            world: p.world.clone(),
            x: p.pos.x,
            y: p.pos.y,
            z: p.pos.z,
        }),
    };
    let text = serde_json::to_string_pretty(&doc)?;

    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl PlayerStore for JsonFileStore {
    fn upsert_player(&mut self, name: &PlayerName) -> Result<bool, StoreError> {
        if self.inner.fetch_player(name)?.is_some() {
            return Ok(false);
        }
        self.commit(|data| data.upsert_player(name))
    }

    fn fetch_player(&mut self, name: &PlayerName) -> Result<Option<PlayerData>, StoreError> {
        self.inner.fetch_player(name)
    }

    fn top_entries(&mut self, limit: usize) -> Result<Vec<PlayerData>, StoreError> {
        self.inner.top_entries(limit)
    }

    fn apply_change(&mut self, name: &PlayerName, change: StatChange) -> Result<(), StoreError> {
        self.commit(|data| data.apply_change(name, change))
    }

    fn set_permissions(
        &mut self,
        name: &PlayerName,
        permissions: &[String],
    ) -> Result<(), StoreError> {
        self.commit(|data| data.set_permissions(name, permissions))
    }

    fn set_lobby(&mut self, lobby: &Position) -> Result<(), StoreError> {
        self.commit(|data| data.set_lobby(lobby))
    }

    fn load_lobby(&mut self) -> Result<Option<Position>, StoreError> {
        self.inner.load_lobby()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        write_document(&self.path, &self.inner)
    }
}
