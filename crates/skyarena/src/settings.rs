//! Server settings, loaded once at startup from YAML.
//!
//! Every field has a default, so an empty or partial file is valid:
//!
//! ```yaml
//! data-dir: skyarena
//! worlds-dir: worlds
//! tick-rate-hz: 20
//! pool: { max-workers: 2, idle-timeout-secs: 300 }
//! storage: { backend: json, path: players.json }
//! default-spawn: { world: world, pos: { x: 0, y: 64, z: 0 } }
//! cages:
//!   gold: { cage-name: Gold Cage, cage-price: 500, permission: sw.cage.gold }
//! kits:
//!   - { name: archer, permission: sw.internal.archer }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyarena_protocol::{BlockPos, Position};
use skyarena_tick::TickConfig;
use skyarena_worker::PoolConfig;

use crate::SkyArenaError;

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerSettings {
    /// Root for everything the server writes.
    pub data_dir: PathBuf,
    /// Arena documents. Defaults to `<data_dir>/arenas`.
    pub arenas_dir: Option<PathBuf>,
    /// Where the host keeps world folders.
    pub worlds_dir: PathBuf,
    /// Replaces the bundled arena template.
    pub arena_template: Option<PathBuf>,
    pub tick_rate_hz: u32,
    pub pool: PoolSettings,
    /// Idle-worker reclamation and memory sweep period.
    pub maintenance_interval_secs: u64,
    /// Leaderboard refresh period.
    pub pedestal_refresh_secs: u64,
    /// How many top players the leaderboard asks for.
    pub leaderboard_size: usize,
    pub storage: StorageSettings,
    /// Lobby used when none has been stored yet.
    pub default_spawn: Position,
    /// Cage catalog keyed by cage id.
    pub cages: BTreeMap<String, CageSettings>,
    pub kits: Vec<KitSettings>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("skyarena"),
            arenas_dir: None,
            worlds_dir: PathBuf::from("worlds"),
            arena_template: None,
            tick_rate_hz: 20,
            pool: PoolSettings::default(),
            maintenance_interval_secs: 30 * 60,
            pedestal_refresh_secs: 16,
            leaderboard_size: 5,
            storage: StorageSettings::default(),
            default_spawn: Position::new("world", BlockPos::ORIGIN),
            cages: BTreeMap::new(),
            kits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PoolSettings {
    pub max_workers: usize,
    pub idle_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_workers: 2,
            idle_timeout_secs: 5 * 60,
        }
    }
}

/// Which player store backs the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StorageSettings {
    /// Nothing survives a restart.
    Memory,
    /// One JSON file. Relative paths are under `data_dir`.
    Json { path: PathBuf },
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self::Json {
            path: PathBuf::from("players.json"),
        }
    }
}

/// One cage in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CageSettings {
    pub cage_name: String,
    #[serde(default)]
    pub cage_price: u64,
    pub permission: String,
    #[serde(default)]
    pub cage_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitSettings {
    pub name: String,
    pub permission: String,
}

impl ServerSettings {
    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SkyArenaError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "settings file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text).map_err(|source| SkyArenaError::Settings {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Parses settings from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, SkyArenaError> {
        Self::parse(yaml).map_err(|source| SkyArenaError::Settings { path: None, source })
    }

    fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn arenas_dir(&self) -> PathBuf {
        self.arenas_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("arenas"))
    }

    /// Path of the JSON store, if that backend is selected.
    pub fn storage_path(&self) -> Option<PathBuf> {
        match &self.storage {
            StorageSettings::Memory => None,
            StorageSettings::Json { path } if path.is_absolute() => Some(path.clone()),
            StorageSettings::Json { path } => Some(self.data_dir.join(path)),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_workers: self.pool.max_workers,
            idle_timeout: Duration::from_secs(self.pool.idle_timeout_secs),
            ..PoolConfig::default()
        }
    }

    pub fn tick_config(&self) -> TickConfig {
        TickConfig::with_rate(self.tick_rate_hz)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn pedestal_refresh(&self) -> Duration {
        Duration::from_secs(self.pedestal_refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ServerSettings::from_yaml("").unwrap(), ServerSettings::default());
    }

    #[test]
    fn test_default_cadences() {
        let settings = ServerSettings::default();
        let ticks = settings.tick_config();
        assert_eq!(ticks.ticks_for(settings.maintenance_interval()), 30 * 60 * 20);
        assert_eq!(ticks.ticks_for(settings.pedestal_refresh()), 16 * 20);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let settings = ServerSettings::from_yaml(
            "tick-rate-hz: 10\npool:\n  max-workers: 4\nstorage:\n  backend: memory\n",
        )
        .unwrap();

        assert_eq!(settings.tick_rate_hz, 10);
        assert_eq!(settings.pool.max_workers, 4);
        assert_eq!(settings.pool.idle_timeout_secs, 300);
        assert_eq!(settings.storage, StorageSettings::Memory);
        assert_eq!(settings.storage_path(), None);
        assert_eq!(settings.leaderboard_size, 5);
    }

    #[test]
    fn test_paths_resolve_under_data_dir() {
        let settings = ServerSettings::from_yaml("data-dir: /srv/sw\n").unwrap();
        assert_eq!(settings.arenas_dir(), PathBuf::from("/srv/sw/arenas"));
        assert_eq!(settings.storage_path(), Some(PathBuf::from("/srv/sw/players.json")));
    }

    #[test]
    fn test_cage_catalog_keys() {
        let settings = ServerSettings::from_yaml(
            "cages:\n  gold:\n    cage-name: Gold Cage\n    cage-price: 500\n    permission: sw.cage.gold\n",
        )
        .unwrap();
        let gold = &settings.cages["gold"];
        assert_eq!(gold.cage_name, "Gold Cage");
        assert_eq!(gold.cage_price, 500);
        assert!(!gold.cage_default);
    }

    #[test]
    fn test_invalid_yaml_is_settings_error() {
        let err = ServerSettings::from_yaml("tick-rate-hz: [nope").unwrap_err();
        assert!(matches!(err, SkyArenaError::Settings { path: None, .. }));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = ServerSettings::load(&tmp.path().join("absent.yml")).unwrap();
        assert_eq!(settings, ServerSettings::default());
    }
}
