//! Kit catalog and per-player kit choice.

use std::collections::HashMap;

use skyarena_protocol::PlayerName;

use crate::permissions::PermissionCache;
use crate::settings::KitSettings;
use crate::SkyArenaError;

/// Permission prefix that marks a kit as usable in games.
pub const GAME_KIT_PREFIX: &str = "sw.internal.";

/// Selecting this name clears the player's kit.
pub const NO_KIT: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kit {
    pub name: String,
    pub permission: String,
}

fn is_game_kit(permission: &str) -> bool {
    permission
        .strip_prefix(GAME_KIT_PREFIX)
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

#[derive(Debug, Default)]
pub struct KitManager {
    kits: Vec<Kit>,
    selected: HashMap<PlayerName, String>,
}

impl KitManager {
    /// Keeps only game kits, in settings order.
    pub fn from_settings(settings: &[KitSettings]) -> Self {
        let kits: Vec<Kit> = settings
            .iter()
            .filter(|kit| {
                let keep = is_game_kit(&kit.permission);
                if !keep {
                    tracing::debug!(kit = %kit.name, "not a game kit, skipped");
                }
                keep
            })
            .map(|kit| Kit {
                name: kit.name.clone(),
                permission: kit.permission.clone(),
            })
            .collect();
        Self {
            kits,
            selected: HashMap::new(),
        }
    }

    pub fn kits(&self) -> &[Kit] {
        &self.kits
    }

    pub fn get(&self, name: &str) -> Option<&Kit> {
        self.kits.iter().find(|kit| kit.name == name)
    }

    /// Picks a kit. `"none"` (any case) clears the pick and returns `None`.
    pub fn select(
        &mut self,
        player: &PlayerName,
        name: &str,
        permissions: &PermissionCache,
    ) -> Result<Option<&Kit>, SkyArenaError> {
        if name.eq_ignore_ascii_case(NO_KIT) {
            self.clear(player);
            return Ok(None);
        }
        let index = self
            .kits
            .iter()
            .position(|kit| kit.name == name)
            .ok_or_else(|| SkyArenaError::UnknownKit(name.to_string()))?;
        let kit = &self.kits[index];
        if !permissions.has_permission(player, &kit.permission) {
            return Err(SkyArenaError::Locked {
                player: player.clone(),
                permission: kit.permission.clone(),
            });
        }
        self.selected.insert(player.clone(), kit.name.clone());
        Ok(Some(kit))
    }

    pub fn selected(&self, player: &PlayerName) -> Option<&Kit> {
        self.selected.get(player).and_then(|name| self.get(name))
    }

    pub fn clear(&mut self, player: &PlayerName) {
        self.selected.remove(player);
    }
}
