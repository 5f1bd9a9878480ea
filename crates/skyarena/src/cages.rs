//! Spawn cages: the catalog and each player's pick.
//!
//! A cage is free when its permission is empty. Otherwise the player
//! must hold the permission, or buy it; buying goes through the server
//! because it needs the store and the economy.

use std::collections::{BTreeMap, HashMap};

use skyarena_protocol::PlayerName;

use crate::permissions::PermissionCache;
use crate::settings::CageSettings;
use crate::SkyArenaError;

/// Key of the cage synthesized when the catalog names no default.
pub const FALLBACK_CAGE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cage {
    pub key: String,
    pub name: String,
    pub price: u64,
    /// Empty for free cages.
    pub permission: String,
    pub default: bool,
}

impl Cage {
    pub fn is_free(&self) -> bool {
        self.permission.is_empty()
    }

    fn from_settings(key: &str, settings: &CageSettings) -> Self {
        Self {
            key: key.to_string(),
            name: settings.cage_name.clone(),
            price: settings.cage_price,
            permission: settings.permission.clone(),
            default: settings.cage_default,
        }
    }

    fn fallback() -> Self {
        Self {
            key: FALLBACK_CAGE.to_string(),
            name: "Default Cage".to_string(),
            price: 0,
            permission: String::new(),
            default: true,
        }
    }
}

/// Outcome of [`CageManager::choose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CageChoice {
    /// The cage is now the player's.
    Selected,
    /// The player has to buy the cage first.
    NeedsPurchase(Cage),
}

#[derive(Debug)]
pub struct CageManager {
    cages: BTreeMap<String, Cage>,
    default_key: String,
    selected: HashMap<PlayerName, String>,
}

impl CageManager {
    /// Builds the catalog. The first cage (in key order) marked default
    /// becomes the default and is always free; with none marked, a free
    /// "Default Cage" is added.
    pub fn from_settings(settings: &BTreeMap<String, CageSettings>) -> Self {
        let mut cages = BTreeMap::new();
        let mut default_key = None;
        for (key, entry) in settings {
            let mut cage = Cage::from_settings(key, entry);
            if cage.default {
                if default_key.is_none() {
                    cage.permission.clear();
                    default_key = Some(key.clone());
                } else {
                    tracing::warn!(cage = %key, "second default cage ignored");
                    cage.default = false;
                }
            }
            cages.insert(key.clone(), cage);
        }

        let default_key = default_key.unwrap_or_else(|| {
            let cage = Cage::fallback();
            let key = cage.key.clone();
            cages.insert(key.clone(), cage);
            key
        });
        tracing::debug!(cages = cages.len(), default = %default_key, "cage catalog loaded");

        Self {
            cages,
            default_key,
            selected: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Cage> {
        self.cages.get(key)
    }

    pub fn cages(&self) -> impl Iterator<Item = &Cage> {
        self.cages.values()
    }

    pub fn default_cage(&self) -> &Cage {
        // The default key is always inserted by `from_settings`.
        &self.cages[&self.default_key]
    }

    /// The player's cage, or the default if they never picked one.
    pub fn cage_of(&self, player: &PlayerName) -> &Cage {
        self.selected
            .get(player)
            .and_then(|key| self.cages.get(key))
            .unwrap_or_else(|| self.default_cage())
    }

    /// Picks a cage for the player if they may use it.
    pub fn choose(
        &mut self,
        player: &PlayerName,
        key: &str,
        permissions: &PermissionCache,
    ) -> Result<CageChoice, SkyArenaError> {
        let cage = self
            .cages
            .get(key)
            .ok_or_else(|| SkyArenaError::UnknownCage(key.to_string()))?;
        if !cage.is_free() && !permissions.has_permission(player, &cage.permission) {
            return Ok(CageChoice::NeedsPurchase(cage.clone()));
        }
        self.assign(player, key);
        Ok(CageChoice::Selected)
    }

    /// Records a pick without checking permissions. Used after a purchase.
    pub(crate) fn assign(&mut self, player: &PlayerName, key: &str) {
        tracing::debug!(%player, cage = key, "cage selected");
        self.selected.insert(player.clone(), key.to_string());
    }

    pub fn clear(&mut self, player: &PlayerName) {
        self.selected.remove(player);
    }
}
