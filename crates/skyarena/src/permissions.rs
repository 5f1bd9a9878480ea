//! Per-player permission attachments.
//!
//! An attachment is created when a player joins and dropped when they
//! quit. Its contents arrive later, from a gateway `fetch`; a result
//! that lands after the player already left is discarded.

use std::collections::HashMap;

use skyarena_protocol::PlayerName;
use skyarena_store::{PlayerData, StoreError};

use crate::SkyArenaError;

#[derive(Debug, Default)]
struct Attachment {
    permissions: Vec<String>,
    loaded: bool,
}

/// Permission attachments for online players.
#[derive(Debug, Default)]
pub struct PermissionCache {
    attachments: HashMap<PlayerName, Attachment>,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty attachment for a joining player.
    pub fn attach(&mut self, player: PlayerName) {
        self.attachments.entry(player).or_default();
    }

    /// Drops the player's attachment.
    pub fn detach(&mut self, player: &PlayerName) {
        self.attachments.remove(player);
    }

    pub fn is_attached(&self, player: &PlayerName) -> bool {
        self.attachments.contains_key(player)
    }

    /// Whether stored permissions have arrived for this player.
    pub fn is_loaded(&self, player: &PlayerName) -> bool {
        self.attachments.get(player).is_some_and(|a| a.loaded)
    }

    /// Applies the result of a `fetch` issued on join.
    pub fn apply_fetched(&mut self, player: &PlayerName, result: Result<Option<PlayerData>, StoreError>) {
        let Some(attachment) = self.attachments.get_mut(player) else {
            tracing::debug!(%player, "permissions arrived after quit, ignored");
            return;
        };
        match result {
            Ok(Some(data)) => {
                // Grants made since join stay; stored ones go first.
                let mut merged = data.permissions;
                for perm in attachment.permissions.drain(..) {
                    if !merged.contains(&perm) {
                        merged.push(perm);
                    }
                }
                attachment.permissions = merged;
                attachment.loaded = true;
                tracing::debug!(%player, count = attachment.permissions.len(), "permissions loaded");
            }
            Ok(None) => attachment.loaded = true,
            // Already logged by the gateway.
            Err(_) => {}
        }
    }

    /// Grants a permission to an online player.
    pub fn add_permission(&mut self, player: &PlayerName, permission: &str) -> Result<(), SkyArenaError> {
        let attachment = self
            .attachments
            .get_mut(player)
            .ok_or_else(|| SkyArenaError::NotAttached(player.clone()))?;
        if !attachment.permissions.iter().any(|p| p == permission) {
            attachment.permissions.push(permission.to_string());
        }
        Ok(())
    }

    pub fn has_permission(&self, player: &PlayerName, permission: &str) -> bool {
        self.attachments
            .get(player)
            .is_some_and(|a| a.permissions.iter().any(|p| p == permission))
    }

    pub fn permissions(&self, player: &PlayerName) -> Option<&[String]> {
        self.attachments.get(player).map(|a| a.permissions.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steve() -> PlayerName {
        PlayerName::from("Steve")
    }

    fn stored(perms: &[&str]) -> Result<Option<PlayerData>, StoreError> {
        let mut data = PlayerData::new(steve());
        data.permissions = perms.iter().map(|p| p.to_string()).collect();
        Ok(Some(data))
    }

    #[test]
    fn test_apply_fetched_loads_permissions() {
        let mut cache = PermissionCache::new();
        cache.attach(steve());
        assert!(!cache.is_loaded(&steve()));

        cache.apply_fetched(&steve(), stored(&["sw.cage.gold"]));

        assert!(cache.is_loaded(&steve()));
        assert!(cache.has_permission(&steve(), "sw.cage.gold"));
    }

    #[test]
    fn test_apply_fetched_after_quit_is_ignored() {
        let mut cache = PermissionCache::new();
        cache.attach(steve());
        cache.detach(&steve());

        cache.apply_fetched(&steve(), stored(&["sw.cage.gold"]));

        assert!(!cache.is_attached(&steve()));
        assert!(!cache.has_permission(&steve(), "sw.cage.gold"));
    }

    #[test]
    fn test_grant_before_load_survives_load() {
        let mut cache = PermissionCache::new();
        cache.attach(steve());
        cache.add_permission(&steve(), "sw.kit.new").unwrap();

        cache.apply_fetched(&steve(), stored(&["sw.cage.gold"]));

        assert_eq!(
            cache.permissions(&steve()).unwrap(),
            ["sw.cage.gold".to_string(), "sw.kit.new".to_string()]
        );
    }

    #[test]
    fn test_add_permission_without_attachment_fails() {
        let mut cache = PermissionCache::new();
        assert!(matches!(
            cache.add_permission(&steve(), "x"),
            Err(SkyArenaError::NotAttached(_))
        ));
    }

    #[test]
    fn test_failed_fetch_leaves_attachment_unloaded() {
        let mut cache = PermissionCache::new();
        cache.attach(steve());
        cache.apply_fetched(&steve(), Err(StoreError::Unavailable));
        assert!(cache.is_attached(&steve()));
        assert!(!cache.is_loaded(&steve()));
    }
}
