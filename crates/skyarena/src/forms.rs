//! One open form per player.
//!
//! The host shows forms (menus, prompts) one at a time. A second form
//! for a player with one still open is refused until the first is
//! answered or the player quits.

use std::collections::HashMap;

use skyarena_protocol::PlayerName;

use crate::SkyArenaError;

/// The menus the server itself opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Cages,
    Kits,
}

#[derive(Debug)]
pub struct FormQueue<F> {
    open: HashMap<PlayerName, F>,
}

impl<F> Default for FormQueue<F> {
    fn default() -> Self {
        Self {
            open: HashMap::new(),
        }
    }
}

impl<F> FormQueue<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `form` for the player.
    ///
    /// # Errors
    ///
    /// `FormPending` if the player already has a form open; the new form
    /// is dropped.
    pub fn open(&mut self, player: PlayerName, form: F) -> Result<(), SkyArenaError> {
        if self.open.contains_key(&player) {
            tracing::debug!(%player, "form already open, new one dropped");
            return Err(SkyArenaError::FormPending(player));
        }
        self.open.insert(player, form);
        Ok(())
    }

    /// Closes the player's form and hands it back for the response.
    pub fn respond(&mut self, player: &PlayerName) -> Option<F> {
        self.open.remove(player)
    }

    pub fn pending(&self, player: &PlayerName) -> Option<&F> {
        self.open.get(player)
    }

    pub fn has_pending(&self, player: &PlayerName) -> bool {
        self.open.contains_key(player)
    }

    pub fn clear(&mut self, player: &PlayerName) {
        self.open.remove(player);
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
