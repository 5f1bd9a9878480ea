//! Who is online, where they stand, and since when.

use std::collections::BTreeMap;
use std::time::Instant;

use skyarena_protocol::{PlayerName, WorldName};

#[derive(Debug, Clone)]
pub struct OnlinePlayer {
    pub world: WorldName,
    pub moderator: bool,
    pub joined_at: Instant,
}

#[derive(Debug, Default)]
pub struct Presence {
    players: BTreeMap<PlayerName, OnlinePlayer>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a join. A repeated join replaces the old entry.
    pub fn join(&mut self, player: PlayerName, world: WorldName, moderator: bool) {
        self.players.insert(
            player,
            OnlinePlayer {
                world,
                moderator,
                joined_at: Instant::now(),
            },
        );
    }

    /// Removes the player and returns what was known about them.
    pub fn quit(&mut self, player: &PlayerName) -> Option<OnlinePlayer> {
        self.players.remove(player)
    }

    pub fn move_to(&mut self, player: &PlayerName, world: WorldName) {
        if let Some(online) = self.players.get_mut(player) {
            online.world = world;
        }
    }

    pub fn get(&self, player: &PlayerName) -> Option<&OnlinePlayer> {
        self.players.get(player)
    }

    pub fn world_of(&self, player: &PlayerName) -> Option<&WorldName> {
        self.players.get(player).map(|online| &online.world)
    }

    pub fn is_online(&self, player: &PlayerName) -> bool {
        self.players.contains_key(player)
    }

    /// Online moderators in name order.
    pub fn moderators(&self) -> impl Iterator<Item = &PlayerName> {
        self.players
            .iter()
            .filter(|(_, online)| online.moderator)
            .map(|(name, _)| name)
    }

    /// Online players standing in `world`, in name order.
    pub fn in_world<'a>(&'a self, world: &'a WorldName) -> impl Iterator<Item = &'a PlayerName> + 'a {
        self.players
            .iter()
            .filter(move |(_, online)| online.world == *world)
            .map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
