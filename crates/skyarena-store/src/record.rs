//! The player data record and its storage encoding.

use serde::{Deserialize, Serialize};
use skyarena_protocol::PlayerName;

/// One player's persistent statistics.
///
/// Created on first login, mutated by independent increments, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    pub name: PlayerName,
    /// Accumulated play time in seconds.
    pub time_played: u64,
    pub kills: u32,
    pub deaths: u32,
    pub wins: u32,
    pub losses: u32,
    /// Granted permissions, in the order they were granted.
    pub permissions: Vec<String>,
}

impl PlayerData {
    /// A fresh record with every counter at zero.
    pub fn new(name: PlayerName) -> Self {
        Self {
            name,
            time_played: 0,
            kills: 0,
            deaths: 0,
            wins: 0,
            losses: 0,
            permissions: Vec::new(),
        }
    }

    /// Applies a counter change.
    pub fn apply(&mut self, change: StatChange) {
        match change {
            StatChange::Kill => self.kills = self.kills.saturating_add(1),
            StatChange::Death => {
                // A death ends the round for the player, so it is also a loss.
                self.deaths = self.deaths.saturating_add(1);
                self.losses = self.losses.saturating_add(1);
            }
            StatChange::Win => self.wins = self.wins.saturating_add(1),
            StatChange::PlayedTime(secs) => {
                self.time_played = self.time_played.saturating_add(secs);
            }
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// An increment applied to a player's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatChange {
    Kill,
    /// Counts a death and a loss.
    Death,
    Win,
    /// Seconds to add to the play time.
    PlayedTime(u64),
}

/// Encodes permissions the way they are stored: space-delimited.
pub fn encode_permissions(permissions: &[String]) -> String {
    permissions.join(" ")
}

/// Parses a stored permission string. Empty or blank input is an empty list.
pub fn decode_permissions(stored: &str) -> Vec<String> {
    stored.split_whitespace().map(str::to_string).collect()
}
