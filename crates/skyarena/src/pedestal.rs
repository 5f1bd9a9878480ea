//! The lobby leaderboard.
//!
//! The server asks the gateway for the top players on a fixed cadence.
//! At most one request is in flight: [`Pedestal::begin_refresh`] refuses
//! a second one until [`Pedestal::finish_refresh`] runs.

use std::collections::BTreeSet;

use skyarena_protocol::{PlayerName, WorldName};
use skyarena_store::{PlayerData, StoreError};

/// Podium places that are always filled.
pub const PODIUM_PLACES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PedestalEntry {
    pub name: PlayerName,
    pub wins: u32,
    /// A filler shown until enough real players have records.
    pub placeholder: bool,
}

impl PedestalEntry {
    fn placeholder(place: usize) -> Self {
        Self {
            name: PlayerName::new(format!("Example-{place}")),
            wins: 0,
            placeholder: true,
        }
    }
}

#[derive(Debug)]
pub struct Pedestal {
    world: WorldName,
    entries: Vec<PedestalEntry>,
    fetching: bool,
    refreshes: u64,
    viewers: BTreeSet<PlayerName>,
}

impl Pedestal {
    /// A leaderboard standing in `world`, showing placeholders until the
    /// first refresh lands.
    pub fn new(world: WorldName) -> Self {
        Self {
            world,
            entries: build_entries(Vec::new()),
            fetching: false,
            refreshes: 0,
            viewers: BTreeSet::new(),
        }
    }

    pub fn world(&self) -> &WorldName {
        &self.world
    }

    /// Moves the pedestal to `world`. `present` are the players already
    /// standing there; they become the viewers.
    pub fn set_world<'a>(&mut self, world: WorldName, present: impl IntoIterator<Item = &'a PlayerName>) {
        if world != self.world {
            self.world = world;
            self.viewers = present.into_iter().cloned().collect();
        }
    }

    // -- refresh ------------------------------------------------------------

    /// Marks a refresh as in flight. Returns `false` if one already is,
    /// in which case the caller must not issue another request.
    pub fn begin_refresh(&mut self) -> bool {
        if self.fetching {
            tracing::debug!("pedestal refresh already in flight, dropped");
            return false;
        }
        self.fetching = true;
        true
    }

    /// Applies a finished refresh. A failed one keeps the old entries.
    pub fn finish_refresh(&mut self, result: Result<Vec<PlayerData>, StoreError>) {
        self.fetching = false;
        match result {
            Ok(players) => {
                self.entries = build_entries(players);
                self.refreshes += 1;
            }
            Err(e) => tracing::warn!(error = %e, "pedestal refresh failed, keeping old entries"),
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Successful refreshes so far.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// The entry at a 1-based podium rank.
    pub fn entry(&self, rank: usize) -> Option<&PedestalEntry> {
        rank.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn entries(&self) -> &[PedestalEntry] {
        &self.entries
    }

    // -- viewers ------------------------------------------------------------

    /// Tracks a player entering `world`. Returns whether they now see
    /// the pedestal.
    pub fn on_enter(&mut self, player: &PlayerName, world: &WorldName) -> bool {
        if *world == self.world {
            self.viewers.insert(player.clone());
            true
        } else {
            self.viewers.remove(player);
            false
        }
    }

    /// Tracks a player leaving `world`.
    pub fn on_leave(&mut self, player: &PlayerName, world: &WorldName) {
        if *world == self.world {
            self.viewers.remove(player);
        }
    }

    pub fn forget(&mut self, player: &PlayerName) {
        self.viewers.remove(player);
    }

    pub fn viewers(&self) -> impl Iterator<Item = &PlayerName> {
        self.viewers.iter()
    }

    pub fn is_viewing(&self, player: &PlayerName) -> bool {
        self.viewers.contains(player)
    }
}

/// Orders by wins (stable, so store order breaks ties) and pads the
/// podium with placeholders when fewer than three real players exist.
fn build_entries(players: Vec<PlayerData>) -> Vec<PedestalEntry> {
    let mut entries: Vec<PedestalEntry> = players
        .into_iter()
        .map(|data| PedestalEntry {
            name: data.name,
            wins: data.wins,
            placeholder: false,
        })
        .collect();
    entries.sort_by(|a, b| b.wins.cmp(&a.wins));
    for place in entries.len()..PODIUM_PLACES {
        entries.push(PedestalEntry::placeholder(place + 1));
    }
    entries
}
