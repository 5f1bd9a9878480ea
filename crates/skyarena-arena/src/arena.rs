//! A single arena instance: world binding, roster, status, flags.

use std::collections::BTreeMap;
use std::fmt;

use skyarena_protocol::{ArenaName, PlayerName, WorldName};

use crate::{ArenaConfig, ArenaError, ArenaFlag, ArenaFlags, ArenaStatus};

/// How a rostered player takes part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    Alive,
    Spectating,
}

/// Cleanup registered by whatever attached itself to the arena (round
/// timers, listeners, spawned entities). Runs once, during shutdown.
type ShutdownHook = Box<dyn FnOnce(&ArenaName)>;

/// One arena. Owns its configuration document.
pub struct Arena {
    config: ArenaConfig,
    world: Option<WorldName>,
    status: ArenaStatus,
    flags: ArenaFlags,
    roster: BTreeMap<PlayerName, Participation>,
    shutdown_hooks: Vec<ShutdownHook>,
    shut_down: bool,
}

impl Arena {
    /// Builds an arena from its document. An arena whose document is
    /// not enabled starts with the `Disabled` flag.
    pub fn new(config: ArenaConfig) -> Self {
        let flags = ArenaFlags {
            disabled: !config.is_enabled(),
            ..ArenaFlags::default()
        };
        let status = if config.is_enabled() {
            ArenaStatus::Waiting
        } else {
            ArenaStatus::Setup
        };
        Self {
            world: config.arena_world(),
            config,
            status,
            flags,
            roster: BTreeMap::new(),
            shutdown_hooks: Vec::new(),
            shut_down: false,
        }
    }

    pub fn name(&self) -> &ArenaName {
        self.config.name()
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Mutable access to the document. World changes made here take
    /// effect after [`bind_world`](Self::bind_world) or a reload.
    pub fn config_mut(&mut self) -> &mut ArenaConfig {
        &mut self.config
    }

    /// The world this arena plays in.
    pub fn world(&self) -> Option<&WorldName> {
        self.world.as_ref()
    }

    /// Binds the arena to `world` and records it in the document.
    pub fn bind_world(&mut self, world: WorldName) {
        self.config.set_arena_world(&world);
        tracing::debug!(arena = %self.name(), %world, "arena world bound");
        self.world = Some(world);
    }

    pub fn status(&self) -> ArenaStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ArenaStatus) {
        if self.status != status {
            tracing::debug!(arena = %self.name(), from = %self.status, to = %status, "arena status changed");
            self.status = status;
        }
    }

    pub fn flags(&self) -> ArenaFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: ArenaFlag) -> bool {
        self.flags.has(flag)
    }

    pub fn set_flag(&mut self, flag: ArenaFlag, on: bool) {
        self.flags.set(flag, on);
    }

    // -- roster -------------------------------------------------------------

    /// Adds a player as alive.
    pub fn add_player(&mut self, player: PlayerName) -> Result<(), ArenaError> {
        if self.roster.contains_key(&player) {
            return Err(ArenaError::AlreadyInArena(player, self.name().clone()));
        }
        tracing::debug!(arena = %self.name(), %player, "player joined arena");
        self.roster.insert(player, Participation::Alive);
        Ok(())
    }

    /// Moves an alive player to the spectators.
    pub fn set_spectating(&mut self, player: &PlayerName) -> Result<(), ArenaError> {
        match self.roster.get_mut(player) {
            Some(part) => {
                *part = Participation::Spectating;
                Ok(())
            }
            None => Err(ArenaError::NotInArena(player.clone(), self.name().clone())),
        }
    }

    pub fn remove_player(&mut self, player: &PlayerName) -> Result<Participation, ArenaError> {
        self.roster
            .remove(player)
            .ok_or_else(|| ArenaError::NotInArena(player.clone(), self.name().clone()))
    }

    pub fn contains(&self, player: &PlayerName) -> bool {
        self.roster.contains_key(player)
    }

    pub fn participation(&self, player: &PlayerName) -> Option<Participation> {
        self.roster.get(player).copied()
    }

    /// Every rostered player, alive or spectating.
    pub fn players(&self) -> impl Iterator<Item = &PlayerName> {
        self.roster.keys()
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &PlayerName> {
        self.roster
            .iter()
            .filter(|(_, part)| **part == Participation::Alive)
            .map(|(name, _)| name)
    }

    pub fn player_count(&self) -> usize {
        self.roster.len()
    }

    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    // -- shutdown -----------------------------------------------------------

    /// Registers cleanup to run when the arena shuts down.
    pub fn on_shutdown<F>(&mut self, hook: F)
    where
        F: FnOnce(&ArenaName) + 'static,
    {
        self.shutdown_hooks.push(Box::new(hook));
    }

    /// Runs the shutdown sequence: empties the roster, then runs every
    /// hook in registration order. Returns the evicted players.
    /// Later calls do nothing.
    pub fn shutdown(&mut self) -> Vec<PlayerName> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;

        let evicted: Vec<PlayerName> = std::mem::take(&mut self.roster).into_keys().collect();
        let name = self.name().clone();
        for hook in self.shutdown_hooks.drain(..) {
            hook(&name);
        }
        tracing::info!(arena = %name, evicted = evicted.len(), "arena shut down");
        evicted
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("name", self.name())
            .field("world", &self.world)
            .field("status", &self.status)
            .field("flags", &self.flags)
            .field("players", &self.roster.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn arena(yaml: &str) -> Arena {
        Arena::new(ArenaConfig::parse("arenas/a.yml", yaml).unwrap())
    }

    fn p(s: &str) -> PlayerName {
        PlayerName::from(s)
    }

    #[test]
    fn test_new_disabled_document_sets_flag() {
        let a = arena("arena-name: a\n");
        assert!(a.has_flag(ArenaFlag::Disabled));
        assert_eq!(a.status(), ArenaStatus::Setup);

        let b = arena("arena-name: b\nenabled: true\narena:\n  arena-world: w\n");
        assert!(!b.flags().any());
        assert_eq!(b.status(), ArenaStatus::Waiting);
        assert_eq!(b.world(), Some(&WorldName::from("w")));
    }

    #[test]
    fn test_roster_alive_is_subset_of_all() {
        let mut a = arena("arena-name: a\n");
        a.add_player(p("x")).unwrap();
        a.add_player(p("y")).unwrap();
        a.set_spectating(&p("y")).unwrap();

        assert_eq!(a.player_count(), 2);
        assert_eq!(a.alive_count(), 1);
        assert_eq!(a.alive_players().collect::<Vec<_>>(), vec![&p("x")]);
        assert_eq!(a.participation(&p("y")), Some(Participation::Spectating));
    }

    #[test]
    fn test_add_player_twice_is_error() {
        let mut a = arena("arena-name: a\n");
        a.add_player(p("x")).unwrap();
        assert!(matches!(a.add_player(p("x")), Err(ArenaError::AlreadyInArena(..))));
    }

    #[test]
    fn test_remove_unknown_player_is_error() {
        let mut a = arena("arena-name: a\n");
        assert!(matches!(a.remove_player(&p("ghost")), Err(ArenaError::NotInArena(..))));
        assert!(a.set_spectating(&p("ghost")).is_err());
    }

    #[test]
    fn test_bind_world_updates_document() {
        let mut a = arena("arena-name: a\n");
        a.bind_world(WorldName::from("sky"));
        assert_eq!(a.world(), Some(&WorldName::from("sky")));
        assert_eq!(a.config().arena_world(), Some(WorldName::from("sky")));
    }

    #[test]
    fn test_shutdown_runs_hooks_once_and_evicts() {
        let mut a = arena("arena-name: a\n");
        let calls = Rc::new(RefCell::new(Vec::new()));
        for tag in ["timer", "listener"] {
            let calls = Rc::clone(&calls);
            a.on_shutdown(move |name| calls.borrow_mut().push(format!("{tag}:{name}")));
        }
        a.add_player(p("x")).unwrap();

        let evicted = a.shutdown();
        let again = a.shutdown();

        assert_eq!(evicted, vec![p("x")]);
        assert!(again.is_empty());
        assert_eq!(*calls.borrow(), vec!["timer:a", "listener:a"]);
        assert!(a.is_shut_down());
        assert_eq!(a.player_count(), 0);
    }
}
