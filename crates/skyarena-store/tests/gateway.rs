//! Integration tests for the storage gateway.
//!
//! Callbacks write into a plain struct standing in for main-context
//! state; `drain` plays the role of the tick loop's collect phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use skyarena_protocol::{BlockPos, PlayerName, Position};
use skyarena_store::{
    Gateway, MemoryStore, PlayerData, PlayerStore, StatChange, StoreError, discard,
};

// =========================================================================
// Helpers
// =========================================================================

#[derive(Default)]
struct MainContext {
    fetched: Vec<Option<PlayerData>>,
    errors: Vec<String>,
    acks: usize,
    lobby: Option<Position>,
    order: Vec<&'static str>,
}

async fn drain(gateway: &mut Gateway<MainContext>, ctx: &mut MainContext) {
    while let Some(done) = gateway.next_resolved().await {
        done.dispatch(ctx);
    }
}

fn steve() -> PlayerName {
    PlayerName::from("Steve")
}

fn record_fetch(ctx: &mut MainContext, result: Result<Option<PlayerData>, StoreError>) {
    match result {
        Ok(data) => ctx.fetched.push(data),
        Err(e) => ctx.errors.push(e.to_string()),
    }
}

fn ack(ctx: &mut MainContext, result: Result<(), StoreError>) {
    match result {
        Ok(()) => ctx.acks += 1,
        Err(e) => ctx.errors.push(e.to_string()),
    }
}

/// A memory store whose mutations fail while `broken` is set.
struct FlakyStore {
    inner: MemoryStore,
    broken: Arc<AtomicBool>,
}

impl FlakyStore {
    fn new() -> (Self, Arc<AtomicBool>) {
        let broken = Arc::new(AtomicBool::new(false));
        let store = Self {
            inner: MemoryStore::new(),
            broken: Arc::clone(&broken),
        };
        (store, broken)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.broken.load(Ordering::SeqCst) {
            Err(StoreError::Backend("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

impl PlayerStore for FlakyStore {
    fn upsert_player(&mut self, name: &PlayerName) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.upsert_player(name)
    }

    fn fetch_player(&mut self, name: &PlayerName) -> Result<Option<PlayerData>, StoreError> {
        self.inner.fetch_player(name)
    }

    fn top_entries(&mut self, limit: usize) -> Result<Vec<PlayerData>, StoreError> {
        self.inner.top_entries(limit)
    }

    fn apply_change(&mut self, name: &PlayerName, change: StatChange) -> Result<(), StoreError> {
        self.check()?;
        self.inner.apply_change(name, change)
    }

    fn set_permissions(&mut self, name: &PlayerName, perms: &[String]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set_permissions(name, perms)
    }

    fn set_lobby(&mut self, lobby: &Position) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set_lobby(lobby)
    }

    fn load_lobby(&mut self) -> Result<Option<Position>, StoreError> {
        self.inner.load_lobby()
    }
}

// =========================================================================
// Player records
// =========================================================================

#[tokio::test]
async fn test_fetch_unknown_player_resolves_none() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();

    gateway.fetch(steve(), record_fetch);
    drain(&mut gateway, &mut ctx).await;

    assert_eq!(ctx.fetched, vec![None]);
}

#[tokio::test]
async fn test_increment_kills_then_fetch_reflects_change() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();

    gateway.upsert_player(steve(), discard);
    gateway.increment_kills(steve(), ack);
    gateway.increment_kills(steve(), discard);
    gateway.fetch(steve(), record_fetch);
    drain(&mut gateway, &mut ctx).await;

    let data = ctx.fetched[0].as_ref().expect("record exists");
    assert_eq!(data.kills, 2);
    assert_eq!(ctx.acks, 1);
}

#[tokio::test]
async fn test_increment_deaths_counts_loss() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();

    gateway.upsert_player(steve(), discard);
    gateway.increment_deaths(steve(), discard);
    gateway.add_played_time(steve(), 45, discard);
    gateway.fetch(steve(), record_fetch);
    drain(&mut gateway, &mut ctx).await;

    let data = ctx.fetched[0].as_ref().unwrap();
    assert_eq!((data.deaths, data.losses, data.time_played), (1, 1, 45));
}

#[tokio::test]
async fn test_upsert_player_twice_keeps_stats() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();

    gateway.upsert_player(steve(), |ctx: &mut MainContext, r| {
        assert_eq!(r.unwrap(), true);
        ctx.acks += 1;
    });
    gateway.increment_wins(steve(), discard);
    gateway.upsert_player(steve(), |ctx: &mut MainContext, r| {
        assert_eq!(r.unwrap(), false);
        ctx.acks += 1;
    });
    gateway.fetch(steve(), record_fetch);
    drain(&mut gateway, &mut ctx).await;

    assert_eq!(ctx.acks, 2);
    assert_eq!(ctx.fetched[0].as_ref().unwrap().wins, 1);
}

#[tokio::test]
async fn test_callbacks_run_in_submission_order() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();

    gateway.upsert_player(steve(), |ctx: &mut MainContext, _| ctx.order.push("upsert"));
    gateway.increment_wins(steve(), |ctx: &mut MainContext, _| ctx.order.push("win"));
    gateway.fetch(steve(), |ctx: &mut MainContext, _| ctx.order.push("fetch"));
    drain(&mut gateway, &mut ctx).await;

    assert_eq!(ctx.order, vec!["upsert", "win", "fetch"]);
}

#[tokio::test]
async fn test_set_permissions_round_trips() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();

    gateway.upsert_player(steve(), discard);
    gateway.set_permissions(steve(), vec!["sw.cage.gold".into(), "sw.kit.archer".into()], ack);
    gateway.fetch(steve(), record_fetch);
    drain(&mut gateway, &mut ctx).await;

    let data = ctx.fetched[0].as_ref().unwrap();
    assert_eq!(data.permissions, vec!["sw.cage.gold", "sw.kit.archer"]);
}

#[tokio::test]
async fn test_fetch_top_entries_orders_by_wins() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();
    for (name, wins) in [("a", 2), ("b", 5), ("c", 0), ("d", 5)] {
        gateway.upsert_player(PlayerName::from(name), discard);
        for _ in 0..wins {
            gateway.increment_wins(PlayerName::from(name), discard);
        }
    }

    gateway.fetch_top_entries(3, |ctx: &mut MainContext, result| {
        for data in result.unwrap() {
            ctx.fetched.push(Some(data));
        }
    });
    drain(&mut gateway, &mut ctx).await;

    let names: Vec<String> = ctx
        .fetched
        .iter()
        .map(|d| d.as_ref().unwrap().name.to_string())
        .collect();
    assert_eq!(names, vec!["b", "d", "a"]);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn test_failed_mutation_fires_error_once_and_leaves_state() {
    let (store, broken) = FlakyStore::new();
    let mut gateway = Gateway::spawn(store).unwrap();
    let mut ctx = MainContext::default();
    gateway.upsert_player(steve(), discard);
    drain(&mut gateway, &mut ctx).await;

    broken.store(true, Ordering::SeqCst);
    gateway.increment_kills(steve(), ack);
    drain(&mut gateway, &mut ctx).await;

    broken.store(false, Ordering::SeqCst);
    gateway.fetch(steve(), record_fetch);
    drain(&mut gateway, &mut ctx).await;

    assert_eq!(ctx.errors.len(), 1);
    assert!(ctx.errors[0].contains("connection reset"));
    assert_eq!(ctx.acks, 0);
    assert_eq!(ctx.fetched[0].as_ref().unwrap().kills, 0);
}

#[tokio::test]
async fn test_calls_after_shutdown_resolve_unavailable() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();
    gateway.upsert_player(steve(), discard);
    for done in gateway.shutdown() {
        done.dispatch(&mut ctx);
    }
    assert_eq!(gateway.pending_calls(), 0);

    gateway.increment_kills(steve(), ack);
    let resolved = gateway.collect();

    assert_eq!(resolved.len(), 1);
    assert!(!resolved[0].is_ok());
    for done in resolved {
        done.dispatch(&mut ctx);
    }
    assert_eq!(ctx.errors, vec![StoreError::Unavailable.to_string()]);
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_get_lobby_before_load_is_error() {
    let gateway: Gateway<MainContext> = Gateway::spawn(MemoryStore::new()).unwrap();
    assert!(matches!(gateway.get_lobby(), Err(StoreError::LobbyNotLoaded)));
}

#[tokio::test]
async fn test_load_lobby_falls_back_to_default() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();
    let default = Position::new("world", BlockPos::new(0, 64, 0));

    gateway.load_lobby(default.clone(), |ctx: &mut MainContext, result| {
        ctx.lobby = result.ok();
    });
    assert!(!gateway.is_lobby_loaded(), "cache fills only after collect");
    drain(&mut gateway, &mut ctx).await;

    assert_eq!(gateway.get_lobby().unwrap(), &default);
    assert_eq!(ctx.lobby, Some(default));
}

#[tokio::test]
async fn test_set_lobby_updates_cache_and_storage() {
    let mut gateway = Gateway::spawn(MemoryStore::new()).unwrap();
    let mut ctx = MainContext::default();
    let hub = Position::new("hub", BlockPos::new(10, 80, -4));

    gateway.set_lobby(hub.clone(), ack);
    drain(&mut gateway, &mut ctx).await;
    assert_eq!(gateway.get_lobby().unwrap(), &hub);

    // A later load prefers the stored lobby over the default.
    gateway.load_lobby(Position::new("world", BlockPos::ORIGIN), discard);
    drain(&mut gateway, &mut ctx).await;
    assert_eq!(gateway.get_lobby().unwrap(), &hub);
}

#[tokio::test]
async fn test_failed_set_lobby_keeps_previous_cache() {
    let (store, broken) = FlakyStore::new();
    let mut gateway = Gateway::spawn(store).unwrap();
    let mut ctx = MainContext::default();
    let hub = Position::new("hub", BlockPos::new(1, 2, 3));
    gateway.set_lobby(hub.clone(), discard);
    drain(&mut gateway, &mut ctx).await;

    broken.store(true, Ordering::SeqCst);
    gateway.set_lobby(Position::new("elsewhere", BlockPos::ORIGIN), ack);
    drain(&mut gateway, &mut ctx).await;

    assert_eq!(gateway.get_lobby().unwrap(), &hub);
    assert_eq!(ctx.errors.len(), 1);
}
