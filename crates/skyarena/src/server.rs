//! `SkyArenaServer`: the main context.
//!
//! The server owns the arena registry, the worker pool, the storage
//! gateway, and every per-player subsystem. All of them are touched only
//! from here: host events, ticks, and the callbacks of pool jobs and
//! storage calls all run with `&mut SkyArenaServer`.
//!
//! ```text
//! host ──HostEvent──▶ handle_event ─┐
//!                                    ├─▶ registry / subsystems ──HostAction──▶ host
//! clock ──tick──▶ run_tick ──────────┘        ▲
//!                   │ collect                 │ callbacks
//!                   ▼                         │
//!          worker pool / storage thread ──────┘
//! ```

use std::fs;
use std::future::Future;
use std::mem;

use skyarena_arena::{Arena, ArenaError, ArenaManager, Deletion};
use skyarena_protocol::{ArenaName, HostAction, HostEvent, PlayerName, Position, WorldName};
use skyarena_store::{discard, Gateway, JsonFileStore, MemoryStore, PlayerData, PlayerStore, StoreError};
use skyarena_tick::{Cadence, TickClock, Timetable};
use skyarena_worker::WorkerPool;
use tokio::sync::mpsc;

use crate::cages::{Cage, CageChoice, CageManager};
use crate::chat::route_chat;
use crate::economy::Economy;
use crate::forms::{FormQueue, Menu};
use crate::kits::{KitManager, NO_KIT};
use crate::pedestal::Pedestal;
use crate::permissions::PermissionCache;
use crate::presence::Presence;
use crate::settings::ServerSettings;
use crate::SkyArenaError;

/// Periodic work, looked up in the timetable each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Dispatch finished pool jobs and storage calls.
    Collect,
    /// Reclaim idle workers and sweep worker memory.
    Maintenance,
    /// Ask storage for the leaderboard.
    Pedestal,
}

pub struct SkyArenaServer {
    settings: ServerSettings,
    clock: TickClock,
    timetable: Timetable<Task>,
    arenas: ArenaManager,
    pool: WorkerPool<SkyArenaServer>,
    gateway: Gateway<SkyArenaServer>,
    presence: Presence,
    permissions: PermissionCache,
    cages: CageManager,
    kits: KitManager,
    pedestal: Pedestal,
    forms: FormQueue<Menu>,
    economy: Box<dyn Economy>,
    outbox: Vec<HostAction>,
    shut_down: bool,
}

impl SkyArenaServer {
    /// Opens the configured store and starts the server.
    pub fn start(settings: ServerSettings, economy: Box<dyn Economy>) -> Result<Self, SkyArenaError> {
        match settings.storage_path() {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let store = JsonFileStore::open(&path)?;
                Self::with_store(settings, store, economy)
            }
            None => Self::with_store(settings, MemoryStore::new(), economy),
        }
    }

    /// Starts the server on top of an already opened store.
    ///
    /// Discovers arenas, spawns the storage thread, and queues the lobby
    /// load and a first leaderboard refresh. Their results land on the
    /// first collect.
    pub fn with_store<S: PlayerStore>(
        settings: ServerSettings,
        store: S,
        economy: Box<dyn Economy>,
    ) -> Result<Self, SkyArenaError> {
        let mut arenas = ArenaManager::new(settings.arenas_dir(), settings.worlds_dir.clone());
        if let Some(template) = &settings.arena_template {
            arenas.load_template(template)?;
        }
        let report = arenas.discover()?;

        let gateway = Gateway::spawn(store)?;
        let pool = WorkerPool::new(settings.pool_config());

        let tick_config = settings.tick_config();
        let mut timetable = Timetable::new();
        timetable
            .schedule(Task::Collect, Cadence::every(1))
            .schedule(
                Task::Maintenance,
                Cadence::from_period(settings.maintenance_interval(), &tick_config),
            )
            .schedule(
                Task::Pedestal,
                Cadence::from_period(settings.pedestal_refresh(), &tick_config),
            );

        let mut server = Self {
            clock: TickClock::new(tick_config),
            timetable,
            arenas,
            pool,
            gateway,
            presence: Presence::new(),
            permissions: PermissionCache::new(),
            cages: CageManager::from_settings(&settings.cages),
            kits: KitManager::from_settings(&settings.kits),
            pedestal: Pedestal::new(settings.default_spawn.world.clone()),
            forms: FormQueue::new(),
            economy,
            outbox: Vec::new(),
            shut_down: false,
            settings,
        };

        server
            .gateway
            .load_lobby(server.settings.default_spawn.clone(), |srv: &mut Self, result| {
                if let Ok(lobby) = result {
                    srv.pedestal.set_world(lobby.world.clone(), srv.presence.in_world(&lobby.world));
                }
            });
        server.refresh_pedestal();

        tracing::info!(
            arenas = report.registered.len(),
            skipped = report.skipped.len(),
            tick_rate_hz = server.clock.tick_rate_hz(),
            "skyarena server started"
        );
        Ok(server)
    }

    // -- main loop ----------------------------------------------------------

    /// Drives the server until `shutdown` resolves or the host closes the
    /// event stream, then shuts down. Actions are forwarded after every
    /// event and tick.
    pub async fn run<F>(
        mut self,
        mut events: mpsc::UnboundedReceiver<HostEvent>,
        actions: mpsc::UnboundedSender<HostAction>,
        shutdown: F,
    ) where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("skyarena server running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::info!("host event stream closed");
                        break;
                    }
                },
                info = self.clock.wait_for_tick() => {
                    self.run_tick(info.tick);
                    self.clock.record_tick_end();
                }
            }
            self.forward_actions(&actions);
        }

        self.shutdown();
        self.forward_actions(&actions);
    }

    fn forward_actions(&mut self, actions: &mpsc::UnboundedSender<HostAction>) {
        for action in self.take_actions() {
            if actions.send(action).is_err() {
                tracing::warn!("host stopped listening for actions");
                return;
            }
        }
    }

    /// Runs whatever the timetable has due on `tick`.
    pub fn run_tick(&mut self, tick: u64) {
        let due: Vec<Task> = self.timetable.due(tick).collect();
        for task in due {
            self.run_task(task);
        }
    }

    pub fn run_task(&mut self, task: Task) {
        match task {
            Task::Collect => {
                self.collect();
            }
            Task::Maintenance => {
                let report = self.pool.run_maintenance();
                tracing::debug!(
                    reclaimed_workers = report.reclaimed_workers,
                    swept_workers = report.swept_workers,
                    "pool maintenance"
                );
            }
            Task::Pedestal => {
                self.refresh_pedestal();
            }
        }
    }

    /// Dispatches every finished storage call and pool job without
    /// waiting. Returns how many callbacks ran.
    pub fn collect(&mut self) -> usize {
        let resolved = self.gateway.collect();
        let completed = self.pool.collect();
        let ran = resolved.len() + completed.len();
        for done in resolved {
            done.dispatch(self);
        }
        for done in completed {
            done.dispatch(self);
        }
        ran
    }

    /// Waits until no storage call or pool job is outstanding, running
    /// callbacks as they arrive. Callbacks that issue further calls are
    /// waited on too.
    pub async fn flush(&mut self) {
        loop {
            if self.gateway.pending_calls() > 0 {
                match self.gateway.next_resolved().await {
                    Some(done) => done.dispatch(self),
                    None => break,
                }
            } else if self.pool.pending_jobs() > 0 {
                match self.pool.next_completed().await {
                    Some(done) => done.dispatch(self),
                    None => break,
                }
            } else {
                break;
            }
        }
    }

    /// Stops the pool and the storage thread, runs their last callbacks,
    /// and drops the registry. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        for done in self.pool.shutdown() {
            done.dispatch(self);
        }
        for done in self.gateway.shutdown() {
            done.dispatch(self);
        }
        // Calls made by the callbacks above resolve as unavailable.
        for done in self.gateway.collect() {
            done.dispatch(self);
        }
        self.arenas.invalidate();
        tracing::info!("skyarena server stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Hands over the actions queued for the host.
    pub fn take_actions(&mut self) -> Vec<HostAction> {
        mem::take(&mut self.outbox)
    }

    fn notify(&mut self, player: &PlayerName, message: impl Into<String>) {
        self.outbox.push(HostAction::Notify {
            player: player.clone(),
            message: message.into(),
        });
    }

    // -- host events --------------------------------------------------------

    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::PlayerJoined {
                player,
                world,
                moderator,
            } => self.on_join(player, world, moderator),
            HostEvent::PlayerQuit { player } => self.on_quit(&player),
            HostEvent::PlayerChat {
                player,
                message,
                recipients,
            } => {
                let routed = route_chat(&self.arenas, &self.presence, &player, &message, recipients);
                self.outbox.extend(routed);
            }
            HostEvent::WorldChanged { player, from, to } => {
                self.presence.move_to(&player, to.clone());
                self.pedestal.on_leave(&player, &from);
                self.pedestal.on_enter(&player, &to);
            }
        }
    }

    fn on_join(&mut self, player: PlayerName, world: WorldName, moderator: bool) {
        tracing::info!(%player, %world, moderator, "player joined");
        self.pedestal.on_enter(&player, &world);
        self.presence.join(player.clone(), world, moderator);
        self.permissions.attach(player.clone());

        // Storage runs calls in order, so the fetch sees the record.
        self.gateway.upsert_player(player.clone(), discard);
        let target = player.clone();
        self.gateway.fetch(player, move |srv: &mut Self, result| {
            srv.permissions.apply_fetched(&target, result);
        });
    }

    fn on_quit(&mut self, player: &PlayerName) {
        let Some(online) = self.presence.quit(player) else {
            tracing::debug!(%player, "quit for unknown player ignored");
            return;
        };
        let played = online.joined_at.elapsed().as_secs();
        if played > 0 {
            self.gateway.add_played_time(player.clone(), played, discard);
        }

        self.permissions.detach(player);
        self.cages.clear(player);
        self.kits.clear(player);
        self.forms.clear(player);
        self.pedestal.forget(player);
        if let Some(name) = self.arena_of(player).map(|arena| arena.name().clone()) {
            if let Some(arena) = self.arenas.get_mut(name.as_str()) {
                let _ = arena.remove_player(player);
            }
        }
        tracing::info!(%player, played_secs = played, "player quit");
    }

    // -- arenas -------------------------------------------------------------

    /// The arena whose roster holds the player.
    pub fn arena_of(&self, player: &PlayerName) -> Option<&Arena> {
        self.arenas.arenas().find(|arena| arena.contains(player))
    }

    /// Puts an online player into an arena picked by the registry.
    pub fn join_arena(&mut self, player: &PlayerName) -> Result<ArenaName, SkyArenaError> {
        if !self.presence.is_online(player) {
            return Err(SkyArenaError::NotOnline(player.clone()));
        }
        if let Some(current) = self.arena_of(player) {
            return Err(ArenaError::AlreadyInArena(player.clone(), current.name().clone()).into());
        }
        let name = self
            .arenas
            .pick_available()
            .map(|arena| arena.name().clone())
            .ok_or(SkyArenaError::NoArenaAvailable)?;
        self.arenas
            .get_mut(name.as_str())
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?
            .add_player(player.clone())?;
        tracing::info!(%player, arena = %name, "player sent to arena");
        Ok(name)
    }

    /// Takes a player out of whatever arena holds them.
    pub fn leave_arena(&mut self, player: &PlayerName) -> Result<ArenaName, SkyArenaError> {
        let name = self
            .arena_of(player)
            .map(|arena| arena.name().clone())
            .ok_or_else(|| SkyArenaError::NotInArena(player.clone()))?;
        if let Some(arena) = self.arenas.get_mut(name.as_str()) {
            arena.remove_player(player)?;
        }
        Ok(name)
    }

    pub fn create_arena(&mut self, name: &str) -> Result<ArenaName, SkyArenaError> {
        Ok(self.arenas.create(name)?.name().clone())
    }

    /// Starts deleting an arena. It leaves the registry on a later
    /// collect, once its world is gone.
    pub fn delete_arena(&mut self, name: &str) -> Result<Deletion, SkyArenaError> {
        Ok(self.arenas.delete(name, &mut self.pool)?)
    }

    // -- stats and lobby ----------------------------------------------------

    pub fn record_kill(&mut self, player: &PlayerName) {
        self.gateway.increment_kills(player.clone(), discard);
    }

    /// Counts a death, which is also a loss.
    pub fn record_death(&mut self, player: &PlayerName) {
        self.gateway.increment_deaths(player.clone(), discard);
    }

    pub fn record_win(&mut self, player: &PlayerName) {
        self.gateway.increment_wins(player.clone(), discard);
    }

    /// Reads a player's record and hands it to `on_done`.
    pub fn lookup_player<F>(&mut self, player: &PlayerName, on_done: F)
    where
        F: FnOnce(&mut Self, Result<Option<PlayerData>, StoreError>) + 'static,
    {
        self.gateway.fetch(player.clone(), on_done);
    }

    /// Stores a new lobby. The pedestal follows it once storage accepts.
    pub fn set_lobby(&mut self, lobby: Position) {
        let world = lobby.world.clone();
        self.gateway.set_lobby(lobby, move |srv: &mut Self, result| {
            if result.is_ok() {
                srv.pedestal.set_world(world.clone(), srv.presence.in_world(&world));
            }
        });
    }

    /// The cached lobby.
    pub fn lobby(&self) -> Result<&Position, SkyArenaError> {
        Ok(self.gateway.get_lobby()?)
    }

    /// Issues a leaderboard request unless one is already in flight.
    pub fn refresh_pedestal(&mut self) -> bool {
        if !self.pedestal.begin_refresh() {
            return false;
        }
        self.gateway
            .fetch_top_entries(self.settings.leaderboard_size, |srv: &mut Self, result| {
                srv.pedestal.finish_refresh(result);
            });
        true
    }

    // -- cages and kits -----------------------------------------------------

    /// Picks a cage, buying it first if the player does not own it.
    ///
    /// A purchase finishes on a later collect: the record is read, the
    /// price is withdrawn, the permission is granted and stored, and the
    /// cage is selected. The player is told how it went.
    pub fn select_cage(&mut self, player: &PlayerName, key: &str) -> Result<(), SkyArenaError> {
        if !self.permissions.is_attached(player) {
            return Err(SkyArenaError::NotAttached(player.clone()));
        }
        match self.cages.choose(player, key, &self.permissions)? {
            CageChoice::Selected => {
                let name = self.cages.cage_of(player).name.clone();
                self.notify(player, format!("Selected {name}."));
            }
            CageChoice::NeedsPurchase(cage) => {
                let buyer = player.clone();
                self.gateway.fetch(player.clone(), move |srv: &mut Self, result| {
                    srv.complete_purchase(buyer, cage, result);
                });
            }
        }
        Ok(())
    }

    fn complete_purchase(
        &mut self,
        player: PlayerName,
        cage: Cage,
        result: Result<Option<PlayerData>, StoreError>,
    ) {
        if !self.permissions.is_attached(&player) {
            tracing::debug!(%player, cage = %cage.key, "buyer left before purchase finished");
            return;
        }
        let data = match result {
            Ok(Some(data)) => data,
            Ok(None) | Err(_) => {
                self.notify(&player, "Your data is not available, try again later.");
                return;
            }
        };
        if data.has_permission(&cage.permission) || self.permissions.has_permission(&player, &cage.permission) {
            self.notify(&player, format!("You already own {}.", cage.name));
            return;
        }
        if !self.economy.withdraw(&player, cage.price) {
            self.notify(&player, format!("You need {} coins to buy {}.", cage.price, cage.name));
            return;
        }

        if let Err(e) = self.permissions.add_permission(&player, &cage.permission) {
            tracing::warn!(%player, error = %e, "could not grant cage permission");
        }
        // The snapshot may predate other grants still on their way to
        // the store, so the live attachment is merged in.
        let mut stored = data.permissions;
        for perm in self.permissions.permissions(&player).unwrap_or_default() {
            if !stored.contains(perm) {
                stored.push(perm.clone());
            }
        }
        let owner = player.clone();
        self.gateway
            .set_permissions(player.clone(), stored, move |srv: &mut Self, result| {
                if result.is_err() {
                    srv.notify(&owner, "Your purchase could not be saved.");
                }
            });
        self.cages.assign(&player, &cage.key);
        tracing::info!(%player, cage = %cage.key, price = cage.price, "cage purchased");
        self.notify(&player, format!("Bought and selected {}.", cage.name));
    }

    pub fn select_kit(&mut self, player: &PlayerName, name: &str) -> Result<(), SkyArenaError> {
        let message = match self.kits.select(player, name, &self.permissions)? {
            Some(kit) => format!("Selected kit {}.", kit.name),
            None => "Kit cleared.".to_string(),
        };
        self.notify(player, message);
        Ok(())
    }

    // -- menus --------------------------------------------------------------

    /// Shows a menu, unless the player already has one open.
    pub fn open_menu(&mut self, player: &PlayerName, menu: Menu) -> Result<(), SkyArenaError> {
        if !self.presence.is_online(player) {
            return Err(SkyArenaError::NotOnline(player.clone()));
        }
        self.forms.open(player.clone(), menu)?;
        let options: Vec<String> = match menu {
            Menu::Cages => self
                .cages
                .cages()
                .map(|cage| {
                    if cage.is_free() {
                        format!("{} (free)", cage.key)
                    } else {
                        format!("{} ({})", cage.key, cage.price)
                    }
                })
                .collect(),
            Menu::Kits => std::iter::once(NO_KIT.to_string())
                .chain(self.kits.kits().iter().map(|kit| kit.name.clone()))
                .collect(),
        };
        self.notify(player, format!("{menu:?}: {}", options.join(", ")));
        Ok(())
    }

    /// Answers the player's open menu. Without one, nothing happens.
    pub fn answer_menu(&mut self, player: &PlayerName, choice: &str) -> Result<(), SkyArenaError> {
        match self.forms.respond(player) {
            Some(Menu::Cages) => self.select_cage(player, choice),
            Some(Menu::Kits) => self.select_kit(player, choice),
            None => {
                tracing::debug!(%player, "answer without an open menu ignored");
                Ok(())
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn arenas(&self) -> &ArenaManager {
        &self.arenas
    }

    pub fn arenas_mut(&mut self) -> &mut ArenaManager {
        &mut self.arenas
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn permissions(&self) -> &PermissionCache {
        &self.permissions
    }

    pub fn cages(&self) -> &CageManager {
        &self.cages
    }

    pub fn kits(&self) -> &KitManager {
        &self.kits
    }

    pub fn pedestal(&self) -> &Pedestal {
        &self.pedestal
    }

    pub fn economy(&self) -> &dyn Economy {
        self.economy.as_ref()
    }

    pub fn timetable(&self) -> &Timetable<Task> {
        &self.timetable
    }

    /// Storage calls and pool jobs still owed a callback.
    pub fn pending_work(&self) -> usize {
        self.gateway.pending_calls() + self.pool.pending_jobs()
    }
}

impl AsMut<ArenaManager> for SkyArenaServer {
    fn as_mut(&mut self) -> &mut ArenaManager {
        &mut self.arenas
    }
}
