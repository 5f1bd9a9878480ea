//! The storage gateway: a request queue in front of one storage thread.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use skyarena_protocol::{PlayerName, Position};
use tokio::sync::mpsc;

use crate::{PlayerData, PlayerStore, StatChange, StoreError};

/// Identifier of one gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// What a call asked for. Carried into logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    UpsertPlayer(PlayerName),
    Fetch(PlayerName),
    FetchTopEntries(usize),
    Change(PlayerName, StatChange),
    SetPermissions(PlayerName),
    SetLobby,
    LoadLobby,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpsertPlayer(p) => write!(f, "upsert_player({p})"),
            Self::Fetch(p) => write!(f, "fetch({p})"),
            Self::FetchTopEntries(n) => write!(f, "fetch_top_entries({n})"),
            Self::Change(p, change) => write!(f, "{change:?}({p})"),
            Self::SetPermissions(p) => write!(f, "set_permissions({p})"),
            Self::SetLobby => f.write_str("set_lobby"),
            Self::LoadLobby => f.write_str("load_lobby"),
        }
    }
}

/// A request on its way to the storage thread.
enum Request {
    Upsert(PlayerName),
    Fetch(PlayerName),
    Top(usize),
    Change(PlayerName, StatChange),
    SetPermissions(PlayerName, Vec<String>),
    SetLobby(Position),
    LoadLobby,
}

/// What the storage thread answered.
enum Reply {
    Created(bool),
    Player(Option<PlayerData>),
    Entries(Vec<PlayerData>),
    Lobby(Option<Position>),
    Done,
}

struct Envelope {
    id: RequestId,
    request: Request,
}

struct Answer {
    id: RequestId,
    result: Result<Reply, StoreError>,
}

/// Gateway-side bookkeeping applied before the caller's callback.
enum Effect {
    None,
    CacheLobby(Position),
    ResolveLobby { default: Position },
}

type ErasedCallback<C> = Box<dyn FnOnce(&mut C, Result<Reply, StoreError>)>;

struct PendingCall<C> {
    op: Operation,
    effect: Effect,
    callback: ErasedCallback<C>,
}

/// A finished call whose callback has not run yet.
#[must_use = "a resolved call does nothing until dispatched"]
pub struct Resolved<C> {
    id: RequestId,
    op: Operation,
    callback: ErasedCallback<C>,
    result: Result<Reply, StoreError>,
}

impl<C> Resolved<C> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn operation(&self) -> &Operation {
        &self.op
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Runs the caller's callback.
    pub fn dispatch(self, ctx: &mut C) {
        (self.callback)(ctx, self.result);
    }
}

impl<C> fmt::Debug for Resolved<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("id", &self.id)
            .field("op", &self.op)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

/// Callback for calls whose outcome the caller does not need. Failures
/// are still logged by the gateway.
pub fn discard<C, T>(_ctx: &mut C, _result: Result<T, StoreError>) {}

/// Non-blocking front door to player storage.
///
/// Every call returns immediately. The backend runs on its own thread
/// and executes calls in submission order; each call's callback runs
/// exactly once, on the main context, after the owner dispatches the
/// [`Resolved`] entry from [`collect`](Self::collect). Failures are
/// logged at `error` before the callback sees them.
///
/// The gateway also caches the lobby position: [`load_lobby`](Self::load_lobby)
/// and a successful [`set_lobby`](Self::set_lobby) update it, and
/// [`get_lobby`](Self::get_lobby) reads it synchronously.
pub struct Gateway<C> {
    requests: Option<mpsc::UnboundedSender<Envelope>>,
    answers: mpsc::UnboundedReceiver<Answer>,
    handle: Option<JoinHandle<()>>,
    pending: HashMap<RequestId, PendingCall<C>>,
    /// Calls that never reached storage. Resolved on the next collect.
    rejected: Vec<RequestId>,
    next_id: u64,
    lobby: Option<Position>,
}

impl<C> Gateway<C> {
    /// Starts the storage thread around `store`.
    pub fn spawn<S: PlayerStore>(store: S) -> Result<Self, StoreError> {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (ans_tx, ans_rx) = mpsc::unbounded_channel();
        let handle = thread::Builder::new()
            .name("skyarena-storage".into())
            .spawn(move || run_storage(store, req_rx, ans_tx))?;

        Ok(Self {
            requests: Some(req_tx),
            answers: ans_rx,
            handle: Some(handle),
            pending: HashMap::new(),
            rejected: Vec::new(),
            next_id: 1,
            lobby: None,
        })
    }

    /// Creates the player's record if absent. Resolves with whether one
    /// was created.
    pub fn upsert_player<F>(&mut self, name: PlayerName, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<bool, StoreError>) + 'static,
    {
        self.submit(
            Operation::UpsertPlayer(name.clone()),
            Request::Upsert(name),
            Effect::None,
            |reply| match reply {
                Reply::Created(created) => Some(created),
                _ => None,
            },
            on_done,
        )
    }

    /// Reads one player. Resolves with `None` for unknown players.
    pub fn fetch<F>(&mut self, name: PlayerName, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<Option<PlayerData>, StoreError>) + 'static,
    {
        self.submit(
            Operation::Fetch(name.clone()),
            Request::Fetch(name),
            Effect::None,
            |reply| match reply {
                Reply::Player(data) => Some(data),
                _ => None,
            },
            on_done,
        )
    }

    /// Reads the `limit` players with the most wins.
    pub fn fetch_top_entries<F>(&mut self, limit: usize, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<Vec<PlayerData>, StoreError>) + 'static,
    {
        self.submit(
            Operation::FetchTopEntries(limit),
            Request::Top(limit),
            Effect::None,
            |reply| match reply {
                Reply::Entries(entries) => Some(entries),
                _ => None,
            },
            on_done,
        )
    }

    pub fn increment_kills<F>(&mut self, name: PlayerName, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.change(name, StatChange::Kill, on_done)
    }

    /// Adds a death and a loss.
    pub fn increment_deaths<F>(&mut self, name: PlayerName, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.change(name, StatChange::Death, on_done)
    }

    pub fn increment_wins<F>(&mut self, name: PlayerName, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.change(name, StatChange::Win, on_done)
    }

    pub fn add_played_time<F>(&mut self, name: PlayerName, secs: u64, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.change(name, StatChange::PlayedTime(secs), on_done)
    }

    fn change<F>(&mut self, name: PlayerName, change: StatChange, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.submit(
            Operation::Change(name.clone(), change),
            Request::Change(name, change),
            Effect::None,
            done_reply,
            on_done,
        )
    }

    /// Replaces the player's stored permission list.
    pub fn set_permissions<F>(
        &mut self,
        name: PlayerName,
        permissions: Vec<String>,
        on_done: F,
    ) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.submit(
            Operation::SetPermissions(name.clone()),
            Request::SetPermissions(name, permissions),
            Effect::None,
            done_reply,
            on_done,
        )
    }

    /// Stores the lobby. The cache follows only once storage confirms.
    pub fn set_lobby<F>(&mut self, lobby: Position, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<(), StoreError>) + 'static,
    {
        self.submit(
            Operation::SetLobby,
            Request::SetLobby(lobby.clone()),
            Effect::CacheLobby(lobby),
            done_reply,
            on_done,
        )
    }

    /// Loads the lobby into the cache. When none is stored, `default`
    /// is cached instead. Resolves with the cached position.
    pub fn load_lobby<F>(&mut self, default: Position, on_done: F) -> RequestId
    where
        F: FnOnce(&mut C, Result<Position, StoreError>) + 'static,
    {
        self.submit(
            Operation::LoadLobby,
            Request::LoadLobby,
            Effect::ResolveLobby { default },
            |reply| match reply {
                Reply::Lobby(lobby) => lobby,
                _ => None,
            },
            on_done,
        )
    }

    /// The cached lobby.
    ///
    /// # Errors
    ///
    /// [`StoreError::LobbyNotLoaded`] before the first successful
    /// `load_lobby` or `set_lobby`.
    pub fn get_lobby(&self) -> Result<&Position, StoreError> {
        self.lobby.as_ref().ok_or(StoreError::LobbyNotLoaded)
    }

    pub fn is_lobby_loaded(&self) -> bool {
        self.lobby.is_some()
    }

    fn submit<T, F>(
        &mut self,
        op: Operation,
        request: Request,
        effect: Effect,
        extract: fn(Reply) -> Option<T>,
        on_done: F,
    ) -> RequestId
    where
        T: 'static,
        F: FnOnce(&mut C, Result<T, StoreError>) + 'static,
    {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let callback: ErasedCallback<C> = Box::new(move |ctx, result| {
            let typed = result.and_then(|reply| {
                extract(reply).ok_or_else(|| StoreError::Backend("mismatched storage reply".into()))
            });
            on_done(ctx, typed);
        });
        tracing::trace!(%id, %op, "storage call queued");
        self.pending.insert(
            id,
            PendingCall {
                op,
                effect,
                callback,
            },
        );

        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(Envelope { id, request }).is_ok());
        if !sent {
            self.rejected.push(id);
        }
        id
    }

    /// Drains every answered call without blocking.
    pub fn collect(&mut self) -> Vec<Resolved<C>> {
        let mut ready: Vec<Resolved<C>> = std::mem::take(&mut self.rejected)
            .into_iter()
            .filter_map(|id| self.settle(id, Err(StoreError::Unavailable)))
            .collect();
        while let Ok(answer) = self.answers.try_recv() {
            if let Some(done) = self.settle(answer.id, answer.result) {
                ready.push(done);
            }
        }
        ready
    }

    /// Waits for the next answered call. Returns `None` when nothing is
    /// pending.
    pub async fn next_resolved(&mut self) -> Option<Resolved<C>> {
        if let Some(id) = self.rejected.pop() {
            return self.settle(id, Err(StoreError::Unavailable));
        }
        while !self.pending.is_empty() {
            let Some(answer) = self.answers.recv().await else {
                // Storage thread died with calls in flight.
                let id = *self.pending.keys().next()?;
                return self.settle(id, Err(StoreError::Unavailable));
            };
            if let Some(done) = self.settle(answer.id, answer.result) {
                return Some(done);
            }
        }
        None
    }

    fn settle(&mut self, id: RequestId, result: Result<Reply, StoreError>) -> Option<Resolved<C>> {
        let Some(call) = self.pending.remove(&id) else {
            tracing::warn!(%id, "answer for unknown storage call dropped");
            return None;
        };

        let result = match (call.effect, result) {
            (_, Err(e)) => {
                tracing::error!(%id, op = %call.op, error = %e, "storage operation failed");
                Err(e)
            }
            (Effect::CacheLobby(lobby), Ok(reply)) => {
                tracing::info!(lobby = %lobby, "lobby updated");
                self.lobby = Some(lobby);
                Ok(reply)
            }
            (Effect::ResolveLobby { default }, Ok(Reply::Lobby(found))) => {
                let lobby = found.unwrap_or_else(|| {
                    tracing::warn!(fallback = %default, "no lobby stored, using default spawn");
                    default
                });
                self.lobby = Some(lobby.clone());
                Ok(Reply::Lobby(Some(lobby)))
            }
            (_, Ok(reply)) => Ok(reply),
        };

        Some(Resolved {
            id,
            op: call.op,
            callback: call.callback,
            result,
        })
    }

    /// Closes the request queue, waits for the storage thread to finish
    /// what it has, and returns every call still to be dispatched. Calls
    /// made afterwards resolve with [`StoreError::Unavailable`].
    pub fn shutdown(&mut self) -> Vec<Resolved<C>> {
        self.requests = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("storage thread panicked");
            }
            tracing::info!("storage gateway shut down");
        }

        let mut ready = self.collect();
        let stranded: Vec<RequestId> = self.pending.keys().copied().collect();
        for id in stranded {
            if let Some(done) = self.settle(id, Err(StoreError::Unavailable)) {
                ready.push(done);
            }
        }
        ready
    }

    /// Calls whose callback has not been handed out yet.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }
}

impl<C> Drop for Gateway<C> {
    fn drop(&mut self) {
        // Dropping the sender lets the storage thread drain and exit.
        self.requests = None;
    }
}

fn done_reply(reply: Reply) -> Option<()> {
    match reply {
        Reply::Done => Some(()),
        _ => None,
    }
}

/// Storage thread body. Executes requests in arrival order until the
/// gateway closes its sender.
fn run_storage<S: PlayerStore>(
    mut store: S,
    mut requests: mpsc::UnboundedReceiver<Envelope>,
    answers: mpsc::UnboundedSender<Answer>,
) {
    tracing::debug!("storage thread started");
    while let Some(Envelope { id, request }) = requests.blocking_recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| execute(&mut store, request)))
            .unwrap_or_else(|_| Err(StoreError::Backend("storage backend panicked".into())));
        if answers.send(Answer { id, result }).is_err() {
            break;
        }
    }
    if let Err(e) = store.close() {
        tracing::error!(error = %e, "closing player store failed");
    }
    tracing::debug!("storage thread stopped");
}

fn execute<S: PlayerStore>(store: &mut S, request: Request) -> Result<Reply, StoreError> {
    match request {
        Request::Upsert(name) => store.upsert_player(&name).map(Reply::Created),
        Request::Fetch(name) => store.fetch_player(&name).map(Reply::Player),
        Request::Top(limit) => store.top_entries(limit).map(Reply::Entries),
        Request::Change(name, change) => store.apply_change(&name, change).map(|()| Reply::Done),
        Request::SetPermissions(name, permissions) => store
            .set_permissions(&name, &permissions)
            .map(|()| Reply::Done),
        Request::SetLobby(lobby) => store.set_lobby(&lobby).map(|()| Reply::Done),
        Request::LoadLobby => store.load_lobby().map(Reply::Lobby),
    }
}
