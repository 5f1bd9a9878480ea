//! Arena registry: discovers, creates, selects, and tears down arenas.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use skyarena_protocol::{ArenaName, PlayerName, WorldName};
use skyarena_worker::{DeletedTree, JobError, JobId, WorkerPool, delete_tree};

use crate::config::DEFAULT_TEMPLATE;
use crate::{Arena, ArenaConfig, ArenaError, ArenaFlag};

/// A config file `discover` could not register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedConfig {
    pub path: PathBuf,
    pub reason: String,
}

/// What one `discover` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Newly registered arenas, in file-name order.
    pub registered: Vec<ArenaName>,
    pub skipped: Vec<SkippedConfig>,
}

/// Outcome of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// The world deletion job is running; the arena goes away when its
    /// completion is dispatched.
    Submitted(JobId),
    /// A deletion for this arena is already in flight. Nothing was submitted.
    AlreadyPending,
}

/// Owns every arena, keyed by name.
///
/// Each [`Arena`] owns its [`ArenaConfig`], so the name → instance and
/// name → config views are one map and cannot drift apart. Iteration
/// order is registration order; selection tiebreaks depend on it.
///
/// All methods run on the main context. Deletion is the one operation
/// that crosses threads: the world directory is removed on a pool
/// worker and the registry entry only disappears when the owner
/// dispatches the job's completion.
pub struct ArenaManager {
    arenas_dir: PathBuf,
    worlds_dir: PathBuf,
    template: String,
    arenas: HashMap<ArenaName, Arena>,
    order: Vec<ArenaName>,
    /// Arenas whose deletion job has not completed yet.
    pending_deletion: HashSet<ArenaName>,
}

impl ArenaManager {
    /// Creates an empty registry. Arena documents live in `arenas_dir`;
    /// world directories in `worlds_dir`.
    pub fn new(arenas_dir: impl Into<PathBuf>, worlds_dir: impl Into<PathBuf>) -> Self {
        Self {
            arenas_dir: arenas_dir.into(),
            worlds_dir: worlds_dir.into(),
            template: DEFAULT_TEMPLATE.to_string(),
            arenas: HashMap::new(),
            order: Vec::new(),
            pending_deletion: HashSet::new(),
        }
    }

    /// Replaces the bundled template used by [`create`](Self::create).
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Reads the template from a file.
    pub fn load_template(&mut self, path: &Path) -> Result<(), ArenaError> {
        self.template = fs::read_to_string(path)?;
        Ok(())
    }

    pub fn arenas_dir(&self) -> &Path {
        &self.arenas_dir
    }

    pub fn worlds_dir(&self) -> &Path {
        &self.worlds_dir
    }

    /// Scans `arenas_dir` for `*.yml` documents, in file-name order, and
    /// registers each valid one. Invalid or duplicate documents are
    /// skipped and reported; only failing to list the directory is an
    /// error. A missing directory yields an empty report.
    pub fn discover(&mut self) -> Result<DiscoveryReport, ArenaError> {
        let mut report = DiscoveryReport::default();
        let entries = match fs::read_dir(&self.arenas_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "yml"))
            .collect();
        paths.sort();

        for path in paths {
            let config = match ArenaConfig::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping arena config");
                    report.skipped.push(SkippedConfig {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let name = config.name().clone();
            if self.arenas.contains_key(&name) {
                tracing::warn!(path = %path.display(), arena = %name, "skipping duplicate arena name");
                report.skipped.push(SkippedConfig {
                    path,
                    reason: ArenaError::AlreadyExists(name).to_string(),
                });
                continue;
            }

            self.insert(Arena::new(config));
            report.registered.push(name);
        }

        tracing::info!(
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "arena discovery finished"
        );
        Ok(report)
    }

    fn insert(&mut self, arena: Arena) {
        let name = arena.name().clone();
        tracing::info!(arena = %name, world = ?arena.world(), "arena registered");
        self.order.push(name.clone());
        self.arenas.insert(name, arena);
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&Arena> {
        self.arenas.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Arena> {
        self.arenas.get_mut(name)
    }

    /// The document backing an arena.
    pub fn config(&self, name: &str) -> Option<&ArenaConfig> {
        self.get(name).map(Arena::config)
    }

    /// Arenas in registration order.
    pub fn arenas(&self) -> impl Iterator<Item = &Arena> {
        self.order.iter().filter_map(|name| self.arenas.get(name))
    }

    pub fn len(&self) -> usize {
        self.arenas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.is_empty()
    }

    /// Materializes a new arena from the template: copies it verbatim to
    /// `<arenas_dir>/<name>.yml`, stamps the name, saves, and registers
    /// the arena in setup mode.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the name is registered or the file exists; the
    /// existing file is never touched.
    pub fn create(&mut self, name: &str) -> Result<&mut Arena, ArenaError> {
        let name = ArenaName::new(name)?;
        if self.arenas.contains_key(&name) {
            return Err(ArenaError::AlreadyExists(name));
        }

        fs::create_dir_all(&self.arenas_dir)?;
        let path = self.arenas_dir.join(format!("{name}.yml"));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ArenaError::AlreadyExists(name));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(self.template.as_bytes())?;
        drop(file);

        let built = ArenaConfig::from_template(&path, &self.template, name.clone())
            .and_then(|config| config.save().map(|()| config));
        let config = match built {
            Ok(config) => config,
            Err(e) => {
                // Leave nothing behind on a bad template.
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };

        let mut arena = Arena::new(config);
        arena.set_flag(ArenaFlag::InSetupMode, true);
        self.insert(arena);
        tracing::info!(arena = %name, path = %path.display(), "arena created");

        self.arenas
            .get_mut(&name)
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))
    }

    /// Starts tearing an arena down.
    ///
    /// The world directory is deleted on a pool worker. When the owner
    /// dispatches the completion, the config file is removed, the
    /// arena's shutdown sequence runs, and it leaves the registry. Until
    /// then it stays visible (but is no longer selected). If the world
    /// deletion fails the arena is kept and may be deleted again.
    pub fn delete<C>(&mut self, name: &str, pool: &mut WorkerPool<C>) -> Result<Deletion, ArenaError>
    where
        C: AsMut<ArenaManager> + 'static,
    {
        let Some(arena) = self.arenas.get(name) else {
            return Err(ArenaError::NotFound(name.to_string()));
        };
        let name = arena.name().clone();
        if self.pending_deletion.contains(&name) {
            tracing::warn!(arena = %name, "deletion already in progress");
            return Ok(Deletion::AlreadyPending);
        }

        let world_dir = match arena.world() {
            Some(world) => Some(self.world_dir(&name, world)?),
            None => None,
        };
        let target = name.clone();
        let id = pool.submit(
            move |scratch| match world_dir {
                Some(dir) => Ok(delete_tree(&dir, scratch)?),
                None => Ok(DeletedTree::default()),
            },
            move |ctx: &mut C, result| ctx.as_mut().finish_deletion(&target, result),
        )?;

        self.pending_deletion.insert(name.clone());
        tracing::info!(arena = %name, job = %id, "arena deletion submitted");
        Ok(Deletion::Submitted(id))
    }

    /// `<worlds_dir>/<world>`, refusing anything that is not a strict
    /// child of the worlds directory.
    fn world_dir(&self, arena: &ArenaName, world: &WorldName) -> Result<PathBuf, ArenaError> {
        let dir = self.worlds_dir.join(world.as_str());
        if !world.is_folder_name() || dir.parent() != Some(self.worlds_dir.as_path()) {
            tracing::error!(arena = %arena, %world, "refusing to delete world outside the worlds directory");
            return Err(ArenaError::UnsafeWorld {
                arena: arena.clone(),
                world: world.to_string(),
            });
        }
        Ok(dir)
    }

    fn finish_deletion(&mut self, name: &ArenaName, result: Result<DeletedTree, JobError>) {
        self.pending_deletion.remove(name);

        let deleted = match result {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(arena = %name, error = %e, "arena world deletion failed, arena kept");
                return;
            }
        };
        let Some(arena) = self.arenas.get_mut(name) else {
            // Invalidated while the job ran.
            tracing::warn!(arena = %name, "deleted arena no longer registered");
            return;
        };

        match fs::remove_file(arena.config().path()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(arena = %name, error = %e, "could not remove arena config file");
            }
        }
        arena.shutdown();

        self.arenas.remove(name);
        self.order.retain(|n| n != name);
        tracing::info!(
            arena = %name,
            files = deleted.files,
            dirs = deleted.dirs,
            "arena deleted"
        );
    }

    /// Whether a deletion job for this arena is in flight.
    pub fn is_pending_deletion(&self, name: &str) -> bool {
        self.pending_deletion.contains(name)
    }

    /// Picks an arena for a player looking for a game. See
    /// [`pick_available_with`](Self::pick_available_with).
    pub fn pick_available(&self) -> Option<&Arena> {
        self.pick_available_with(&mut rand::rng())
    }

    /// Selection policy:
    ///
    /// 1. the first arena (registration order) that has an alive player
    ///    and still accepts players, flags or not;
    /// 2. otherwise a uniformly random arena that accepts players and has
    ///    no flag set;
    /// 3. otherwise `None`.
    ///
    /// An arena with a deletion in flight never qualifies.
    pub fn pick_available_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Arena> {
        let open: Vec<&Arena> = self
            .arenas()
            .filter(|arena| {
                arena.status().accepts_players() && !self.pending_deletion.contains(arena.name())
            })
            .collect();

        if let Some(filling) = open.iter().find(|arena| arena.alive_count() > 0) {
            return Some(*filling);
        }
        let candidates: Vec<&Arena> = open.into_iter().filter(|arena| !arena.flags().any()).collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.random_range(0..candidates.len())])
    }

    /// The arena a player belongs to: the first (registration order)
    /// whose roster holds the player or whose world is the one the
    /// player stands in.
    pub fn resolve_arena_for(&self, player: &PlayerName, world: &WorldName) -> Option<&Arena> {
        self.arenas()
            .find(|arena| arena.contains(player) || arena.world() == Some(world))
    }

    /// Drops every arena. Shutdown and full reload only; arenas are not
    /// shut down and files are untouched.
    ///
    /// Deletion marks survive: a job still in flight owns its arena
    /// until its completion is dispatched, even across a reload.
    pub fn invalidate(&mut self) {
        let dropped = self.arenas.len();
        self.arenas.clear();
        self.order.clear();
        tracing::info!(dropped, "arena registry invalidated");
    }
}

impl AsMut<ArenaManager> for ArenaManager {
    fn as_mut(&mut self) -> &mut ArenaManager {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(docs: &[&str]) -> (tempfile::TempDir, ArenaManager) {
        let tmp = tempfile::tempdir().unwrap();
        let arenas = tmp.path().join("arenas");
        fs::create_dir_all(&arenas).unwrap();
        for (i, doc) in docs.iter().enumerate() {
            fs::write(arenas.join(format!("{i:02}.yml")), doc).unwrap();
        }
        let mut manager = ArenaManager::new(arenas, tmp.path().join("worlds"));
        manager.discover().unwrap();
        (tmp, manager)
    }

    #[test]
    fn test_failed_deletion_keeps_arena_and_clears_pending() {
        let (_tmp, mut manager) = manager_with(&["arena-name: a\nenabled: true\n"]);
        let name = ArenaName::new("a").unwrap();
        manager.pending_deletion.insert(name.clone());

        manager.finish_deletion(&name, Err(JobError::Failed("disk busy".into())));

        assert!(manager.get("a").is_some());
        assert!(!manager.is_pending_deletion("a"));
        assert!(manager.config("a").unwrap().path().exists());
    }

    #[test]
    fn test_finish_deletion_after_invalidate_is_ignored() {
        let (_tmp, mut manager) = manager_with(&["arena-name: a\n"]);
        let name = ArenaName::new("a").unwrap();
        manager.invalidate();

        manager.finish_deletion(&name, Ok(DeletedTree::default()));

        assert!(manager.is_empty());
    }

    #[test]
    fn test_pending_deletion_is_not_selected() {
        let (_tmp, mut manager) = manager_with(&["arena-name: a\nenabled: true\n"]);
        assert!(manager.pick_available().is_some());

        manager.pending_deletion.insert(ArenaName::new("a").unwrap());

        assert!(manager.pick_available().is_none());
        assert!(manager.get("a").is_some(), "still visible");
    }
}
