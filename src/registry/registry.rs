//! The registry actor and its client handle.
//!
//! [`Registry`] is the cloneable client side: `get`, `monitor`, `warm_start`
//! and introspection helpers. Every call that touches the directory turns
//! into a message on the actor's channel; the actor owns the two maps and
//! processes messages strictly in arrival order.
//!
//! # Active-worker invariant
//!
//! `by_project[p] == h` iff exactly one monitor token `t` with
//! `by_token[t] == p` is observing `h`. Entries are added only by a
//! successful registration and removed only by a termination signal, so at
//! most one live worker is ever mapped per project.
//!
//! # Lookup protocol
//!
//! `get` polls the directory a bounded number of times, sleeping in the
//! caller's context between checks to give a just-spawned worker time to
//! self-register. The final attempt forces worker creation instead of
//! re-checking. Two racing callers can therefore both spawn a worker for the
//! same project; registration is first-wins, and the rejected worker's
//! disposition is its supervisor's concern, not the registry's.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::RegistryConfig;
use crate::notify::Notifier;
use crate::storage::{Storage, StorageError};
use crate::supervisor::{ExitStatus, SpawnError, WorkerHandle, WorkerSupervisor};
use crate::types::{MonitorToken, ProjectId};

use super::message::RegistryMessage;
use super::recovery::run_crash_recovery;

/// Channel buffer for registry messages.
const REGISTRY_CHANNEL_BUFFER: usize = 100;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry actor has shut down.
    #[error("registry is shut down")]
    Closed,

    /// Worker creation failed; propagated unchanged to the caller of `get`.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// Storage failure outside crash recovery (e.g. during warm start).
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Client handle to the batcher registry.
///
/// Cheap to clone; all clones talk to the same actor. Callers anywhere in
/// the orchestrator use [`get`](Registry::get) to reach a project's batcher;
/// freshly started batchers use [`monitor`](Registry::monitor) to announce
/// themselves.
pub struct Registry<S, W> {
    tx: mpsc::Sender<RegistryMessage>,
    storage: Arc<S>,
    supervisor: Arc<W>,
    config: RegistryConfig,
    shutdown: CancellationToken,
}

impl<S, W> Clone for Registry<S, W> {
    fn clone(&self) -> Self {
        Registry {
            tx: self.tx.clone(),
            storage: Arc::clone(&self.storage),
            supervisor: Arc::clone(&self.supervisor),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S, W> Registry<S, W>
where
    S: Storage + 'static,
    W: WorkerSupervisor,
{
    /// Creates a registry and spawns its actor task.
    pub fn new<N>(
        config: RegistryConfig,
        storage: Arc<S>,
        notifier: Arc<N>,
        supervisor: Arc<W>,
    ) -> Self
    where
        N: Notifier + 'static,
    {
        Self::new_with_shutdown(config, storage, notifier, supervisor, CancellationToken::new())
    }

    /// Creates a registry whose actor stops when `shutdown` is cancelled.
    pub fn new_with_shutdown<N>(
        config: RegistryConfig,
        storage: Arc<S>,
        notifier: Arc<N>,
        supervisor: Arc<W>,
        shutdown: CancellationToken,
    ) -> Self
    where
        N: Notifier + 'static,
    {
        let (tx, rx) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let actor = RegistryActor {
            by_project: HashMap::new(),
            by_token: HashMap::new(),
            next_token: 1,
            storage: Arc::clone(&storage),
            notifier,
            config: config.clone(),
            tx: tx.downgrade(),
        };
        tokio::spawn(actor.run(rx, shutdown.clone()));

        Registry {
            tx,
            storage,
            supervisor,
            config,
            shutdown,
        }
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the shutdown token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the registry actor. Running workers are unaffected; the
    /// directory is simply no longer reachable.
    pub fn shutdown(&self) {
        info!("shutting down batcher registry");
        self.shutdown.cancel();
    }

    /// Returns the handle of the project's live batcher, starting one if
    /// needed.
    ///
    /// Tolerates the race where a worker is mid-startup and has not yet
    /// announced itself: the directory is polled up to
    /// `lookup_attempts - 1` times with `lookup_interval` pauses in between,
    /// and the final attempt unconditionally asks the supervisor for a new
    /// worker instead of re-checking. Spawn failures propagate to the caller.
    #[instrument(skip(self), fields(project = %project))]
    pub async fn get(&self, project: ProjectId) -> Result<WorkerHandle> {
        for attempt in 1..self.config.lookup_attempts {
            if let Some(handle) = self.lookup(project).await? {
                trace!(worker = %handle.id(), attempt, "found registered batcher");
                return Ok(handle);
            }
            debug!(attempt, "batcher not registered yet; waiting for self-registration");
            tokio::time::sleep(self.config.lookup_interval).await;
        }

        // Forced fallback: spawn rather than re-check. Two racing callers can
        // both land here for the same project; registration is first-wins.
        debug!("lookup attempts exhausted; spawning batcher");
        let handle = self.supervisor.start(project).await?;
        Ok(handle)
    }

    /// Announces a freshly started worker for the project.
    ///
    /// The first registration per project wins and is watched for
    /// termination; any later registration while the first worker is alive is
    /// logged and ignored. Fire-and-forget beyond the acknowledgment.
    #[instrument(skip(self, handle), fields(project = %project, worker = %handle.id()))]
    pub async fn monitor(&self, handle: WorkerHandle, project: ProjectId) -> Result<()> {
        let (reply, ack) = oneshot::channel();
        self.tx
            .send(RegistryMessage::Register {
                project,
                handle,
                reply,
            })
            .await
            .map_err(|_| RegistryError::Closed)?;
        ack.await.map_err(|_| RegistryError::Closed)
    }

    /// Asks the supervisor to start one worker per active project.
    ///
    /// Best-effort warm start for process boot: spawn failures are logged and
    /// skipped, and the call does not wait for the workers to self-register
    /// (the directory is populated exclusively by `monitor`). Returns the
    /// number of workers started.
    #[instrument(skip(self))]
    pub async fn warm_start(&self) -> Result<usize> {
        let projects = self.storage.active_projects().await?;
        let mut started = 0;

        for project in projects {
            match self.supervisor.start(project).await {
                Ok(handle) => {
                    debug!(project = %project, worker = %handle.id(), "batcher started");
                    started += 1;
                }
                Err(error) => {
                    warn!(project = %project, error = %error, "failed to start batcher during warm start");
                }
            }
        }

        info!(started, "warm start complete");
        Ok(started)
    }

    /// Whether the project currently has a registered batcher.
    pub async fn registered(&self, project: ProjectId) -> Result<bool> {
        Ok(self.lookup(project).await?.is_some())
    }

    /// Number of registered batchers.
    pub async fn registered_count(&self) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RegistryMessage::Count { reply })
            .await
            .map_err(|_| RegistryError::Closed)?;
        response.await.map_err(|_| RegistryError::Closed)
    }

    /// One directory check, serialized through the actor.
    async fn lookup(&self, project: ProjectId) -> Result<Option<WorkerHandle>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RegistryMessage::Lookup { project, reply })
            .await
            .map_err(|_| RegistryError::Closed)?;
        response.await.map_err(|_| RegistryError::Closed)
    }
}

/// The actor owning the directory.
struct RegistryActor<S, N> {
    /// Active workers, keyed by project. At most one entry per project.
    by_project: HashMap<ProjectId, WorkerHandle>,

    /// Inverse index resolving termination signals to projects.
    by_token: HashMap<MonitorToken, ProjectId>,

    /// Next monitor token; tokens are unique per registration event.
    next_token: u64,

    storage: Arc<S>,
    notifier: Arc<N>,
    config: RegistryConfig,

    /// Weak sender handed to watchers, so the channel closes (and the actor
    /// exits) once every client handle is gone.
    tx: mpsc::WeakSender<RegistryMessage>,
}

impl<S, N> RegistryActor<S, N>
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<RegistryMessage>,
        shutdown: CancellationToken,
    ) {
        debug!("registry actor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("registry shutdown signal received, stopping");
                    break;
                }
                message = rx.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => {
                        debug!("all registry handles dropped, stopping");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::Lookup { project, reply } => {
                let _ = reply.send(self.by_project.get(&project).cloned());
            }
            RegistryMessage::Register {
                project,
                handle,
                reply,
            } => {
                self.register(project, handle);
                let _ = reply.send(());
            }
            RegistryMessage::WorkerExited {
                token,
                handle,
                status,
            } => self.worker_exited(token, handle, status).await,
            RegistryMessage::Count { reply } => {
                let _ = reply.send(self.by_project.len());
            }
        }
    }

    fn register(&mut self, project: ProjectId, handle: WorkerHandle) {
        if let Some(existing) = self.by_project.get(&project) {
            // First registration wins. The duplicate-spawn race from the
            // forced-creation fallback lands here; the rejected worker is
            // its supervisor's problem.
            warn!(
                project = %project,
                registered = %existing.id(),
                rejected = %handle.id(),
                "duplicate batcher registration ignored"
            );
        } else {
            let token = MonitorToken(self.next_token);
            self.next_token += 1;
            self.by_token.insert(token, project);
            self.spawn_watcher(token, handle.clone());
            info!(worker = %handle.id(), token = %token, "batcher registered");
            self.by_project.insert(project, handle);
        }
    }

    /// Arranges the linked watcher that posts the worker's termination back
    /// into the actor's channel.
    fn spawn_watcher(&self, token: MonitorToken, handle: WorkerHandle) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let status = handle.terminated().await;
            let Some(tx) = tx.upgrade() else {
                // Registry already gone; nothing to clean up.
                return;
            };
            let _ = tx
                .send(RegistryMessage::WorkerExited {
                    token,
                    handle,
                    status,
                })
                .await;
        });
    }

    async fn worker_exited(
        &mut self,
        token: MonitorToken,
        handle: WorkerHandle,
        status: ExitStatus,
    ) {
        let Some(project) = self.by_token.remove(&token) else {
            debug!(token = %token, worker = %handle.id(), "termination signal for unknown monitor token");
            return;
        };

        // Clear the directory entry only if it still points at the worker
        // that terminated; a replacement may already be registered.
        if self
            .by_project
            .get(&project)
            .is_some_and(|current| current.id() == handle.id())
        {
            self.by_project.remove(&project);
        }

        match status {
            ExitStatus::Normal => {
                info!(project = %project, worker = %handle.id(), "batcher stopped normally");
            }
            ExitStatus::Crashed(reason) => {
                warn!(
                    project = %project,
                    worker = %handle.id(),
                    reason = %reason,
                    "batcher crashed; running recovery"
                );
                if let Err(recovery_error) = run_crash_recovery(
                    self.storage.as_ref(),
                    &self.notifier,
                    &self.config,
                    project,
                    &handle,
                    &reason,
                )
                .await
                {
                    // Storage failures during cleanup are fatal to this
                    // recovery invocation, but never to the actor itself.
                    error!(
                        project = %project,
                        error = %recovery_error,
                        "crash recovery aborted"
                    );
                }
            }
        }
    }
}
