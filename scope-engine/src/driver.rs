use crate::config::EngineConfig;
use crate::config::ResultsTtl;
use crate::error::EngineError;
use crate::error::Result;
use crate::model::ChunkOutcome;
use crate::model::ScopeModel;
use crate::model::SearchChunk;
use crate::model::SearchTicket;
use crate::update::NavigationKind;
use crate::update::ScopeUpdate;
use scopes_navigation::ViewHandle;
use scopes_results_model::CompletionStatus;
use scopes_results_model::IdentityKey;
use scopes_results_model::ResultRecord;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Debug)]
enum ScopeCommand {
    Search {
        generation: u64,
        query: String,
        navigation_id: String,
    },
    Chunk {
        generation: u64,
        chunk: SearchChunk,
    },
    Bind {
        kind: NavigationKind,
        navigation_id: String,
        reply: oneshot::Sender<Option<ViewHandle>>,
    },
    Unbind {
        kind: NavigationKind,
        handle: ViewHandle,
    },
    Navigate {
        kind: NavigationKind,
        navigation_id: String,
    },
    UpdateResult {
        category_id: String,
        key: IdentityKey,
        record: ResultRecord,
    },
    Invalidate,
}

/// Cloneable front end of a [`ScopeDriver`]; safe to use from any task or
/// thread.
#[derive(Debug, Clone)]
pub struct ScopeHandle {
    commands: mpsc::UnboundedSender<ScopeCommand>,
    generation: Arc<AtomicU64>,
}

impl ScopeHandle {
    /// Start a new search. Returns the generation its chunks must carry.
    ///
    /// The search with the highest generation wins, whatever order racing
    /// handles deliver them in.
    pub fn search(
        &self,
        query: impl Into<String>,
        navigation_id: impl Into<String>,
    ) -> Result<u64> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(ScopeCommand::Search {
            generation,
            query: query.into(),
            navigation_id: navigation_id.into(),
        })?;
        Ok(generation)
    }

    /// Deliver a chunk of the search started as `generation`. Chunks of
    /// older searches are dropped by the driver.
    pub fn push_chunk(&self, generation: u64, chunk: SearchChunk) -> Result<()> {
        self.send(ScopeCommand::Chunk { generation, chunk })
    }

    pub async fn bind_navigation(
        &self,
        kind: NavigationKind,
        navigation_id: impl Into<String>,
    ) -> Result<Option<ViewHandle>> {
        let (reply, rx) = oneshot::channel();
        self.send(ScopeCommand::Bind {
            kind,
            navigation_id: navigation_id.into(),
            reply,
        })?;
        rx.await.map_err(|_| EngineError::DriverStopped)
    }

    pub fn unbind_navigation(&self, kind: NavigationKind, handle: ViewHandle) -> Result<()> {
        self.send(ScopeCommand::Unbind { kind, handle })
    }

    pub fn navigate(&self, kind: NavigationKind, navigation_id: impl Into<String>) -> Result<()> {
        self.send(ScopeCommand::Navigate {
            kind,
            navigation_id: navigation_id.into(),
        })
    }

    pub fn update_result(
        &self,
        category_id: impl Into<String>,
        key: IdentityKey,
        record: ResultRecord,
    ) -> Result<()> {
        self.send(ScopeCommand::UpdateResult {
            category_id: category_id.into(),
            key,
            record,
        })
    }

    pub fn invalidate(&self) -> Result<()> {
        self.send(ScopeCommand::Invalidate)
    }

    fn send(&self, command: ScopeCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::DriverStopped)
    }
}

#[derive(Debug)]
struct ActiveSearch {
    generation: u64,
    ticket: SearchTicket,
    started: Instant,
}

/// Runs a [`ScopeModel`] on a single task and owns its timers.
///
/// The aggregation timer is armed by the first incomplete chunk after a
/// flush, the clear timer by every new search and the TTL timer by a
/// search that finished successfully.
#[derive(Debug)]
pub struct ScopeDriver {
    model: ScopeModel,
    commands: mpsc::UnboundedReceiver<ScopeCommand>,
    updates: mpsc::UnboundedSender<ScopeUpdate>,
    ttl: ResultsTtl,
    latest_generation: u64,
    search: Option<ActiveSearch>,
    aggregation_deadline: Option<Instant>,
    clear_deadline: Option<Instant>,
    ttl_deadline: Option<Instant>,
}

impl ScopeDriver {
    /// Spawn a driver on the current tokio runtime.
    ///
    /// The driver exits once every [`ScopeHandle`] is dropped.
    pub fn spawn(
        config: EngineConfig,
        ttl: ResultsTtl,
    ) -> (ScopeHandle, mpsc::UnboundedReceiver<ScopeUpdate>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let driver = Self {
            model: ScopeModel::new(config),
            commands: command_rx,
            updates: update_tx,
            ttl,
            latest_generation: 0,
            search: None,
            aggregation_deadline: None,
            clear_deadline: None,
            ttl_deadline: None,
        };
        let handle = ScopeHandle {
            commands: command_tx,
            generation: Arc::new(AtomicU64::new(0)),
        };
        let task = tokio::spawn(driver.run());
        (handle, update_rx, task)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
                () = sleep_until(self.aggregation_deadline) => {
                    self.aggregation_deadline = None;
                    let updates = self.model.flush();
                    self.publish_result(updates);
                }
                () = sleep_until(self.clear_deadline) => {
                    self.clear_deadline = None;
                    if let Some(search) = self.search.as_ref() {
                        let updates = self.model.clear_timeout_expired(&search.ticket);
                        self.publish_result(updates);
                    }
                }
                () = sleep_until(self.ttl_deadline) => {
                    self.ttl_deadline = None;
                    info!("results expired");
                    let updates = self.model.invalidate();
                    self.publish(updates);
                }
            }
        }
        debug!("scope driver stopped");
    }

    fn handle_command(&mut self, command: ScopeCommand) {
        match command {
            ScopeCommand::Search {
                generation,
                query,
                navigation_id,
            } => self.start_search(generation, query, navigation_id),
            ScopeCommand::Chunk { generation, chunk } => self.push_chunk(generation, chunk),
            ScopeCommand::Bind {
                kind,
                navigation_id,
                reply,
            } => {
                let handle = self.model.bind_navigation(kind, &navigation_id);
                if reply.send(handle).is_err() {
                    debug!("bind request for {navigation_id:?} was abandoned");
                }
            }
            ScopeCommand::Unbind { kind, handle } => {
                self.model.unbind_navigation(kind, handle);
            }
            ScopeCommand::Navigate {
                kind,
                navigation_id,
            } => {
                let updates = self.model.set_current_navigation_id(kind, navigation_id);
                self.publish(updates);
            }
            ScopeCommand::UpdateResult {
                category_id,
                key,
                record,
            } => match self.model.update_result(&category_id, &key, record) {
                Ok(update) => self.publish(update),
                Err(err) => warn!("failed to update result in {category_id:?}: {err}"),
            },
            ScopeCommand::Invalidate => {
                self.search = None;
                self.clear_timers();
                let updates = self.model.invalidate();
                self.publish(updates);
            }
        }
    }

    fn start_search(&mut self, generation: u64, query: String, navigation_id: String) {
        // Handles allocate generations before sending, so two racing
        // handles may deliver them out of order.
        if generation <= self.latest_generation {
            debug!(
                "ignoring search {generation}, search {} was requested later",
                self.latest_generation
            );
            return;
        }
        self.latest_generation = generation;
        let (ticket, updates) = self.model.start_search(query, navigation_id);
        let now = Instant::now();
        self.search = Some(ActiveSearch {
            generation,
            ticket,
            started: now,
        });
        self.clear_timers();
        self.clear_deadline = Some(now + self.model.config().clear_timeout());
        self.publish(updates);
    }

    fn push_chunk(&mut self, generation: u64, chunk: SearchChunk) {
        let Some(search) = self.search.as_ref() else {
            debug!("dropping chunk of finished search {generation}");
            return;
        };
        if search.generation != generation {
            debug!(
                "dropping chunk of search {generation}, current is {}",
                search.generation
            );
            return;
        }

        let status = chunk.status;
        let elapsed = search.started.elapsed();
        match self.model.push_chunk(&search.ticket, chunk, elapsed) {
            Ok(ChunkOutcome::Buffered { flush_in }) => {
                if self.aggregation_deadline.is_none() {
                    self.aggregation_deadline = Some(Instant::now() + flush_in);
                }
            }
            Ok(ChunkOutcome::Completed(updates)) => {
                self.search = None;
                self.clear_timers();
                if status == CompletionStatus::Finished {
                    self.ttl_deadline = self
                        .model
                        .results_ttl(self.ttl)
                        .map(|ttl| Instant::now() + ttl);
                }
                self.publish(updates);
            }
            Ok(ChunkOutcome::Cancelled(updates)) => {
                self.search = None;
                self.clear_timers();
                self.publish(updates);
            }
            Err(err) => warn!("failed to apply chunk of search {generation}: {err}"),
        }
    }

    fn clear_timers(&mut self) {
        self.aggregation_deadline = None;
        self.clear_deadline = None;
        self.ttl_deadline = None;
    }

    fn publish_result(&self, updates: Result<Vec<ScopeUpdate>>) {
        match updates {
            Ok(updates) => self.publish(updates),
            Err(err) => warn!("failed to flush results: {err}"),
        }
    }

    fn publish(&self, updates: impl IntoIterator<Item = ScopeUpdate>) {
        for update in updates {
            if self.updates.send(update).is_err() {
                debug!("update receiver closed");
                return;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
