//! The single task that owns a view's snapshot.
//!
//! A [`ViewRuntime`] processes, one at a time and in arrival order, baseline
//! fetch completions, push links and user commands. Fetches and commands run
//! on spawned tasks and report back through an internal inbox; a fetch that
//! completes after a newer load, a mode change or shutdown is discarded.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tracelens_config::ReconnectPolicy;
use tracelens_core::{Channel, ChannelEvent, ClientError, DataMode, DataSource};

use crate::lifecycle::{ConnectionManager, ConnectionState, Tagged};
use crate::session::SessionContext;

// ─────────────────────────────────────────────────────────────────────────────
// View contract
// ─────────────────────────────────────────────────────────────────────────────

/// What a reconciled push event asks of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    None,
    Reload,
}

/// How a user action is handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<C> {
    /// Applied to the snapshot directly.
    Handled,
    /// Needs a fresh baseline.
    Reload,
    /// Needs a backend command, followed by a reload once it succeeds.
    Execute(C),
}

#[async_trait]
pub trait View: Send + Sync + 'static {
    type Snapshot: Clone + Default + Send + Sync + 'static;
    type Action: fmt::Debug + Send + 'static;
    type Command: fmt::Debug + Send + 'static;

    fn name(&self) -> &'static str;

    /// Push channel this view listens on, if any.
    fn channel(&self) -> Option<Channel>;

    /// Fetches a complete baseline. `previous` carries view-local state such
    /// as the current selection.
    async fn load(&self, source: &dyn DataSource, previous: &Self::Snapshot) -> Result<Self::Snapshot, ClientError>;

    /// Installs a loaded baseline over the current snapshot.
    fn adopt(&self, current: &mut Self::Snapshot, loaded: Self::Snapshot) {
        *current = loaded;
    }

    /// Clears the snapshot ahead of a mode switch. Views override this to
    /// keep user choices; fetched data must not survive.
    fn reset_for_mode(&self, current: &mut Self::Snapshot) {
        *current = Self::Snapshot::default();
    }

    fn reconcile(&self, snapshot: &mut Self::Snapshot, event: ChannelEvent) -> FollowUp;

    fn update(&self, snapshot: &mut Self::Snapshot, action: Self::Action) -> Dispatch<Self::Command>;

    async fn execute(
        &self,
        source: &dyn DataSource,
        session: &SessionContext,
        command: Self::Command,
    ) -> Result<(), ClientError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

/// The two providers a view can switch between.
#[derive(Clone)]
pub struct SourceSet {
    mock: Arc<dyn DataSource>,
    live: Arc<dyn DataSource>,
}

impl SourceSet {
    pub fn new(mock: Arc<dyn DataSource>, live: Arc<dyn DataSource>) -> Self {
        Self { mock, live }
    }

    pub fn get(&self, mode: DataMode) -> Arc<dyn DataSource> {
        match mode {
            DataMode::Mock => self.mock.clone(),
            DataMode::Live => self.live.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Published state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a renderer needs from a view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate<S> {
    pub snapshot: S,
    pub mode: DataMode,
    pub connection: ConnectionState,
    /// A baseline fetch is in flight.
    pub loading: bool,
    /// The last baseline fetch failed; `snapshot` predates it.
    pub stale: bool,
    pub last_error: Option<String>,
    /// Count of completed baseline loads.
    pub loads: u64,
    pub running: bool,
}

enum Command<A> {
    SetMode(DataMode),
    Reload,
    Dispatch(A),
    Shutdown,
}

enum Internal<S> {
    Loaded { seq: u64, result: Result<S, ClientError> },
    CommandDone { epoch: u64, label: String, result: Result<(), ClientError> },
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

pub struct ViewRuntime<V: View> {
    view: Arc<V>,
    sources: SourceSet,
    session: Arc<SessionContext>,
    mode: DataMode,
    snapshot: V::Snapshot,
    connection: ConnectionManager,
    load_seq: u64,
    load_task: Option<JoinHandle<()>>,
    mode_epoch: u64,
    loading: bool,
    stale: bool,
    last_error: Option<String>,
    loads: u64,
    commands: mpsc::UnboundedReceiver<Command<V::Action>>,
    internal_tx: mpsc::UnboundedSender<Internal<V::Snapshot>>,
    internal_rx: mpsc::UnboundedReceiver<Internal<V::Snapshot>>,
    link_tx: mpsc::UnboundedSender<Tagged>,
    link_rx: mpsc::UnboundedReceiver<Tagged>,
    updates: watch::Sender<ViewUpdate<V::Snapshot>>,
}

impl<V: View> ViewRuntime<V> {
    /// Starts `view` on its own task and returns a handle to it.
    pub fn spawn(
        view: V,
        sources: SourceSet,
        session: Arc<SessionContext>,
        mode: DataMode,
        reconnect: ReconnectPolicy,
    ) -> ViewHandle<V> {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (updates, updates_rx) = watch::channel(ViewUpdate {
            snapshot: V::Snapshot::default(),
            mode,
            connection: ConnectionState::Idle,
            loading: false,
            stale: false,
            last_error: None,
            loads: 0,
            running: true,
        });

        let name = view.name();
        let connection = ConnectionManager::new(view.channel(), reconnect);
        let runtime = Self {
            view: Arc::new(view),
            sources,
            session,
            mode,
            snapshot: V::Snapshot::default(),
            connection,
            load_seq: 0,
            load_task: None,
            mode_epoch: 0,
            loading: false,
            stale: false,
            last_error: None,
            loads: 0,
            commands,
            internal_tx,
            internal_rx,
            link_tx,
            link_rx,
            updates,
        };

        let task = tokio::spawn(runtime.run());
        ViewHandle { name, commands: command_tx, updates: updates_rx, task }
    }

    async fn run(mut self) {
        info!(view = self.view.name(), mode = %self.mode, "View activated");
        self.activate();
        self.publish(true);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
                Some(tagged) = self.link_rx.recv() => self.handle_link(tagged),
            }
            self.publish(true);
        }

        self.deactivate();
        self.publish(false);
        info!(view = self.view.name(), "View deactivated");
    }

    /// Baseline fetch and channel connect are issued together.
    fn activate(&mut self) {
        let source = self.sources.get(self.mode);
        self.connection.connect(source, self.link_tx.clone());
        self.start_load();
    }

    fn deactivate(&mut self) {
        self.connection.teardown();
        self.cancel_load();
        self.loading = false;
    }

    fn cancel_load(&mut self) {
        self.load_seq += 1;
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
    }

    fn start_load(&mut self) {
        self.cancel_load();
        let seq = self.load_seq;
        let view = self.view.clone();
        let source = self.sources.get(self.mode);
        let previous = self.snapshot.clone();
        let tx = self.internal_tx.clone();

        debug!(view = view.name(), seq, mode = %self.mode, "Loading baseline");
        self.loading = true;
        self.load_task = Some(tokio::spawn(async move {
            let result = view.load(source.as_ref(), &previous).await;
            let _ = tx.send(Internal::Loaded { seq, result });
        }));
    }

    fn handle_command(&mut self, command: Command<V::Action>) {
        match command {
            Command::SetMode(mode) => self.switch_mode(mode),
            Command::Reload => self.start_load(),
            Command::Dispatch(action) => self.dispatch(action),
            Command::Shutdown => {}
        }
    }

    /// No fetched data from the previous mode survives a switch.
    fn switch_mode(&mut self, mode: DataMode) {
        if mode == self.mode {
            debug!(view = self.view.name(), %mode, "Mode unchanged");
            return;
        }
        info!(view = self.view.name(), from = %self.mode, to = %mode, "Switching data mode");
        self.mode = mode;
        self.mode_epoch += 1;
        self.view.reset_for_mode(&mut self.snapshot);
        self.stale = false;
        self.last_error = None;
        self.activate();
    }

    fn dispatch(&mut self, action: V::Action) {
        let label = format!("{action:?}");
        match self.view.update(&mut self.snapshot, action) {
            Dispatch::Handled => {}
            Dispatch::Reload => self.start_load(),
            Dispatch::Execute(command) => self.execute(label, command),
        }
    }

    fn execute(&mut self, label: String, command: V::Command) {
        let epoch = self.mode_epoch;
        let view = self.view.clone();
        let source = self.sources.get(self.mode);
        let session = self.session.clone();
        let tx = self.internal_tx.clone();

        debug!(view = view.name(), command = %label, "Issuing command");
        tokio::spawn(async move {
            let result = view.execute(source.as_ref(), &session, command).await;
            let _ = tx.send(Internal::CommandDone { epoch, label, result });
        });
    }

    fn handle_internal(&mut self, internal: Internal<V::Snapshot>) {
        match internal {
            Internal::Loaded { seq, result } => self.finish_load(seq, result),
            Internal::CommandDone { epoch, label, result } => match result {
                Ok(()) if epoch == self.mode_epoch => {
                    info!(view = self.view.name(), command = %label, "Command completed");
                    self.start_load();
                }
                Ok(()) => debug!(view = self.view.name(), command = %label, "Command finished after mode change"),
                Err(e) => {
                    error!(view = self.view.name(), command = %label, error = %e, "Command failed");
                    self.last_error = Some(e.to_string());
                }
            },
        }
    }

    fn finish_load(&mut self, seq: u64, result: Result<V::Snapshot, ClientError>) {
        if seq != self.load_seq {
            debug!(view = self.view.name(), seq, current = self.load_seq, "Discarding stale baseline");
            return;
        }
        self.loading = false;
        self.load_task = None;

        match result {
            Ok(loaded) => {
                self.view.adopt(&mut self.snapshot, loaded);
                self.stale = false;
                self.last_error = None;
                self.loads += 1;
            }
            Err(e) => {
                warn!(view = self.view.name(), mode = %self.mode, error = %e, "Baseline fetch failed");
                self.stale = true;
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn handle_link(&mut self, (generation, link): Tagged) {
        let Some(event) = self.connection.accept(generation, link) else {
            return;
        };
        debug!(view = self.view.name(), kind = event.kind(), "Reconciling push event");
        if self.view.reconcile(&mut self.snapshot, event) == FollowUp::Reload {
            self.start_load();
        }
    }

    fn publish(&self, running: bool) {
        self.updates.send_replace(ViewUpdate {
            snapshot: self.snapshot.clone(),
            mode: self.mode,
            connection: self.connection.state(),
            loading: self.loading,
            stale: self.stale,
            last_error: self.last_error.clone(),
            loads: self.loads,
            running,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Control surface for a running view.
pub struct ViewHandle<V: View> {
    name: &'static str,
    commands: mpsc::UnboundedSender<Command<V::Action>>,
    updates: watch::Receiver<ViewUpdate<V::Snapshot>>,
    task: JoinHandle<()>,
}

impl<V: View> ViewHandle<V> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn set_mode(&self, mode: DataMode) {
        self.send(Command::SetMode(mode));
    }

    pub fn reload(&self) {
        self.send(Command::Reload);
    }

    pub fn dispatch(&self, action: V::Action) {
        self.send(Command::Dispatch(action));
    }

    fn send(&self, command: Command<V::Action>) {
        if self.commands.send(command).is_err() {
            warn!("View task has stopped; command dropped");
        }
    }

    pub fn current(&self) -> ViewUpdate<V::Snapshot> {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewUpdate<V::Snapshot>> {
        self.updates.clone()
    }

    /// Waits until a published update satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ViewUpdate<V::Snapshot>) -> bool,
    ) -> Option<ViewUpdate<V::Snapshot>> {
        let mut rx = self.updates.clone();
        let update = rx.wait_for(|u| predicate(u)).await.ok()?;
        Some(update.clone())
    }

    /// Stops the view, closing its channel, and returns the final update.
    pub async fn shutdown(self) -> ViewUpdate<V::Snapshot> {
        self.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            error!(error = %e, "View task panicked");
        }
        self.updates.borrow().clone()
    }
}
