//! Per-view push channel lifecycle.
//!
//! ```text
//! Idle ──activate──▶ Connecting ──handshake──▶ Open ──close──▶ Closed
//!                         │                      │
//!                         └──────error───────────┴──────────▶ Errored
//! ```
//!
//! Any state re-enters `Connecting` on activation (view start, mode change,
//! or an opted-in reconnect). Teardown always lands in `Closed`.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tracelens_config::ReconnectPolicy;
use tracelens_core::{Channel, ChannelEvent, ChannelFrame, DataSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Inputs that move a [`ConnectionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Activate,
    HandshakeOk,
    RemoteClose,
    TransportError,
    Teardown,
}

impl ConnectionState {
    pub fn on(self, signal: Signal) -> Self {
        use ConnectionState::*;
        match (self, signal) {
            (_, Signal::Activate) => Connecting,
            (Idle, Signal::Teardown) => Idle,
            (_, Signal::Teardown) => Closed,
            (Connecting, Signal::HandshakeOk) => Open,
            (Connecting | Open, Signal::RemoteClose) => Closed,
            (Connecting | Open, Signal::TransportError) => Errored,
            (state, _) => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Open
    }

    /// What the connectivity indicator shows. Closed and errored look the same.
    pub fn indicator(&self) -> &'static str {
        match self {
            ConnectionState::Open => "connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Errored => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.indicator())
    }
}

/// What the pump task forwards to the owning view.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Frame(ChannelFrame),
    Reconnecting { attempt: u32 },
    Ended,
}

/// A [`Link`] stamped with the connection generation that produced it.
pub type Tagged = (u64, Link);

/// Owns at most one live subscription for a view.
///
/// Each connect or teardown bumps the generation; links from earlier
/// generations are ignored, so a socket is never reused across modes.
pub struct ConnectionManager {
    channel: Option<Channel>,
    reconnect: ReconnectPolicy,
    state: ConnectionState,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(channel: Option<Channel>, reconnect: ReconnectPolicy) -> Self {
        Self { channel, reconnect, state: ConnectionState::Idle, generation: 0, task: None }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    /// Tears down any open subscription and subscribes on `source`.
    /// Views without a channel stay idle.
    pub fn connect(&mut self, source: Arc<dyn DataSource>, sink: mpsc::UnboundedSender<Tagged>) {
        self.teardown();
        let Some(channel) = self.channel else {
            return;
        };

        self.state = self.state.on(Signal::Activate);
        let generation = self.generation;
        debug!(%channel, generation, mode = %source.mode(), "Connecting channel");
        self.task = Some(tokio::spawn(pump(source, channel, self.reconnect, generation, sink)));
    }

    /// Closes the subscription. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;
        let next = self.state.on(Signal::Teardown);
        if next != self.state {
            info!(channel = ?self.channel, "Channel torn down");
        }
        self.state = next;
    }

    /// Folds one link into the state. Returns the event to reconcile, if any.
    pub fn accept(&mut self, generation: u64, link: Link) -> Option<ChannelEvent> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Ignoring link from stale connection");
            return None;
        }

        match link {
            Link::Frame(ChannelFrame::Opened) => {
                self.state = self.state.on(Signal::HandshakeOk);
                None
            }
            Link::Frame(ChannelFrame::Event(event)) => Some(event),
            Link::Frame(ChannelFrame::Malformed(reason)) => {
                warn!(channel = ?self.channel, %reason, "Ignoring malformed push frame");
                None
            }
            Link::Frame(ChannelFrame::Failed(reason)) => {
                warn!(channel = ?self.channel, %reason, "Channel errored");
                self.state = self.state.on(Signal::TransportError);
                None
            }
            Link::Reconnecting { attempt } => {
                info!(channel = ?self.channel, attempt, "Reconnecting channel");
                self.state = self.state.on(Signal::Activate);
                None
            }
            Link::Ended => {
                self.state = self.state.on(Signal::RemoteClose);
                None
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn pump(
    source: Arc<dyn DataSource>,
    channel: Channel,
    policy: ReconnectPolicy,
    generation: u64,
    sink: mpsc::UnboundedSender<Tagged>,
) {
    let mut attempts = 0;
    let mut delay = policy.initial_delay();

    loop {
        let mut stream = source.subscribe(channel).await;
        while let Some(frame) = stream.next().await {
            if frame == ChannelFrame::Opened {
                attempts = 0;
                delay = policy.initial_delay();
            }
            if sink.send((generation, Link::Frame(frame))).is_err() {
                return;
            }
        }

        if !policy.allows(attempts) {
            let _ = sink.send((generation, Link::Ended));
            return;
        }
        attempts += 1;
        if sink.send((generation, Link::Reconnecting { attempt: attempts })).is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
        delay = policy.next_backoff(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tracelens_core::MetricsSummary;
    use tracelens_fixtures::FixtureSource;

    #[test]
    fn test_transitions() {
        use ConnectionState::*;
        assert_eq!(Idle.on(Signal::Activate), Connecting);
        assert_eq!(Connecting.on(Signal::HandshakeOk), Open);
        assert_eq!(Open.on(Signal::RemoteClose), Closed);
        assert_eq!(Open.on(Signal::TransportError), Errored);
        assert_eq!(Open.on(Signal::Teardown), Closed);
        assert_eq!(Errored.on(Signal::RemoteClose), Errored);
        assert_eq!(Closed.on(Signal::HandshakeOk), Closed);
        assert_eq!(Idle.on(Signal::Teardown), Idle);
        assert_eq!(Errored.indicator(), Closed.indicator());
        assert!(Open.is_connected());
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Tagged>) -> Tagged {
        timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_connect_open_event_teardown() {
        let source = Arc::new(FixtureSource::sample());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(Some(Channel::Metrics), ReconnectPolicy::default());

        manager.connect(source.clone(), tx);
        assert_eq!(manager.state(), ConnectionState::Connecting);

        let (generation, link) = next(&mut rx).await;
        assert_eq!(manager.accept(generation, link), None);
        assert_eq!(manager.state(), ConnectionState::Open);

        let summary = MetricsSummary { total_requests: 9, ..Default::default() };
        source.inject(ChannelEvent::MetricsUpdate(summary.clone()));
        let (generation, link) = next(&mut rx).await;
        assert_eq!(manager.accept(generation, link), Some(ChannelEvent::MetricsUpdate(summary)));

        manager.teardown();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(manager.accept(generation, Link::Ended), None);
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_failed_handshake_errors_without_reconnect() {
        let source = Arc::new(FixtureSource::sample());
        source.set_offline(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(Some(Channel::Alerts), ReconnectPolicy::default());

        manager.connect(source, tx);
        let (generation, link) = next(&mut rx).await;
        assert!(matches!(link, Link::Frame(ChannelFrame::Failed(_))));
        manager.accept(generation, link);
        assert_eq!(manager.state(), ConnectionState::Errored);

        let (generation, link) = next(&mut rx).await;
        assert_eq!(link, Link::Ended);
        manager.accept(generation, link);
        assert_eq!(manager.state(), ConnectionState::Errored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backs_off_until_open() {
        let source = Arc::new(FixtureSource::sample());
        source.set_offline(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let policy = ReconnectPolicy::enabled();
        let mut manager = ConnectionManager::new(Some(Channel::Alerts), policy);

        manager.connect(source.clone(), tx);
        let (g, link) = next(&mut rx).await;
        manager.accept(g, link);
        let (g, link) = next(&mut rx).await;
        assert_eq!(link, Link::Reconnecting { attempt: 1 });
        manager.accept(g, link);
        assert_eq!(manager.state(), ConnectionState::Connecting);

        source.set_offline(false);
        let (g, link) = next(&mut rx).await;
        assert_eq!(link, Link::Frame(ChannelFrame::Opened));
        manager.accept(g, link);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_channelless_view_stays_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(None, ReconnectPolicy::default());
        manager.connect(Arc::new(FixtureSource::sample()), tx);
        assert_eq!(manager.state(), ConnectionState::Idle);
    }
}
