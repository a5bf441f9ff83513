//! Registry of live WebSocket sessions, driven by a single actor task.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use axum::extract::ws::Message;
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque identifier of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Last time a frame was seen on a connection.
///
/// Shared between the inbound pump, which touches it, and the disconnect
/// watchdog, which reads it through the game's seat bindings.
#[derive(Debug, Clone)]
pub struct ActivityClock(Arc<Mutex<Instant>>);

impl ActivityClock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    /// Record activity now.
    pub fn touch(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Instant of the last recorded activity.
    pub fn last(&self) -> Instant {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery side of a session, owned by the hub once registered.
///
/// The hub holds the only long-lived sender, so unregistering closes the
/// outbound queue.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    outbound: mpsc::Sender<Message>,
}

impl SessionHandle {
    /// Create a handle with a bounded outbound queue, returning the receiving
    /// end for the outbound pump.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: SessionId::new(),
            outbound,
        };
        (handle, rx)
    }

    /// Identifier of the session.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

enum HubCommand {
    Register(SessionHandle),
    Unregister(SessionId),
    Send { session: SessionId, message: Message },
    Broadcast(Message),
    Count(oneshot::Sender<usize>),
}

#[derive(Default)]
struct HubStats {
    dropped: AtomicU64,
}

/// Cheap-to-clone front of the connection actor.
#[derive(Clone)]
pub struct ConnectionHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    stats: Arc<HubStats>,
}

impl ConnectionHub {
    /// Spawn the actor task on the current runtime.
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(HubStats::default());
        tokio::spawn(run(rx, stats.clone()));
        Self { commands, stats }
    }

    /// Add a session to the live set.
    pub fn register(&self, handle: SessionHandle) {
        self.submit(HubCommand::Register(handle));
    }

    /// Remove a session and close its outbound queue. Unknown ids are ignored.
    pub fn unregister(&self, session: SessionId) {
        self.submit(HubCommand::Unregister(session));
    }

    /// Queue a message for one session. Dropped silently if the session is
    /// gone or its queue is full.
    pub fn send_to(&self, session: SessionId, message: Message) {
        self.submit(HubCommand::Send { session, message });
    }

    /// Queue a message for every live session. Sessions that cannot keep up
    /// are disconnected instead of stalling the others.
    pub fn broadcast(&self, message: Message) {
        self.submit(HubCommand::Broadcast(message));
    }

    /// Number of registered sessions, observed after every command queued so far.
    pub async fn connection_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::Count(tx));
        rx.await.unwrap_or_default()
    }

    /// Messages discarded because a queue was full or closed.
    pub fn dropped_messages(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    fn submit(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            warn!("connection hub is not running; command discarded");
        }
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<HubCommand>, stats: Arc<HubStats>) {
    let mut sessions: HashMap<SessionId, SessionHandle> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register(handle) => {
                debug!(session = %handle.id, "session registered");
                sessions.insert(handle.id, handle);
            }
            HubCommand::Unregister(session) => {
                if sessions.remove(&session).is_some() {
                    debug!(session = %session, "session unregistered");
                }
            }
            HubCommand::Send { session, message } => {
                let Some(handle) = sessions.get(&session) else {
                    debug!(session = %session, "dropping message for unknown session");
                    continue;
                };
                if let Err(err) = handle.outbound.try_send(message) {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    match err {
                        mpsc::error::TrySendError::Full(_) => {
                            warn!(session = %session, "outbound queue full; message dropped")
                        }
                        mpsc::error::TrySendError::Closed(_) => {
                            sessions.remove(&session);
                        }
                    }
                }
            }
            HubCommand::Broadcast(message) => {
                let mut stalled = Vec::new();
                for (id, handle) in &sessions {
                    if handle.outbound.try_send(message.clone()).is_err() {
                        stalled.push(*id);
                    }
                }
                for id in stalled {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    sessions.remove(&id);
                    info!(session = %id, "session dropped during broadcast");
                }
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(sessions.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn targeted_send_reaches_only_that_session() {
        let hub = ConnectionHub::spawn();
        let (a, mut rx_a) = SessionHandle::new(8);
        let (b, mut rx_b) = SessionHandle::new(8);
        let a_id = a.id();
        hub.register(a);
        hub.register(b);

        hub.send_to(a_id, Message::Text("hello".into()));
        assert_eq!(hub.connection_count().await, 2);

        assert_eq!(text(rx_a.recv().await.unwrap()), "hello");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_closes_queue_once_and_is_idempotent() {
        let hub = ConnectionHub::spawn();
        let (handle, mut rx) = SessionHandle::new(8);
        let id = handle.id();
        hub.register(handle);
        hub.unregister(id);
        hub.unregister(id);
        assert_eq!(hub.connection_count().await, 0);
        assert!(rx.recv().await.is_none());

        hub.send_to(id, Message::Text("late".into()));
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.dropped_messages(), 0);
    }

    #[tokio::test]
    async fn broadcast_drops_sessions_with_full_queues() {
        let hub = ConnectionHub::spawn();
        let (slow, mut slow_rx) = SessionHandle::new(1);
        let (fast, mut fast_rx) = SessionHandle::new(8);
        let slow_id = slow.id();
        hub.register(slow);
        hub.register(fast);

        hub.send_to(slow_id, Message::Text("first".into()));
        hub.broadcast(Message::Text("news".into()));
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.dropped_messages(), 1);

        assert_eq!(text(fast_rx.recv().await.unwrap()), "news");
        assert_eq!(text(slow_rx.recv().await.unwrap()), "first");
        assert!(slow_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_queue_drops_targeted_message_but_keeps_session() {
        let hub = ConnectionHub::spawn();
        let (handle, mut rx) = SessionHandle::new(1);
        let id = handle.id();
        hub.register(handle);
        hub.send_to(id, Message::Text("one".into()));
        hub.send_to(id, Message::Text("two".into()));
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.dropped_messages(), 1);
        assert_eq!(text(rx.recv().await.unwrap()), "one");
    }

    #[tokio::test(start_paused = true)]
    async fn activity_clock_tracks_latest_touch() {
        let clock = ActivityClock::new();
        let start = clock.last();
        tokio::time::advance(std::time::Duration::from_secs(3)).await;
        assert_eq!(clock.last(), start);
        clock.clone().touch();
        assert_eq!(clock.last() - start, std::time::Duration::from_secs(3));
    }
}
