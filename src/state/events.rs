//! Bounded, lossy pipeline carrying domain events to the analytics consumer.

use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use tokio::sync::mpsc;
use tracing::debug;

/// Something that happened to a game, as seen by the analytics stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// Both seats were bound and the game began.
    GameStarted {
        /// Game identifier.
        game_id: String,
        /// First participant.
        player_one: String,
        /// Second participant (possibly the bot).
        player_two: String,
        /// When the event was produced.
        at: SystemTime,
    },
    /// A disc was dropped.
    MoveMade {
        /// Game identifier.
        game_id: String,
        /// Display name of the mover.
        player: String,
        /// Column played.
        column: usize,
        /// When the event was produced.
        at: SystemTime,
    },
    /// The game finished by win, draw or forfeit.
    GameEnded {
        /// Game identifier.
        game_id: String,
        /// Display name of the winner, if any.
        winner: Option<String>,
        /// Whether the board filled without a winner.
        is_draw: bool,
        /// When the event was produced.
        at: SystemTime,
    },
}

impl DomainEvent {
    /// Build a [`DomainEvent::GameStarted`] stamped now.
    pub fn game_started(game_id: &str, player_one: &str, player_two: &str) -> Self {
        Self::GameStarted {
            game_id: game_id.to_owned(),
            player_one: player_one.to_owned(),
            player_two: player_two.to_owned(),
            at: SystemTime::now(),
        }
    }

    /// Build a [`DomainEvent::MoveMade`] stamped now.
    pub fn move_made(game_id: &str, player: &str, column: usize) -> Self {
        Self::MoveMade {
            game_id: game_id.to_owned(),
            player: player.to_owned(),
            column,
            at: SystemTime::now(),
        }
    }

    /// Build a [`DomainEvent::GameEnded`] stamped now.
    pub fn game_ended(game_id: &str, winner: Option<&str>, is_draw: bool) -> Self {
        Self::GameEnded {
            game_id: game_id.to_owned(),
            winner: winner.map(str::to_owned),
            is_draw,
            at: SystemTime::now(),
        }
    }

    /// Identifier of the game the event belongs to.
    pub fn game_id(&self) -> &str {
        match self {
            Self::GameStarted { game_id, .. }
            | Self::MoveMade { game_id, .. }
            | Self::GameEnded { game_id, .. } => game_id,
        }
    }
}

/// Producer side of the pipeline.
///
/// Publishing never waits: when the queue is full the event is discarded and
/// counted. Gameplay must not slow down because analytics lag behind.
pub struct EventBus {
    sender: mpsc::Sender<DomainEvent>,
    receiver: Mutex<Option<mpsc::Receiver<DomainEvent>>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Create a bus holding at most `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an event, dropping it if the queue is saturated.
    pub fn publish(&self, event: DomainEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(game_id = %err.into_inner().game_id(), "event queue saturated; event dropped");
            }
        }
    }

    /// Hand out the consumer end. Only the first call gets it.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<DomainEvent>> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Events accepted into the queue so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
