//! Players waiting for an opponent.

use std::collections::HashMap;

use rand::Rng;
use time::{OffsetDateTime, macros::format_description};
use tokio::{sync::RwLock, time::Instant};

use crate::state::{game::SeatBinding, hub::SessionId};

/// A player parked in the queue until an opponent or the bot shows up.
#[derive(Debug, Clone)]
pub struct WaitingPlayer {
    /// Display name.
    pub username: String,
    /// Connection that joined.
    pub seat: SeatBinding,
    /// Identifier already advertised to the player; the game will use it.
    pub game_id: String,
    /// When the player joined the queue.
    pub joined_at: Instant,
}

/// Result of [`MatchmakingQueue::join`].
#[derive(Debug)]
pub enum JoinOutcome {
    /// No opponent yet; the player waits under `game_id`.
    Queued {
        /// Identifier of the future game.
        game_id: String,
        /// `false` when the player was already waiting (idempotent re-join).
        newly_queued: bool,
    },
    /// An opponent was waiting and has been taken out of the queue.
    Paired {
        /// The waiter, whose `game_id` the new game must use.
        opponent: WaitingPlayer,
    },
}

/// Display name → waiting entry, at most one per name.
#[derive(Default)]
pub struct MatchmakingQueue {
    waiting: RwLock<HashMap<String, WaitingPlayer>>,
}

impl MatchmakingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `username` or pair it with any other waiting player.
    ///
    /// A repeated join keeps the advertised id but moves the entry to the
    /// latest connection. Only the map is touched under the lock; building
    /// and announcing the game is left to the caller.
    pub async fn join(&self, username: &str, seat: SeatBinding) -> JoinOutcome {
        let mut waiting = self.waiting.write().await;

        if let Some(existing) = waiting.get_mut(username) {
            if existing.seat.session != seat.session {
                existing.seat = seat;
            }
            return JoinOutcome::Queued {
                game_id: existing.game_id.clone(),
                newly_queued: false,
            };
        }

        let opponent_name = waiting.keys().find(|name| *name != username).cloned();
        if let Some(opponent) = opponent_name.and_then(|name| waiting.remove(&name)) {
            return JoinOutcome::Paired { opponent };
        }

        let game_id = new_game_id();
        waiting.insert(
            username.to_owned(),
            WaitingPlayer {
                username: username.to_owned(),
                seat,
                game_id: game_id.clone(),
                joined_at: Instant::now(),
            },
        );
        JoinOutcome::Queued {
            game_id,
            newly_queued: true,
        }
    }

    /// Remove the entry for `username` if it still waits under `game_id`.
    ///
    /// The bot fallback calls this when its timer fires; an entry consumed by
    /// a pairing (or replaced by a later join) yields `None`.
    pub async fn take_if_waiting(&self, username: &str, game_id: &str) -> Option<WaitingPlayer> {
        let mut waiting = self.waiting.write().await;
        if waiting
            .get(username)
            .is_some_and(|entry| entry.game_id == game_id)
        {
            waiting.remove(username)
        } else {
            None
        }
    }

    /// Drop the entry for `username` if it belongs to `session`.
    pub async fn remove_session(&self, username: &str, session: SessionId) -> bool {
        let mut waiting = self.waiting.write().await;
        if waiting
            .get(username)
            .is_some_and(|entry| entry.seat.session == session)
        {
            waiting.remove(username);
            true
        } else {
            false
        }
    }

    /// Whether `username` is currently waiting.
    pub async fn is_waiting(&self, username: &str) -> bool {
        self.waiting.read().await.contains_key(username)
    }

    /// Number of waiting players.
    pub async fn len(&self) -> usize {
        self.waiting.read().await.len()
    }

    /// Whether nobody is waiting.
    pub async fn is_empty(&self) -> bool {
        self.waiting.read().await.is_empty()
    }
}

/// Allocate a game identifier: UTC timestamp plus a random suffix.
pub fn new_game_id() -> String {
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .unwrap_or_else(|_| "00000000000000".into());
    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!("{stamp}-{suffix:06x}")
}
