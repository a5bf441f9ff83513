//! Active and completed games, keyed by game identifier.

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::state::game::Game;

/// Registry entry: immutable identity plus the game behind its own lock.
///
/// Every read-then-write sequence on a game (moves, forfeits, rebinding)
/// holds [`GameSlot::lock`] for its whole duration.
#[derive(Debug)]
pub struct GameSlot {
    id: String,
    player_one: String,
    player_two: String,
    game: Mutex<Game>,
}

impl GameSlot {
    fn new(game: Game) -> Self {
        Self {
            id: game.id.clone(),
            player_one: game.player_one.clone(),
            player_two: game.player_two.clone().unwrap_or_default(),
            game: Mutex::new(game),
        }
    }

    /// Game identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether `name` plays either seat.
    pub fn has_participant(&self, name: &str) -> bool {
        self.player_one == name || self.player_two == name
    }

    /// Acquire exclusive access to the game.
    pub async fn lock(&self) -> MutexGuard<'_, Game> {
        self.game.lock().await
    }
}

/// Shared handle to a registered game.
pub type SharedGame = Arc<GameSlot>;

#[derive(Default)]
struct Games {
    active: HashMap<String, SharedGame>,
    completed: HashMap<String, SharedGame>,
}

/// Concurrent map of games. Finished games are kept for reconnects and the
/// leaderboard and are never evicted.
#[derive(Default)]
pub struct GameRegistry {
    games: RwLock<Games>,
}

impl GameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a started game as active.
    pub async fn insert(&self, game: Game) -> SharedGame {
        let slot = Arc::new(GameSlot::new(game));
        let mut games = self.games.write().await;
        games.active.insert(slot.id.clone(), slot.clone());
        slot
    }

    /// Find a game by id, active games first.
    pub async fn lookup(&self, id: &str) -> Option<SharedGame> {
        let games = self.games.read().await;
        games
            .active
            .get(id)
            .or_else(|| games.completed.get(id))
            .cloned()
    }

    /// Find a game `name` takes part in, active games first.
    ///
    /// Linear in the number of games ever played; fine for the tens to low
    /// hundreds of concurrent games this server targets.
    pub async fn lookup_by_participant(&self, name: &str) -> Option<SharedGame> {
        let games = self.games.read().await;
        games
            .active
            .values()
            .find(|slot| slot.has_participant(name))
            .or_else(|| {
                games
                    .completed
                    .values()
                    .find(|slot| slot.has_participant(name))
            })
            .cloned()
    }

    /// Move a game from the active to the completed map. Returns `false` if it
    /// was not active (already completed or unknown).
    pub async fn complete(&self, id: &str) -> bool {
        let mut games = self.games.write().await;
        match games.active.remove(id) {
            Some(slot) => {
                games.completed.insert(id.to_owned(), slot);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the active games. The registry lock is released on return.
    pub async fn active_games(&self) -> Vec<SharedGame> {
        self.games.read().await.active.values().cloned().collect()
    }

    /// Number of active and completed games.
    pub async fn counts(&self) -> (usize, usize) {
        let games = self.games.read().await;
        (games.active.len(), games.completed.len())
    }

    /// Wins per player over completed games, most wins first, then by name.
    pub async fn leaderboard(&self) -> IndexMap<String, u32> {
        let completed: Vec<SharedGame> =
            self.games.read().await.completed.values().cloned().collect();

        let mut wins: HashMap<String, u32> = HashMap::new();
        for slot in completed {
            let game = slot.lock().await;
            if let Some(name) = game.winner_name() {
                *wins.entry(name.to_owned()).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, u32)> = wins.into_iter().collect();
        ranked.sort_by(|(a_name, a_wins), (b_name, b_wins)| {
            b_wins.cmp(a_wins).then_with(|| a_name.cmp(b_name))
        });
        ranked.into_iter().collect()
    }
}
