//! Consumer end of the event pipeline: running aggregates over game events.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::state::events::DomainEvent;

/// Start times kept for games whose end has not been seen. A `GameEnded`
/// lost to a full queue would otherwise pin its entry forever.
const PENDING_STARTS_LIMIT: usize = 4096;

#[derive(Debug, Default)]
struct AnalyticsData {
    total_games: u64,
    finished_games: u64,
    draws: u64,
    moves_made: u64,
    wins_per_player: HashMap<String, u64>,
    total_duration: Duration,
    timed_games: u64,
    started_at: HashMap<String, SystemTime>,
}

/// Point-in-time copy of the aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsSnapshot {
    /// Games started.
    pub total_games: u64,
    /// Games ended (win, draw or forfeit).
    pub finished_games: u64,
    /// Games ended without a winner.
    pub draws: u64,
    /// Moves played.
    pub moves_made: u64,
    /// Wins per player, most wins first.
    pub wins_per_player: IndexMap<String, u64>,
    /// Sum of durations of games whose start and end were both observed.
    pub total_duration: Duration,
    /// `total_duration` divided by the number of such games.
    pub average_duration: Duration,
}

/// Aggregates guarded by their own lock, independent from game state.
#[derive(Debug, Default)]
pub struct Analytics {
    data: RwLock<AnalyticsData>,
}

impl Analytics {
    /// Fold one event into the aggregates.
    pub async fn record(&self, event: &DomainEvent) {
        let mut data = self.data.write().await;
        match event {
            DomainEvent::GameStarted { game_id, at, .. } => {
                data.total_games += 1;
                if data.started_at.len() >= PENDING_STARTS_LIMIT {
                    evict_oldest_start(&mut data.started_at);
                }
                data.started_at.insert(game_id.clone(), *at);
            }
            DomainEvent::MoveMade { .. } => {
                data.moves_made += 1;
            }
            DomainEvent::GameEnded {
                game_id,
                winner,
                is_draw,
                at,
            } => {
                data.finished_games += 1;
                if *is_draw {
                    data.draws += 1;
                }
                if let Some(winner) = winner {
                    *data.wins_per_player.entry(winner.clone()).or_default() += 1;
                }
                if let Some(started) = data.started_at.remove(game_id) {
                    data.total_duration += at.duration_since(started).unwrap_or_default();
                    data.timed_games += 1;
                }
            }
        }
    }

    /// Copy the current aggregates.
    pub async fn snapshot(&self) -> AnalyticsSnapshot {
        let data = self.data.read().await;

        let mut wins: Vec<(String, u64)> = data
            .wins_per_player
            .iter()
            .map(|(name, wins)| (name.clone(), *wins))
            .collect();
        wins.sort_by(|(a_name, a_wins), (b_name, b_wins)| {
            b_wins.cmp(a_wins).then_with(|| a_name.cmp(b_name))
        });

        let average_duration = u32::try_from(data.timed_games)
            .ok()
            .filter(|count| *count > 0)
            .map(|count| data.total_duration / count)
            .unwrap_or_default();

        AnalyticsSnapshot {
            total_games: data.total_games,
            finished_games: data.finished_games,
            draws: data.draws,
            moves_made: data.moves_made,
            wins_per_player: wins.into_iter().collect(),
            total_duration: data.total_duration,
            average_duration,
        }
    }
}

fn evict_oldest_start(started_at: &mut HashMap<String, SystemTime>) {
    let oldest = started_at
        .iter()
        .min_by_key(|(_, at)| **at)
        .map(|(game_id, _)| game_id.clone());
    if let Some(game_id) = oldest {
        debug!(%game_id, "analytics: dropping start time of a game never seen ending");
        started_at.remove(&game_id);
    }
}

/// Drain the pipeline in order until every producer is gone.
pub async fn run(mut events: mpsc::Receiver<DomainEvent>, analytics: Arc<Analytics>) {
    info!("analytics consumer started");

    while let Some(event) = events.recv().await {
        match &event {
            DomainEvent::GameStarted {
                game_id,
                player_one,
                player_two,
                ..
            } => info!(%game_id, %player_one, %player_two, "analytics: game started"),
            DomainEvent::MoveMade {
                game_id,
                player,
                column,
                ..
            } => debug!(%game_id, %player, column, "analytics: move made"),
            DomainEvent::GameEnded {
                game_id,
                winner,
                is_draw,
                ..
            } => info!(%game_id, ?winner, is_draw, "analytics: game ended"),
        }
        analytics.record(&event).await;
    }

    info!("analytics consumer stopped");
}
