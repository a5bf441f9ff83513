//! Read-only projections served over HTTP.

use crate::{
    dto::{
        game::GameDetailResponse,
        public::{AnalyticsResponse, LeaderboardResponse},
    },
    state::SharedState,
};

/// Wins per player over completed games.
pub async fn get_leaderboard(state: &SharedState) -> LeaderboardResponse {
    LeaderboardResponse(state.registry().leaderboard().await)
}

/// Analytics aggregates merged with live counters from the registries, the
/// event pipeline and the connection hub.
pub async fn get_analytics(state: &SharedState) -> AnalyticsResponse {
    let snapshot = state.analytics().snapshot().await;
    let (active_games, completed_games) = state.registry().counts().await;

    AnalyticsResponse {
        total_games: snapshot.total_games,
        finished_games: snapshot.finished_games,
        draws: snapshot.draws,
        moves_made: snapshot.moves_made,
        wins_per_player: snapshot.wins_per_player,
        total_duration_ms: millis(snapshot.total_duration),
        average_duration_ms: millis(snapshot.average_duration),
        events_published: state.events().published(),
        events_dropped: state.events().dropped(),
        messages_dropped: state.hub().dropped_messages(),
        active_games,
        completed_games,
        waiting_players: state.matchmaking().len().await,
        connections: state.hub().connection_count().await,
    }
}

/// Look up one game, active or completed.
pub async fn get_game(state: &SharedState, game_id: &str) -> Option<GameDetailResponse> {
    let slot = state.registry().lookup(game_id).await?;
    let game = slot.lock().await;
    Some(GameDetailResponse::from(&*game))
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
