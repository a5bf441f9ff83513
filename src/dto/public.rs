use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

/// Wins per player over completed games, most wins first.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = HashMap<String, u32>)]
pub struct LeaderboardResponse(pub IndexMap<String, u32>);

/// Aggregates computed by the analytics consumer plus pipeline counters.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    /// Games that reached the started state.
    pub total_games: u64,
    /// Games whose end was observed.
    pub finished_games: u64,
    /// Finished games without a winner.
    pub draws: u64,
    /// Moves observed across all games.
    pub moves_made: u64,
    /// Wins per player as seen by the event stream.
    #[schema(value_type = HashMap<String, u64>)]
    pub wins_per_player: IndexMap<String, u64>,
    /// Sum of game durations, in milliseconds.
    pub total_duration_ms: u64,
    /// Mean duration of finished games, in milliseconds.
    pub average_duration_ms: u64,
    /// Events accepted by the pipeline.
    pub events_published: u64,
    /// Events dropped because the pipeline was saturated.
    pub events_dropped: u64,
    /// Outbound messages dropped by the connection hub.
    pub messages_dropped: u64,
    /// Games currently in the active registry.
    pub active_games: usize,
    /// Games kept in the completed registry.
    pub completed_games: usize,
    /// Players waiting for an opponent.
    pub waiting_players: usize,
    /// Live WebSocket sessions.
    pub connections: usize,
}
