use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::{
        game::GameDetailResponse,
        public::{AnalyticsResponse, LeaderboardResponse},
    },
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Public read-only endpoints over games and statistics.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/analytics", get(get_analytics))
        .route("/games/{id}", get(get_game))
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "public",
    responses((status = 200, description = "Wins per player, most wins first", body = LeaderboardResponse))
)]
/// Return wins per player over completed games.
pub async fn get_leaderboard(State(state): State<SharedState>) -> Json<LeaderboardResponse> {
    Json(public_service::get_leaderboard(&state).await)
}

#[utoipa::path(
    get,
    path = "/analytics",
    tag = "public",
    responses((status = 200, description = "Gameplay aggregates and pipeline counters", body = AnalyticsResponse))
)]
/// Return the analytics snapshot.
pub async fn get_analytics(State(state): State<SharedState>) -> Json<AnalyticsResponse> {
    Json(public_service::get_analytics(&state).await)
}

#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "public",
    params(("id" = String, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game found", body = GameDetailResponse),
        (status = 404, description = "Unknown game")
    )
)]
/// Return one game, active or completed.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<GameDetailResponse>, AppError> {
    public_service::get_game(&state, &id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("game `{id}`")))
}
