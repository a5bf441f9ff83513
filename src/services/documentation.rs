use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Connect Four backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_leaderboard,
        crate::routes::public::get_analytics,
        crate::routes::public::get_game,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::public::LeaderboardResponse,
            crate::dto::public::AnalyticsResponse,
            crate::dto::game::GameStateView,
            crate::dto::game::GameDetailResponse,
            crate::dto::ws::ClientMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Read-only leaderboard, analytics and game lookups"),
        (name = "players", description = "WebSocket protocol for players"),
    )
)]
pub struct ApiDoc;
