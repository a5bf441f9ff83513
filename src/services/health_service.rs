use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload, logging a few liveness counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let (active, completed) = state.registry().counts().await;
    debug!(active, completed, "health check");
    HealthResponse::ok()
}
