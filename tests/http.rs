mod common;

use connect_four_back::{routes, services::documentation::ApiDoc};
use utoipa::OpenApi;

#[tokio::test]
async fn router_builds_with_every_route() {
    let state = common::state();
    let _router = routes::router(state);
}

#[test]
fn openapi_lists_public_routes() {
    let doc = ApiDoc::openapi();
    for path in ["/health", "/leaderboard", "/analytics", "/games/{id}", "/ws"] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
}
