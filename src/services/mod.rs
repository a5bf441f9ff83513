/// Event consumer maintaining gameplay analytics.
pub mod analytics;
/// OpenAPI documentation generation.
pub mod documentation;
/// Matchmaking, moves, reconnects and the bot opponent.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Public service for read-only game information.
pub mod public_service;
/// Disconnect watchdog forfeiting abandoned games.
pub mod watchdog;
/// WebSocket connection and message handling service.
pub mod websocket_service;
