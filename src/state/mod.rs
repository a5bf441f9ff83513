pub mod bot;
pub mod events;
pub mod game;
pub mod hub;
pub mod matchmaking;
pub mod registry;

use std::sync::Arc;

use tracing::warn;

use crate::{
    config::AppConfig,
    services::analytics::{self, Analytics},
};

use self::{events::EventBus, hub::ConnectionHub, matchmaking::MatchmakingQueue, registry::GameRegistry};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: every registry the server shares between
/// connections and background tasks.
pub struct AppState {
    config: AppConfig,
    registry: GameRegistry,
    matchmaking: MatchmakingQueue,
    hub: ConnectionHub,
    events: EventBus,
    analytics: Arc<Analytics>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Spawns the connection hub actor and the analytics consumer, so this must
    /// run inside a Tokio runtime.
    pub fn new(config: AppConfig) -> SharedState {
        let events = EventBus::new(config.event_capacity);
        let analytics = Arc::new(Analytics::default());

        match events.take_receiver() {
            Some(receiver) => {
                tokio::spawn(analytics::run(receiver, analytics.clone()));
            }
            None => warn!("event receiver already taken; analytics disabled"),
        }

        Arc::new(Self {
            config,
            registry: GameRegistry::new(),
            matchmaking: MatchmakingQueue::new(),
            hub: ConnectionHub::spawn(),
            events,
            analytics,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Active and completed games.
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    /// Players waiting for an opponent.
    pub fn matchmaking(&self) -> &MatchmakingQueue {
        &self.matchmaking
    }

    /// Live WebSocket sessions.
    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Producer side of the analytics pipeline.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Aggregates maintained by the analytics consumer.
    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }
}
