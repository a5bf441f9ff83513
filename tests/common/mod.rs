//! In-memory player sessions driving the service layer without sockets.

#![allow(dead_code)]

use std::time::Duration;

use axum::extract::ws::Message;
use connect_four_back::{
    config::AppConfig,
    services::{game_service, websocket_service},
    state::{AppState, SharedState},
};
use serde_json::Value;
use tokio::sync::mpsc;

pub use connect_four_back::services::game_service::SessionContext;

/// Column order that fills the board without four in a row, player one first.
pub const DRAW_SEQUENCE: [i64; 42] = [
    0, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, //
    2, 3, 2, 3, 2, 3, 3, 2, 3, 2, 3, 2, //
    4, 5, 4, 5, 4, 5, 5, 4, 5, 4, 5, 4, //
    6, 6, 6, 6, 6, 6,
];

pub fn state() -> SharedState {
    AppState::new(AppConfig::default())
}

/// A connected player: its router context plus the frames the hub queued for it.
pub struct Client {
    pub ctx: SessionContext,
    outbound: mpsc::Receiver<Message>,
}

impl Client {
    pub fn connect(state: &SharedState) -> Self {
        let (ctx, outbound) = websocket_service::connect(state);
        Self { ctx, outbound }
    }

    pub async fn send(&mut self, state: &SharedState, frame: Value) {
        self.send_raw(state, &frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, state: &SharedState, text: &str) {
        game_service::handle_text(state, &mut self.ctx, text).await;
    }

    pub async fn join(&mut self, state: &SharedState, username: &str) -> Value {
        self.send(state, serde_json::json!({"type": "JOIN", "username": username}))
            .await;
        self.next_of("JOINED").await
    }

    pub async fn play(&mut self, state: &SharedState, column: i64) {
        self.send(state, serde_json::json!({"type": "MOVE", "column": column}))
            .await;
    }

    pub async fn next(&mut self) -> Value {
        self.next_within(Duration::from_secs(1)).await
    }

    pub async fn next_within(&mut self, wait: Duration) -> Value {
        let frame = tokio::time::timeout(wait, self.outbound.recv())
            .await
            .expect("no frame within deadline")
            .expect("outbound queue closed");
        match frame {
            Message::Text(text) => serde_json::from_str(text.as_str()).expect("frame is JSON"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Skip frames until one of type `kind` arrives.
    pub async fn next_of(&mut self, kind: &str) -> Value {
        loop {
            let frame = self.next().await;
            if frame["type"] == kind {
                return frame;
            }
        }
    }

    /// Assert nothing is queued once the hub has processed every pending command.
    pub async fn assert_silent(&mut self, state: &SharedState) {
        state.hub().connection_count().await;
        if let Ok(frame) = self.outbound.try_recv() {
            panic!("unexpected frame {frame:?}");
        }
    }
}

/// Connect and pair two players, draining their join traffic. Returns the game id.
pub async fn pair(state: &SharedState, first: &str, second: &str) -> (Client, Client, String) {
    let mut one = Client::connect(state);
    let mut two = Client::connect(state);
    let joined = one.join(state, first).await;
    two.join(state, second).await;
    one.next_of("GAME_STATE").await;
    two.next_of("GAME_STATE").await;
    let game_id = joined["gameId"].as_str().unwrap_or_default().to_owned();
    (one, two, game_id)
}
