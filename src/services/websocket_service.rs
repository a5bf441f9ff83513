use std::{fmt::Display, time::Duration};

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ServerMessage,
    services::game_service::{self, SessionContext},
    state::{
        SharedState,
        hub::{ActivityClock, SessionHandle, SessionId},
    },
};

/// Handle the full lifecycle of one player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (sender, receiver) = socket.split();
    let (mut ctx, outbound) = connect(&state);
    info!(session = %ctx.id(), "player connected");

    let config = state.config();
    // Dedicated writer task keeps outbound messages and pings flowing while we await inbound frames.
    let writer_task = tokio::spawn(write_pump(
        sender,
        outbound,
        config.ping_interval,
        config.write_wait,
    ));

    read_pump(&state, &mut ctx, receiver).await;

    disconnect(&state, &ctx).await;
    finalize(writer_task).await;
    info!(session = %ctx.id(), username = ?ctx.username(), "player disconnected");
}

/// Register a new session with the hub and return its context together with
/// the receiving end of its outbound queue.
pub fn connect(state: &SharedState) -> (SessionContext, mpsc::Receiver<Message>) {
    let (handle, outbound) = SessionHandle::new(state.config().outbound_capacity);
    let ctx = SessionContext::new(handle.id(), ActivityClock::new());
    state.hub().register(handle);
    (ctx, outbound)
}

/// Tear down a session: leave the hub (closing its queue) and the
/// matchmaking queue. Games keep their seat bindings for the watchdog.
pub async fn disconnect(state: &SharedState, ctx: &SessionContext) {
    state.hub().unregister(ctx.id());
    let Some(username) = ctx.username() else {
        return;
    };
    if state.matchmaking().remove_session(username, ctx.id()).await {
        info!(session = %ctx.id(), %username, "left matchmaking on disconnect");
    }
}

/// Read frames until the peer closes, the transport fails, or nothing
/// arrives within `pong_wait`.
pub async fn read_pump<S, E>(state: &SharedState, ctx: &mut SessionContext, mut frames: S)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let deadline = state.config().pong_wait;

    loop {
        let frame = match timeout(deadline, frames.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                debug!(session = %ctx.id(), error = %err, "websocket receive error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                info!(session = %ctx.id(), "no frame within read deadline; closing");
                break;
            }
        };

        ctx.touch();
        match frame {
            Message::Text(text) => game_service::handle_text(state, ctx, text.as_str()).await,
            Message::Ping(payload) => state.hub().send_to(ctx.id(), Message::Pong(payload)),
            Message::Close(_) => break,
            Message::Pong(_) | Message::Binary(_) => {}
        }
    }
}

/// Drain the outbound queue into `sink`, pinging every `ping_interval` and
/// bounding each write by `write_wait`. Sends a close frame once the queue
/// has been closed by the hub.
pub async fn write_pump<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Message>,
    ping_interval: Duration,
    write_wait: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            queued = outbound.recv() => match queued {
                Some(message) => message,
                None => {
                    let _ = timeout(write_wait, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        match timeout(write_wait, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(error = %err, "websocket send failed");
                break;
            }
            Err(_) => {
                warn!(?write_wait, "websocket write timed out");
                break;
            }
        }
    }
}

/// Serialize a server message into a text frame.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

/// Queue a message for one session.
pub fn send_message(state: &SharedState, session: SessionId, message: &ServerMessage) {
    if let Some(frame) = encode(message) {
        state.hub().send_to(session, frame);
    }
}

/// Queue a message for every connected session.
pub fn broadcast_message(state: &SharedState, message: &ServerMessage) {
    if let Some(frame) = encode(message) {
        state.hub().broadcast(frame);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>) {
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};
    use futures::channel::mpsc as fmpsc;

    fn text_of(message: &Message) -> &str {
        match message {
            Message::Text(text) => text.as_str(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn write_pump_forwards_then_closes() {
        let (tx, rx) = mpsc::channel(8);
        let (sink, mut written) = fmpsc::unbounded();
        let pump = tokio::spawn(write_pump(
            sink,
            rx,
            Duration::from_secs(54),
            Duration::from_secs(10),
        ));

        tx.send(Message::Text("hello".into())).await.unwrap();
        drop(tx);
        pump.await.unwrap();

        let first = written.next().await.unwrap();
        assert_eq!(text_of(&first), "hello");
        assert!(matches!(written.next().await, Some(Message::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn write_pump_pings_on_idle_queue() {
        let (tx, rx) = mpsc::channel(8);
        let (sink, mut written) = fmpsc::unbounded();
        let pump = tokio::spawn(write_pump(
            sink,
            rx,
            Duration::from_secs(54),
            Duration::from_secs(10),
        ));

        tokio::time::sleep(Duration::from_secs(55)).await;
        drop(tx);
        pump.await.unwrap();

        assert!(matches!(written.next().await, Some(Message::Ping(_))));
        assert!(matches!(written.next().await, Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn read_pump_routes_text_and_answers_pings() {
        let state = AppState::new(AppConfig::default());
        let (mut ctx, mut outbound) = connect(&state);

        let frames = futures::stream::iter(vec![
            Ok::<_, axum::Error>(Message::Text(r#"{"type":"GET_LEADERBOARD"}"#.into())),
            Ok(Message::Ping(Bytes::from_static(b"hb"))),
            Ok(Message::Text("garbage".into())),
        ]);
        read_pump(&state, &mut ctx, frames).await;

        let leaderboard: serde_json::Value =
            serde_json::from_str(text_of(&outbound.recv().await.unwrap())).unwrap();
        assert_eq!(leaderboard["type"], "LEADERBOARD");
        assert!(matches!(outbound.recv().await, Some(Message::Pong(_))));
        let error: serde_json::Value =
            serde_json::from_str(text_of(&outbound.recv().await.unwrap())).unwrap();
        assert_eq!(error["error"], "invalid message format");
    }

    #[tokio::test(start_paused = true)]
    async fn read_pump_gives_up_after_deadline() {
        let state = AppState::new(AppConfig::default());
        let (mut ctx, _outbound) = connect(&state);
        let started = Instant::now();

        read_pump(
            &state,
            &mut ctx,
            futures::stream::pending::<Result<Message, axum::Error>>(),
        )
        .await;
        assert!(started.elapsed() >= state.config().pong_wait);
    }

    #[tokio::test]
    async fn disconnect_leaves_hub_and_queue() {
        let state = AppState::new(AppConfig::default());
        let (mut ctx, mut outbound) = connect(&state);
        game_service::handle_text(&state, &mut ctx, r#"{"type":"JOIN","username":"alice"}"#).await;
        assert!(state.matchmaking().is_waiting("alice").await);

        disconnect(&state, &ctx).await;
        assert!(!state.matchmaking().is_waiting("alice").await);
        assert_eq!(state.hub().connection_count().await, 0);

        // JOINED was delivered before the queue closed.
        assert!(outbound.recv().await.is_some());
        assert!(outbound.recv().await.is_none());
    }
}
