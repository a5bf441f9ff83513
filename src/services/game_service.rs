//! Routing of player requests: matchmaking, moves, reconnects and the bot.

use tokio::time::sleep;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dto::{
        game::GameStateView,
        ws::{ClientMessage, JoinRequest, ServerMessage},
    },
    error::ServiceError,
    services::websocket_service::{broadcast_message, send_message},
    state::{
        SharedState,
        bot::{self, BOT_NAME},
        events::DomainEvent,
        game::{Game, GameStatus, Player, SeatBinding},
        hub::{ActivityClock, SessionId},
        matchmaking::{JoinOutcome, WaitingPlayer},
        registry::SharedGame,
    },
};

/// Per-connection facts the router needs between requests.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: SessionId,
    activity: ActivityClock,
    username: Option<String>,
    game_id: Option<String>,
}

impl SessionContext {
    /// Context for a freshly registered connection.
    pub fn new(id: SessionId, activity: ActivityClock) -> Self {
        Self {
            id,
            activity,
            username: None,
            game_id: None,
        }
    }

    /// Hub identifier of the connection.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Display name claimed by the last successful join or reconnect.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Game the connection is bound to, used when a move omits `gameId`.
    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        self.activity.touch();
    }

    /// Binding to store in a game seat for this connection.
    pub fn seat(&self) -> SeatBinding {
        SeatBinding {
            session: self.id,
            activity: self.activity.clone(),
        }
    }
}

/// What is left to do once a game lock has been released.
#[derive(Debug)]
pub(crate) struct GameUpdate {
    pub(crate) view: GameStateView,
    pub(crate) sessions: Vec<SessionId>,
    pub(crate) winner: Option<String>,
    pub(crate) is_draw: bool,
    pub(crate) bot_to_move: bool,
}

impl GameUpdate {
    pub(crate) fn capture(game: &Game) -> Self {
        Self {
            view: GameStateView::from(game),
            sessions: game.bound_sessions(),
            winner: game.winner_name().map(str::to_owned),
            is_draw: game.is_draw(),
            bot_to_move: game.is_bot_game
                && game.status() == GameStatus::InProgress
                && game.current_turn() == Player::Two,
        }
    }

    fn game_id(&self) -> &str {
        &self.view.game_id
    }
}

/// Decode a text frame and route it; failures are answered with `ERROR`.
pub async fn handle_text(state: &SharedState, ctx: &mut SessionContext, text: &str) {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(session = %ctx.id, error = %err, "undecodable frame");
            send_message(state, ctx.id, &ServerMessage::error("invalid message format"));
            return;
        }
    };

    if let Err(err) = handle_message(state, ctx, message).await {
        info!(session = %ctx.id, error = %err, "request rejected");
        send_message(state, ctx.id, &ServerMessage::error(err.to_string()));
    }
}

/// Route a decoded message to its handler.
pub async fn handle_message(
    state: &SharedState,
    ctx: &mut SessionContext,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    match message {
        ClientMessage::Join { username } => join(state, ctx, &username).await,
        ClientMessage::Move { game_id, column } => {
            make_move(state, ctx, game_id, column).await
        }
        ClientMessage::Reconnect { game_id, username } => {
            reconnect(state, ctx, game_id, username).await
        }
        ClientMessage::GetLeaderboard => {
            send_leaderboard(state, ctx.id).await;
            Ok(())
        }
        ClientMessage::Unknown => Err(ServiceError::InvalidInput("unknown message type".into())),
    }
}

async fn join(
    state: &SharedState,
    ctx: &mut SessionContext,
    username: &str,
) -> Result<(), ServiceError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ServiceError::InvalidInput("username is required".into()));
    }
    if username.eq_ignore_ascii_case(BOT_NAME) {
        return Err(ServiceError::InvalidInput(format!(
            "username `{BOT_NAME}` is reserved"
        )));
    }
    JoinRequest {
        username: username.to_owned(),
    }
    .validate()?;

    ctx.username = Some(username.to_owned());

    match state.matchmaking().join(username, ctx.seat()).await {
        JoinOutcome::Queued {
            game_id,
            newly_queued,
        } => {
            info!(session = %ctx.id, %username, %game_id, newly_queued, "player waiting for opponent");
            ctx.game_id = Some(game_id.clone());
            send_message(
                state,
                ctx.id,
                &ServerMessage::Joined {
                    game_id: game_id.clone(),
                    username: username.to_owned(),
                },
            );
            if newly_queued {
                schedule_bot_fallback(state.clone(), username.to_owned(), game_id);
            }
        }
        JoinOutcome::Paired { opponent } => {
            ctx.game_id = Some(opponent.game_id.clone());
            send_message(
                state,
                ctx.id,
                &ServerMessage::Joined {
                    game_id: opponent.game_id.clone(),
                    username: username.to_owned(),
                },
            );
            start_paired_game(state, opponent, username, ctx.seat()).await;
        }
    }
    Ok(())
}

async fn start_paired_game(
    state: &SharedState,
    opponent: WaitingPlayer,
    username: &str,
    seat: SeatBinding,
) {
    let mut game = Game::new(opponent.game_id, opponent.username);
    game.bind(Player::One, opponent.seat);
    game.bind(Player::Two, seat);
    game.start(username);

    info!(game_id = %game.id, player_one = %game.player_one, player_two = %username, "game started");
    let update = GameUpdate::capture(&game);
    state.events().publish(DomainEvent::game_started(
        &game.id,
        &game.player_one,
        username,
    ));
    state.registry().insert(game).await;
    push_state(state, &update);
}

fn schedule_bot_fallback(state: SharedState, username: String, game_id: String) {
    tokio::spawn(async move {
        sleep(state.config().matchmaking_timeout).await;
        start_bot_game(&state, &username, &game_id).await;
    });
}

/// Start a bot game for `username` if it still waits under `game_id`.
///
/// Returns `false` when the entry was consumed by a pairing or replaced by a
/// newer join in the meantime.
pub async fn start_bot_game(state: &SharedState, username: &str, game_id: &str) -> bool {
    let Some(waiter) = state.matchmaking().take_if_waiting(username, game_id).await else {
        debug!(%username, %game_id, "bot fallback skipped; player no longer waiting");
        return false;
    };

    let waited = waiter.joined_at.elapsed();
    let mut game = Game::new(waiter.game_id, waiter.username);
    game.is_bot_game = true;
    game.bind(Player::One, waiter.seat);
    game.start(BOT_NAME);

    info!(
        game_id = %game.id,
        player_one = %game.player_one,
        ?waited,
        "no opponent found; bot game started"
    );
    let update = GameUpdate::capture(&game);
    state.events().publish(DomainEvent::game_started(
        &game.id,
        &game.player_one,
        BOT_NAME,
    ));
    state.registry().insert(game).await;
    push_state(state, &update);
    true
}

async fn make_move(
    state: &SharedState,
    ctx: &SessionContext,
    game_id: Option<String>,
    column: Option<i64>,
) -> Result<(), ServiceError> {
    let game_id = game_id
        .filter(|id| !id.is_empty())
        .or_else(|| ctx.game_id.clone())
        .ok_or_else(|| ServiceError::InvalidInput("game ID is required".into()))?;
    let column = column.ok_or_else(|| ServiceError::InvalidInput("column is required".into()))?;
    let slot = state
        .registry()
        .lookup(&game_id)
        .await
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;
    let username = ctx.username.clone().ok_or(ServiceError::NotParticipant)?;
    // Negative indices fall through to the engine's column check.
    let column = usize::try_from(column).unwrap_or(usize::MAX);

    let (outcome, update) = {
        let mut game = slot.lock().await;
        let player = game.seat_of(&username).ok_or(ServiceError::NotParticipant)?;
        let outcome = game.apply_move(column, player)?;
        (outcome, GameUpdate::capture(&game))
    };

    debug!(%game_id, %username, column, ?outcome, "move applied");
    state
        .events()
        .publish(DomainEvent::move_made(&game_id, &username, column));
    push_state(state, &update);

    if outcome.is_terminal() {
        conclude(state, &update).await;
    } else if update.bot_to_move {
        schedule_bot_move(state.clone(), slot);
    }
    Ok(())
}

fn schedule_bot_move(state: SharedState, slot: SharedGame) {
    tokio::spawn(async move {
        sleep(state.config().bot_move_delay).await;
        play_bot_turn(&state, &slot).await;
    });
}

/// Let the bot play if it is its turn, returning the column it dropped into.
pub async fn play_bot_turn(state: &SharedState, slot: &SharedGame) -> Option<usize> {
    let (column, outcome, update) = {
        let mut game = slot.lock().await;
        if !game.is_bot_game
            || game.status() != GameStatus::InProgress
            || game.current_turn() != Player::Two
        {
            return None;
        }
        let column = bot::choose_column(&game.snapshot(), Player::Two)?;
        match game.apply_move(column, Player::Two) {
            Ok(outcome) => (column, outcome, GameUpdate::capture(&game)),
            Err(err) => {
                warn!(game_id = %game.id, column, error = %err, "bot move rejected");
                return None;
            }
        }
    };

    debug!(game_id = %slot.id(), column, ?outcome, "bot moved");
    state
        .events()
        .publish(DomainEvent::move_made(slot.id(), BOT_NAME, column));
    push_state(state, &update);
    if outcome.is_terminal() {
        conclude(state, &update).await;
    }
    Some(column)
}

async fn reconnect(
    state: &SharedState,
    ctx: &mut SessionContext,
    game_id: Option<String>,
    username: Option<String>,
) -> Result<(), ServiceError> {
    let game_id = game_id.filter(|id| !id.is_empty());
    let username = username
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty());

    let slot = match (&game_id, &username) {
        (Some(id), _) => state.registry().lookup(id).await,
        (None, Some(name)) => state.registry().lookup_by_participant(name).await,
        (None, None) => {
            return Err(ServiceError::InvalidInput(
                "game ID or username is required".into(),
            ));
        }
    }
    .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;

    let name = username
        .or_else(|| ctx.username.clone())
        .ok_or(ServiceError::NotParticipant)?;

    let view = {
        let mut game = slot.lock().await;
        let player = game
            .seat_of(&name)
            .filter(|player| !(game.is_bot_game && *player == Player::Two))
            .ok_or(ServiceError::NotParticipant)?;
        game.bind(player, ctx.seat());
        GameStateView::from(&*game)
    };

    info!(session = %ctx.id, username = %name, game_id = %slot.id(), "player reconnected");
    ctx.username = Some(name);
    ctx.game_id = Some(slot.id().to_owned());

    send_message(state, ctx.id, &ServerMessage::game_state(view));
    send_message(
        state,
        ctx.id,
        &ServerMessage::Reconnected {
            game_id: slot.id().to_owned(),
        },
    );
    Ok(())
}

async fn send_leaderboard(state: &SharedState, session: SessionId) {
    let data = state.registry().leaderboard().await;
    send_message(state, session, &ServerMessage::Leaderboard { data });
}

/// Push the game state to every session bound to the game.
pub(crate) fn push_state(state: &SharedState, update: &GameUpdate) {
    let message = ServerMessage::game_state(update.view.clone());
    for session in &update.sessions {
        send_message(state, *session, &message);
    }
}

/// Retire a finished game: move it to the completed set, publish the end
/// event and broadcast the refreshed leaderboard. Runs at most once per game.
pub(crate) async fn conclude(state: &SharedState, update: &GameUpdate) {
    if !state.registry().complete(update.game_id()).await {
        debug!(game_id = %update.game_id(), "game already completed");
        return;
    }

    info!(
        game_id = %update.game_id(),
        winner = ?update.winner,
        is_draw = update.is_draw,
        "game finished"
    );
    state.events().publish(DomainEvent::game_ended(
        update.game_id(),
        update.winner.as_deref(),
        update.is_draw,
    ));

    let data = state.registry().leaderboard().await;
    broadcast_message(state, &ServerMessage::Leaderboard { data });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    fn context() -> SessionContext {
        SessionContext::new(SessionId::new(), ActivityClock::new())
    }

    #[tokio::test]
    async fn join_rejects_blank_and_reserved_names() {
        let state = AppState::new(AppConfig::default());
        let mut ctx = context();

        let err = handle_message(&state, &mut ctx, ClientMessage::Join { username: "  ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "username is required");

        let err = handle_message(&state, &mut ctx, ClientMessage::Join { username: "bot".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(ctx.username().is_none());
        assert!(state.matchmaking().is_empty().await);
    }

    #[tokio::test]
    async fn move_requires_a_game_id_and_a_column() {
        let state = AppState::new(AppConfig::default());
        let mut ctx = context();

        let err = handle_message(
            &state,
            &mut ctx,
            ClientMessage::Move {
                game_id: None,
                column: Some(3),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "game ID is required");

        let err = handle_message(
            &state,
            &mut ctx,
            ClientMessage::Move {
                game_id: Some("missing".into()),
                column: Some(3),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "game not found");

        let err = handle_message(
            &state,
            &mut ctx,
            ClientMessage::Move {
                game_id: Some("missing".into()),
                column: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "column is required");
    }

    #[tokio::test]
    async fn unknown_and_reconnect_without_target_are_rejected() {
        let state = AppState::new(AppConfig::default());
        let mut ctx = context();

        let err = handle_message(&state, &mut ctx, ClientMessage::Unknown)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown message type");

        let err = handle_message(
            &state,
            &mut ctx,
            ClientMessage::Reconnect {
                game_id: None,
                username: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "game ID or username is required");
    }

    #[tokio::test]
    async fn bot_plays_only_on_its_turn() {
        let state = AppState::new(AppConfig::default());
        let mut game = Game::new("g1", "alice");
        game.is_bot_game = true;
        game.start(BOT_NAME);
        let slot = state.registry().insert(game).await;

        assert_eq!(play_bot_turn(&state, &slot).await, None);

        slot.lock().await.apply_move(3, Player::One).unwrap();
        assert_eq!(play_bot_turn(&state, &slot).await, Some(0));
        assert_eq!(slot.lock().await.current_turn(), Player::One);
    }

    #[tokio::test]
    async fn stale_fallback_does_not_start_a_bot_game() {
        let state = AppState::new(AppConfig::default());
        assert!(!start_bot_game(&state, "alice", "nope").await);
        assert_eq!(state.registry().counts().await, (0, 0));
    }
}
