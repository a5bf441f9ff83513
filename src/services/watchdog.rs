//! Periodic sweep that forfeits games abandoned by one side.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::{
    services::game_service::{GameUpdate, conclude, push_state},
    state::{
        SharedState,
        game::{Game, GameStatus, Player},
    },
};

/// Run the sweep every `watchdog_interval` until the runtime shuts down.
pub async fn run(state: SharedState) {
    let period = state.config().watchdog_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(?period, "disconnect watchdog started");

    loop {
        ticker.tick().await;
        let forfeited = sweep(&state).await;
        if !forfeited.is_empty() {
            debug!(count = forfeited.len(), "watchdog forfeited games");
        }
    }
}

/// Forfeit every in-progress game with an inactive side, returning the ids of
/// the games that ended.
pub async fn sweep(state: &SharedState) -> Vec<String> {
    let threshold = state.config().inactivity_timeout;
    let mut forfeited = Vec::new();

    for slot in state.registry().active_games().await {
        let update = {
            let mut game = slot.lock().await;
            let Some(loser) = inactive_side(&game, Instant::now(), threshold) else {
                continue;
            };
            if let Err(err) = game.forfeit(loser) {
                warn!(game_id = %game.id, error = %err, "forfeit rejected");
                continue;
            }
            info!(
                game_id = %game.id,
                loser = ?game.name_of(loser),
                winner = ?game.winner_name(),
                "side inactive; game forfeited"
            );
            GameUpdate::capture(&game)
        };

        push_state(state, &update);
        conclude(state, &update).await;
        forfeited.push(slot.id().to_owned());
    }

    forfeited
}

/// The side considered gone: its connection and the game's last move are
/// both older than `threshold`. Player one is checked first; the bot never
/// goes inactive.
fn inactive_side(game: &Game, now: Instant, threshold: Duration) -> Option<Player> {
    if game.status() != GameStatus::InProgress {
        return None;
    }
    let stale = |since: Instant| now.saturating_duration_since(since) > threshold;
    if !stale(game.last_move_at()) {
        return None;
    }

    [Player::One, Player::Two]
        .into_iter()
        .filter(|player| !(game.is_bot_game && *player == Player::Two))
        .find(|player| {
            game.seat(*player)
                .is_some_and(|seat| stale(seat.activity.last()))
        })
}
