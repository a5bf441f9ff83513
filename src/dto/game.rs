use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::game::{COLS, Game, ROWS},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Authoritative game state as pushed to both participants.
pub struct GameStateView {
    pub game_id: String,
    pub player1: String,
    /// Empty while no second participant is bound.
    pub player2: String,
    /// Rows top to bottom; `0` empty, `1` player one, `2` player two.
    pub board: Vec<Vec<u8>>,
    /// `1` or `2`.
    pub current_turn: u8,
    /// `waiting`, `inProgress` or `finished`.
    pub state: String,
    /// `0` when there is no winner.
    pub winner: u8,
    pub is_draw: bool,
    pub is_bot_game: bool,
}

impl From<&Game> for GameStateView {
    fn from(game: &Game) -> Self {
        let board = (0..ROWS)
            .map(|row| (0..COLS).map(|col| game.cell(row, col).code()).collect())
            .collect();

        Self {
            game_id: game.id.clone(),
            player1: game.player_one.clone(),
            player2: game.player_two.clone().unwrap_or_default(),
            board,
            current_turn: game.current_turn().code(),
            state: game.status().as_str().to_owned(),
            winner: game.winner().map_or(0, |player| player.code()),
            is_draw: game.is_draw(),
            is_bot_game: game.is_bot_game,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Read-only game lookup returned over HTTP.
pub struct GameDetailResponse {
    #[serde(flatten)]
    pub game: GameStateView,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl From<&Game> for GameDetailResponse {
    fn from(game: &Game) -> Self {
        Self {
            game: game.into(),
            created_at: format_system_time(game.created_at),
            started_at: game.started_at.map(format_system_time),
            ended_at: game.ended_at.map(format_system_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_encodes_cells_and_status() {
        let mut game = Game::new("g1", "alice");
        game.start("bob");
        let mover = game.current_turn();
        game.apply_move(3, mover).unwrap();

        let view = GameStateView::from(&game);
        assert_eq!(view.board.len(), ROWS);
        assert_eq!(view.board[ROWS - 1][3], 1);
        assert_eq!(view.current_turn, 2);
        assert_eq!(view.state, "inProgress");
        assert_eq!(view.winner, 0);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["player1"], "alice");
        assert_eq!(json["isBotGame"], false);
        assert_eq!(json["currentTurn"], 2);
    }

    #[test]
    fn detail_flattens_view_and_formats_timestamps() {
        let game = Game::new("g2", "alice");
        let json = serde_json::to_value(GameDetailResponse::from(&game)).unwrap();
        assert_eq!(json["gameId"], "g2");
        assert_eq!(json["state"], "waiting");
        assert_eq!(json["player2"], "");
        assert!(json["createdAt"].as_str().unwrap().contains('T'));
        assert!(json.get("startedAt").is_none());
    }
}
