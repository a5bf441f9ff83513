use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::game::GameStateView;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Enter matchmaking under a display name.
    #[serde(rename = "JOIN")]
    Join {
        /// Name to play under; missing decodes as empty and is rejected.
        #[serde(default)]
        username: String,
    },
    /// Drop a disc. Without `gameId` the session's current game is used.
    #[serde(rename = "MOVE")]
    Move {
        /// Target game.
        #[serde(default, rename = "gameId")]
        game_id: Option<String>,
        /// Zero-based column; out-of-range values are rule violations.
        #[serde(default)]
        column: Option<i64>,
    },
    /// Rebind this connection to an existing game, by id or by participant name.
    #[serde(rename = "RECONNECT")]
    Reconnect {
        /// Game to rebind to.
        #[serde(default, rename = "gameId")]
        game_id: Option<String>,
        /// Seat owner; defaults to the session's name.
        #[serde(default)]
        username: Option<String>,
    },
    /// Ask for wins per player.
    #[serde(rename = "GET_LEADERBOARD")]
    GetLeaderboard,
    /// Any other `type`; answered with an error.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Validate)]
/// Display name supplied with a join request.
pub struct JoinRequest {
    /// Trimmed display name.
    #[validate(length(min = 1, max = 32, message = "username must be 1 to 32 characters"))]
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
/// Messages pushed to player WebSocket clients.
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Matchmaking accepted the player; `game_id` identifies the future game.
    Joined {
        /// Id the game will carry once an opponent is found.
        game_id: String,
        /// Name the player was accepted under.
        username: String,
    },
    /// The connection is bound to an existing game again.
    Reconnected {
        /// Game the connection now follows.
        game_id: String,
    },
    /// Full authoritative game state.
    GameState {
        /// Same as `data.game_id`.
        game_id: String,
        /// Board, seats and status.
        data: GameStateView,
    },
    /// Wins per player over completed games.
    Leaderboard {
        /// Player name to win count, most wins first.
        data: IndexMap<String, u32>,
    },
    /// A request was rejected.
    Error {
        /// Human-readable reason.
        error: String,
    },
}

impl ServerMessage {
    /// Build an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Wrap a game state view.
    pub fn game_state(view: GameStateView) -> Self {
        Self::GameState {
            game_id: view.game_id.clone(),
            data: view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_client_messages() {
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"JOIN","username":"alice"}"#).unwrap(),
            ClientMessage::Join {
                username: "alice".into()
            }
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"MOVE","column":3}"#).unwrap(),
            ClientMessage::Move {
                game_id: None,
                column: Some(3)
            }
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"RECONNECT","gameId":"g1"}"#).unwrap(),
            ClientMessage::Reconnect {
                game_id: Some("g1".into()),
                username: None
            }
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"GET_LEADERBOARD"}"#).unwrap(),
            ClientMessage::GetLeaderboard
        );
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"DANCE"}"#).unwrap(),
            ClientMessage::Unknown
        );
        assert!(ClientMessage::from_json_str("not json").is_err());
    }

    #[test]
    fn missing_username_decodes_as_empty() {
        assert_eq!(
            ClientMessage::from_json_str(r#"{"type":"JOIN"}"#).unwrap(),
            ClientMessage::Join {
                username: String::new()
            }
        );
    }

    #[test]
    fn join_request_limits_length() {
        let request = |name: &str| JoinRequest {
            username: name.to_owned(),
        };
        assert!(request("alice").validate().is_ok());
        assert!(request("").validate().is_err());
        assert!(request(&"x".repeat(33)).validate().is_err());
    }

    #[test]
    fn server_messages_use_wire_names() {
        let joined = serde_json::to_value(ServerMessage::Joined {
            game_id: "g1".into(),
            username: "alice".into(),
        })
        .unwrap();
        assert_eq!(
            joined,
            serde_json::json!({"type": "JOINED", "gameId": "g1", "username": "alice"})
        );

        let error = serde_json::to_value(ServerMessage::error("not your turn")).unwrap();
        assert_eq!(
            error,
            serde_json::json!({"type": "ERROR", "error": "not your turn"})
        );
    }
}
