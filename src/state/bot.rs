//! Deterministic opponent used when matchmaking times out.

use crate::state::game::{BoardSnapshot, Player};

/// Display name reserved for the bot seat.
pub const BOT_NAME: &str = "Bot";

/// Pick a column for `bot`: win if possible, otherwise block, otherwise the
/// lowest open column. Returns `None` when the board is full.
pub fn choose_column(snapshot: &BoardSnapshot, bot: Player) -> Option<usize> {
    let candidates = snapshot.valid_moves();

    candidates
        .iter()
        .copied()
        .find(|&col| snapshot.wins_with(col, bot))
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|&col| snapshot.wins_with(col, bot.other()))
        })
        .or_else(|| candidates.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{COLS, Cell, Game, GameStatus, Grid, ROWS};

    fn grid_from(rows: [&str; ROWS]) -> Grid {
        let mut grid = [[Cell::Empty; COLS]; ROWS];
        for (r, line) in rows.iter().enumerate() {
            for (c, ch) in line.chars().enumerate() {
                grid[r][c] = match ch {
                    'X' => Cell::PlayerOne,
                    'O' => Cell::PlayerTwo,
                    _ => Cell::Empty,
                };
            }
        }
        grid
    }

    fn snapshot(rows: [&str; ROWS]) -> BoardSnapshot {
        BoardSnapshot::from_grid(grid_from(rows), Player::Two, GameStatus::InProgress)
    }

    #[test]
    fn takes_the_winning_column_first() {
        let snap = snapshot([
            ".......",
            ".......",
            ".......",
            ".......",
            "X.X....",
            "XOOO.XX",
        ]);
        assert_eq!(choose_column(&snap, Player::Two), Some(4));
    }

    #[test]
    fn blocks_an_immediate_threat() {
        let snap = snapshot([
            ".......",
            ".......",
            ".......",
            "......X",
            "......X",
            "O.O...X",
        ]);
        assert_eq!(choose_column(&snap, Player::Two), Some(6));
    }

    #[test]
    fn prefers_win_over_block() {
        let snap = snapshot([
            ".......",
            ".......",
            ".......",
            "O.....X",
            "O.....X",
            "O.....X",
        ]);
        assert_eq!(choose_column(&snap, Player::Two), Some(0));
    }

    #[test]
    fn falls_back_to_lowest_open_column() {
        let snap = snapshot([
            "X......",
            "O......",
            "X......",
            "O......",
            "X......",
            "O......",
        ]);
        assert_eq!(choose_column(&snap, Player::Two), Some(1));
    }

    #[test]
    fn no_move_on_full_board() {
        let snap = snapshot([
            "XOXOXOX", "XOXOXOX", "OXOXOXO", "OXOXOXO", "XOXOXOX", "XOXOXOX",
        ]);
        assert_eq!(choose_column(&snap, Player::Two), None);
    }

    #[test]
    fn lookahead_leaves_the_live_game_alone() {
        let mut game = Game::new("g", "alice");
        game.start(BOT_NAME);
        for col in [3, 0, 3, 0, 3] {
            let mover = game.current_turn();
            game.apply_move(col, mover).unwrap();
        }
        let before = game.grid();
        assert_eq!(choose_column(&game.snapshot(), Player::Two), Some(3));
        assert_eq!(game.grid(), before);
        assert_eq!(game.current_turn(), Player::Two);
    }
}
