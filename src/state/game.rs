//! Authoritative four-in-a-row rules for a single game instance.

use std::time::SystemTime;

use thiserror::Error;
use tokio::time::Instant;

use crate::state::hub::{ActivityClock, SessionId};

/// Number of rows on the board.
pub const ROWS: usize = 6;
/// Number of columns on the board.
pub const COLS: usize = 7;
/// Run length required to win.
const CONNECT: usize = 4;

/// Content of a single board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    /// No disc.
    #[default]
    Empty,
    /// Disc dropped by the first participant.
    PlayerOne,
    /// Disc dropped by the second participant (human or bot).
    PlayerTwo,
}

impl Cell {
    /// Numeric encoding used on the wire (`0`, `1`, `2`).
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::PlayerOne => 1,
            Cell::PlayerTwo => 2,
        }
    }
}

/// One of the two sides of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    /// Side that joined first and moves first.
    One,
    /// Side that joined second, or the bot.
    Two,
}

impl Player {
    /// The opposing side.
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Disc colour dropped by this side.
    pub fn cell(self) -> Cell {
        match self {
            Player::One => Cell::PlayerOne,
            Player::Two => Cell::PlayerTwo,
        }
    }

    /// Numeric encoding used on the wire (`1` or `2`).
    pub fn code(self) -> u8 {
        self.cell().code()
    }
}

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    /// Created, waiting for the second participant.
    Waiting,
    /// Both participants bound, moves accepted.
    InProgress,
    /// Won, drawn or forfeited. Terminal.
    Finished,
}

impl GameStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::InProgress => "inProgress",
            GameStatus::Finished => "finished",
        }
    }
}

/// Reasons a move is rejected. A rejected move never alters the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    /// The game is waiting or already finished.
    #[error("game is not in progress")]
    NotInProgress,
    /// The mover is not the side whose turn it is.
    #[error("not your turn")]
    WrongTurn,
    /// Column index outside the board.
    #[error("invalid column")]
    InvalidColumn,
    /// Top cell of the column already occupied.
    #[error("column is full")]
    ColumnFull,
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game continues; the turn passed to the other side.
    Continue,
    /// The mover completed four in a row.
    Win(Player),
    /// The board filled up without a winner.
    Draw,
}

impl MoveOutcome {
    /// Whether the move ended the game.
    pub fn is_terminal(self) -> bool {
        !matches!(self, MoveOutcome::Continue)
    }
}

/// The 6×7 grid, row 0 at the top.
pub type Grid = [[Cell; COLS]; ROWS];

/// Immutable copy of the rule-relevant part of a game.
///
/// Owns its grid by value, so speculative moves on a snapshot can never reach
/// the live [`Game`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSnapshot {
    grid: Grid,
    current_turn: Player,
    status: GameStatus,
}

impl BoardSnapshot {
    /// Build a snapshot directly from a grid, mainly for tests and tooling.
    pub fn from_grid(grid: Grid, current_turn: Player, status: GameStatus) -> Self {
        Self {
            grid,
            current_turn,
            status,
        }
    }

    /// Side to move.
    pub fn current_turn(&self) -> Player {
        self.current_turn
    }

    /// Status captured with the snapshot.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Cell at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.grid[row][col]
    }

    /// Columns with room for another disc, ascending.
    pub fn valid_moves(&self) -> Vec<usize> {
        valid_moves(&self.grid)
    }

    /// Whether dropping a `player` disc into `col` would complete four in a
    /// row. Works on a private copy of the grid.
    pub fn wins_with(&self, col: usize, player: Player) -> bool {
        let mut grid = self.grid;
        match drop_disc(&mut grid, col, player.cell()) {
            Some(row) => completes_line(&grid, row, col, player.cell()),
            None => false,
        }
    }
}

/// Non-owning association between a seat and the session playing it.
#[derive(Debug, Clone)]
pub struct SeatBinding {
    /// Connection currently bound to the seat.
    pub session: SessionId,
    /// Activity clock of that connection, read by the watchdog.
    pub activity: ActivityClock,
}

/// Authoritative state of one game.
#[derive(Debug, Clone)]
pub struct Game {
    /// Unique identifier shared with clients.
    pub id: String,
    /// Display name of the first participant.
    pub player_one: String,
    /// Display name of the second participant, once bound.
    pub player_two: Option<String>,
    grid: Grid,
    current_turn: Player,
    status: GameStatus,
    winner: Option<Player>,
    is_draw: bool,
    /// Wall-clock creation time.
    pub created_at: SystemTime,
    /// Wall-clock time the second participant was bound.
    pub started_at: Option<SystemTime>,
    /// Wall-clock time the game finished.
    pub ended_at: Option<SystemTime>,
    last_move_at: Instant,
    /// Whether the second participant is the bot.
    pub is_bot_game: bool,
    /// Session bound to the first seat.
    pub player_one_seat: Option<SeatBinding>,
    /// Session bound to the second seat (always `None` for the bot).
    pub player_two_seat: Option<SeatBinding>,
}

impl Game {
    /// Create a waiting game with an empty board; the first participant moves first.
    pub fn new(id: impl Into<String>, player_one: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            player_one: player_one.into(),
            player_two: None,
            grid: [[Cell::Empty; COLS]; ROWS],
            current_turn: Player::One,
            status: GameStatus::Waiting,
            winner: None,
            is_draw: false,
            created_at: SystemTime::now(),
            started_at: None,
            ended_at: None,
            last_move_at: Instant::now(),
            is_bot_game: false,
            player_one_seat: None,
            player_two_seat: None,
        }
    }

    /// Bind the second participant and open the game for moves.
    pub fn start(&mut self, player_two: impl Into<String>) {
        self.player_two = Some(player_two.into());
        self.status = GameStatus::InProgress;
        self.started_at = Some(SystemTime::now());
        self.last_move_at = Instant::now();
    }

    /// Side to move.
    pub fn current_turn(&self) -> Player {
        self.current_turn
    }

    /// Lifecycle status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Winning side, if any.
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    /// Whether the game ended in a draw.
    pub fn is_draw(&self) -> bool {
        self.is_draw
    }

    /// Instant of the last accepted move (or of the start).
    pub fn last_move_at(&self) -> Instant {
        self.last_move_at
    }

    /// Cell at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.grid[row][col]
    }

    /// Copy of the grid.
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Display name for a side.
    pub fn name_of(&self, player: Player) -> Option<&str> {
        match player {
            Player::One => Some(self.player_one.as_str()),
            Player::Two => self.player_two.as_deref(),
        }
    }

    /// Display name of the winner.
    pub fn winner_name(&self) -> Option<&str> {
        self.winner.and_then(|player| self.name_of(player))
    }

    /// Which side `name` plays, if any. Player one wins ties on identical names.
    pub fn seat_of(&self, name: &str) -> Option<Player> {
        if self.player_one == name {
            Some(Player::One)
        } else if self.player_two.as_deref() == Some(name) {
            Some(Player::Two)
        } else {
            None
        }
    }

    /// Seat binding of a side.
    pub fn seat(&self, player: Player) -> Option<&SeatBinding> {
        match player {
            Player::One => self.player_one_seat.as_ref(),
            Player::Two => self.player_two_seat.as_ref(),
        }
    }

    /// Replace the seat binding of a side.
    pub fn bind(&mut self, player: Player, binding: SeatBinding) {
        match player {
            Player::One => self.player_one_seat = Some(binding),
            Player::Two => self.player_two_seat = Some(binding),
        }
    }

    /// Sessions bound to either seat, player one first.
    pub fn bound_sessions(&self) -> Vec<SessionId> {
        [&self.player_one_seat, &self.player_two_seat]
            .into_iter()
            .flatten()
            .map(|binding| binding.session)
            .collect()
    }

    /// Drop a disc for `player` into `column`.
    pub fn apply_move(&mut self, column: usize, player: Player) -> Result<MoveOutcome, MoveError> {
        if self.status != GameStatus::InProgress {
            return Err(MoveError::NotInProgress);
        }
        if player != self.current_turn {
            return Err(MoveError::WrongTurn);
        }
        if column >= COLS {
            return Err(MoveError::InvalidColumn);
        }

        let cell = player.cell();
        let row = drop_disc(&mut self.grid, column, cell).ok_or(MoveError::ColumnFull)?;
        self.last_move_at = Instant::now();

        if completes_line(&self.grid, row, column, cell) {
            self.finish(Some(player));
            return Ok(MoveOutcome::Win(player));
        }

        if self.grid[0].iter().all(|cell| *cell != Cell::Empty) {
            self.is_draw = true;
            self.finish(None);
            return Ok(MoveOutcome::Draw);
        }

        self.current_turn = player.other();
        Ok(MoveOutcome::Continue)
    }

    /// End the game in favour of the side opposing `loser`.
    pub fn forfeit(&mut self, loser: Player) -> Result<Player, MoveError> {
        if self.status != GameStatus::InProgress {
            return Err(MoveError::NotInProgress);
        }
        let winner = loser.other();
        self.finish(Some(winner));
        Ok(winner)
    }

    /// Columns with room for another disc, ascending.
    pub fn valid_moves(&self) -> Vec<usize> {
        valid_moves(&self.grid)
    }

    /// Detached copy used for bot lookahead.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            grid: self.grid,
            current_turn: self.current_turn,
            status: self.status,
        }
    }

    fn finish(&mut self, winner: Option<Player>) {
        self.status = GameStatus::Finished;
        self.winner = winner;
        self.ended_at = Some(SystemTime::now());
    }
}

fn valid_moves(grid: &Grid) -> Vec<usize> {
    (0..COLS).filter(|&col| grid[0][col] == Cell::Empty).collect()
}

/// Place `cell` in the lowest empty row of `col`, returning that row.
fn drop_disc(grid: &mut Grid, col: usize, cell: Cell) -> Option<usize> {
    if col >= COLS {
        return None;
    }
    let row = (0..ROWS).rev().find(|&row| grid[row][col] == Cell::Empty)?;
    grid[row][col] = cell;
    Some(row)
}

/// Symmetric run count through `(row, col)` along the four axes.
fn completes_line(grid: &Grid, row: usize, col: usize, cell: Cell) -> bool {
    const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

    AXES.iter().any(|&(dr, dc)| {
        1 + run_length(grid, row, col, dr, dc, cell) + run_length(grid, row, col, -dr, -dc, cell)
            >= CONNECT
    })
}

fn run_length(grid: &Grid, row: usize, col: usize, dr: isize, dc: isize, cell: Cell) -> usize {
    let mut count = 0;
    let mut r = row as isize + dr;
    let mut c = col as isize + dc;
    while (0..ROWS as isize).contains(&r)
        && (0..COLS as isize).contains(&c)
        && grid[r as usize][c as usize] == cell
    {
        count += 1;
        r += dr;
        c += dc;
    }
    count
}
