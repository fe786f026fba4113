use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use minesweeper_common::{
    models::{self, GameSetup, Pos},
    protocol::{CellUpdate, ServerMessage},
};
use rocket::futures::{SinkExt, future::join_all, stream::SplitSink};
use rocket_ws::{Message, stream::DuplexStream};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    data::{Board, Cell},
    error::Result,
};

mod board;

pub type Games = Arc<DashMap<String, Arc<Mutex<Game>>>>;

type Stream = SplitSink<DuplexStream, Message>;

/// One shared board and everybody watching it.
pub struct Game {
    board: Board,
    streams: HashMap<Uuid, Stream>,
    created_at: Instant,
    last_activity: Instant,
}

/// Resolves a setup request into a fresh board.
pub fn build_board(setup: GameSetup) -> Result<Board> {
    match setup {
        GameSetup::Preset { difficulty } => Board::from_difficulty(difficulty),
        GameSetup::Custom(params) => Board::new(params.rows, params.cols, params.mines),
    }
}

fn project(cell: &Cell, show_mines: bool) -> models::Cell {
    match cell {
        Cell { is_mine: true, .. } if cell.is_revealed || show_mines => models::Cell::Mine,
        Cell {
            is_revealed: true,
            adjacent_mines,
            ..
        } => models::Cell::Revealed {
            adjacent: *adjacent_mines,
        },
        Cell {
            is_flagged: true, ..
        } => models::Cell::Flagged,
        _ => models::Cell::Hidden,
    }
}

fn cell_update(board: &Board, (row, col): (usize, usize)) -> CellUpdate {
    let show_mines = board.is_game_over();
    CellUpdate {
        pos: Pos::from((row, col)),
        value: project(&board.cells[row][col], show_mines),
    }
}

fn is_finished(board: &Board) -> bool {
    board.is_game_over() || board.is_game_won()
}

pub fn init_message(board: &Board) -> ServerMessage {
    let show_mines = board.is_game_over();
    let (rows, cols) = board.board_dimensions();
    ServerMessage::Init {
        rows,
        cols,
        mines: board.num_mines(),
        difficulty: board.difficulty(),
        remaining_mines: board.remaining_mine_count(),
        field: board
            .rows()
            .map(|row| row.iter().map(|cell| project(cell, show_mines)).collect())
            .collect(),
    }
}

/// Applies a reveal request and returns the update to broadcast, if any.
///
/// Requests on a finished game are dropped. A lost game reports every mine.
pub fn play_reveal(board: &mut Board, pos: Pos) -> Result<Option<ServerMessage>> {
    if is_finished(board) {
        debug!(
            "Ignoring reveal action on finished game at ({}, {})",
            pos.row, pos.col
        );
        return Ok(None);
    }

    let opened = board.reveal(pos.row, pos.col)?;
    if opened.is_empty() {
        return Ok(None);
    }

    if board.is_game_over() {
        warn!("Player hit a mine at ({}, {}) - game over!", pos.row, pos.col);
        let updates: Vec<CellUpdate> = board
            .rows()
            .enumerate()
            .flat_map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, cell)| cell.is_mine)
                    .map(move |(c, _)| (r, c))
            })
            .map(|pos| cell_update(board, pos))
            .collect();
        info!("Game ended with loss, showing {} mines", updates.len());
        return Ok(Some(ServerMessage::Update {
            updates,
            remaining_mines: board.remaining_mine_count(),
            won: false,
            lost: true,
        }));
    }

    let won = board.check_victory();
    if won {
        info!("Game won! All safe cells revealed.");
    } else {
        debug!("Revealed {} cells, game continues", opened.len());
    }

    Ok(Some(ServerMessage::Update {
        updates: opened.into_iter().map(|pos| cell_update(board, pos)).collect(),
        remaining_mines: board.remaining_mine_count(),
        won,
        lost: false,
    }))
}

/// Applies a flag toggle and returns the update to broadcast, if any.
pub fn play_flag(board: &mut Board, pos: Pos) -> Result<Option<ServerMessage>> {
    if is_finished(board) {
        debug!(
            "Ignoring flag action on finished game at ({}, {})",
            pos.row, pos.col
        );
        return Ok(None);
    }

    if !board.flag(pos.row, pos.col)? {
        return Ok(None);
    }

    let target = (pos.row as usize, pos.col as usize);
    Ok(Some(ServerMessage::Update {
        updates: vec![cell_update(board, target)],
        remaining_mines: board.remaining_mine_count(),
        won: false,
        lost: false,
    }))
}

async fn send(stream: &mut Stream, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => {
            if let Err(e) = stream.send(Message::Text(text)).await {
                debug!("Failed to deliver message: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize server message: {}", e),
    }
}

async fn broadcast(streams: &mut HashMap<Uuid, Stream>, message: &ServerMessage) {
    let futures: Vec<_> = streams
        .values_mut()
        .map(|stream| send(stream, message))
        .collect();

    join_all(futures).await;
}

impl Game {
    #[instrument(level = "trace", skip(board))]
    pub fn new(board: Board) -> Self {
        let (rows, cols) = board.board_dimensions();
        info!(
            "Creating new game: {}x{} with {} mines ({})",
            rows,
            cols,
            board.num_mines(),
            board.difficulty()
        );
        let now = Instant::now();
        Self {
            board,
            streams: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Throws the current board away and starts over.
    #[instrument(level = "trace", skip(self))]
    pub async fn restart(&mut self, setup: GameSetup) -> Result<()> {
        self.board = build_board(setup)?;
        self.last_activity = Instant::now();
        broadcast(&mut self.streams, &init_message(&self.board)).await;
        info!(
            "Game restarted and broadcasted to {} connections",
            self.streams.len()
        );
        Ok(())
    }

    #[instrument(level = "trace", skip(self, stream))]
    pub async fn add_stream(&mut self, mut stream: Stream) -> Uuid {
        let id = Uuid::new_v4();
        debug!("Adding stream {} to game", id);
        send(&mut stream, &init_message(&self.board)).await;
        self.streams.insert(id, stream);
        self.last_activity = Instant::now();
        info!(
            "Stream {} added, total connections: {}",
            id,
            self.streams.len()
        );
        id
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn remove_stream(&mut self, id: &Uuid) {
        if self.streams.remove(id).is_some() {
            info!(
                "Stream {} removed, remaining connections: {}",
                id,
                self.streams.len()
            );
        } else {
            warn!("Attempted to remove non-existent stream: {}", id);
        }
        self.last_activity = Instant::now()
    }

    /// Sends a message to one connection only.
    pub async fn send_to(&mut self, id: &Uuid, message: &ServerMessage) {
        if let Some(stream) = self.streams.get_mut(id) {
            send(stream, message).await;
        }
    }

    pub fn has_active_connections(&self) -> bool {
        !self.streams.is_empty()
    }

    /// Games past `active_timeout` are always dropped; others only once
    /// nobody has been connected for `inactive_timeout`.
    pub fn should_cleanup(
        &self,
        now: Instant,
        inactive_timeout: Duration,
        active_timeout: Duration,
    ) -> bool {
        if now.saturating_duration_since(self.created_at) > active_timeout {
            return true;
        }
        if self.has_active_connections() {
            return false;
        }
        now.saturating_duration_since(self.last_activity) > inactive_timeout
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub async fn reveal(&mut self, pos: Pos) -> Result<()> {
        self.last_activity = Instant::now();
        if let Some(message) = play_reveal(&mut self.board, pos)? {
            broadcast(&mut self.streams, &message).await;
        }
        Ok(())
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub async fn flag(&mut self, pos: Pos) -> Result<()> {
        self.last_activity = Instant::now();
        if let Some(message) = play_flag(&mut self.board, pos)? {
            broadcast(&mut self.streams, &message).await;
        }
        Ok(())
    }
}
