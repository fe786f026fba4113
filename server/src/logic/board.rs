use std::{collections::HashSet, fmt};

use minesweeper_common::models::Difficulty;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::{
    data::{Board, Cell},
    error::{BoardError, Result},
};

const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Largest grid accepted, far beyond any playable board.
pub const MAX_CELLS: usize = 1 << 20;

impl Board {
    /// Builds a board with randomly placed mines, drawn from the thread-local generator.
    pub fn new(rows: usize, cols: usize, num_mines: usize) -> Result<Self> {
        Self::with_rng(rows, cols, num_mines, &mut rand::rng())
    }

    /// Builds a board with mines drawn from `rng`.
    ///
    /// Construction allocates the grid, places the mines, then computes the
    /// adjacency counts. Fails with [`BoardError::InvalidConfiguration`] when
    /// either dimension is zero or `num_mines` does not leave at least one
    /// safe cell.
    #[instrument(level = "trace", skip(rng))]
    pub fn with_rng<R: Rng>(rows: usize, cols: usize, num_mines: usize, rng: &mut R) -> Result<Self> {
        let mut board = Self::create(rows, cols, num_mines)?;
        board.place_mines(rng);
        board.compute_adjacency();
        debug!("Created {}x{} board with {} mines", rows, cols, num_mines);
        Ok(board)
    }

    pub fn from_difficulty(difficulty: Difficulty) -> Result<Self> {
        Self::from_difficulty_with_rng(difficulty, &mut rand::rng())
    }

    pub fn from_difficulty_with_rng<R: Rng>(difficulty: Difficulty, rng: &mut R) -> Result<Self> {
        let params = difficulty.params().ok_or_else(|| {
            BoardError::invalid(format!("difficulty '{difficulty}' has no preset dimensions"))
        })?;
        let mut board = Self::with_rng(params.rows, params.cols, params.mines, rng)?;
        board.difficulty = difficulty;
        Ok(board)
    }

    /// Builds a board with mines at exactly the given positions.
    pub fn with_mines(rows: usize, cols: usize, mines: &[(usize, usize)]) -> Result<Self> {
        let mut board = Self::create(rows, cols, mines.len())?;
        for &(row, col) in mines {
            if row >= rows || col >= cols {
                return Err(BoardError::invalid(format!(
                    "mine at ({row}, {col}) is outside the {rows}x{cols} board"
                )));
            }
            let cell = &mut board.cells[row][col];
            if cell.is_mine {
                return Err(BoardError::invalid(format!("duplicate mine at ({row}, {col})")));
            }
            cell.is_mine = true;
        }
        board.compute_adjacency();
        Ok(board)
    }

    fn create(rows: usize, cols: usize, num_mines: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(BoardError::invalid(format!(
                "board needs at least one row and one column, got {rows}x{cols}"
            )));
        }
        let total = rows
            .checked_mul(cols)
            .filter(|&total| total <= MAX_CELLS)
            .ok_or_else(|| {
                BoardError::invalid(format!(
                    "{rows}x{cols} board exceeds the limit of {MAX_CELLS} cells"
                ))
            })?;
        if num_mines >= total {
            return Err(BoardError::invalid(format!(
                "{num_mines} mines leave no safe cell on a {rows}x{cols} board"
            )));
        }

        Ok(Self {
            rows,
            cols,
            num_mines,
            difficulty: Difficulty::Custom,
            cells: vec![vec![Cell::default(); cols]; rows],
            mines_remaining: num_mines,
            flags_placed: 0,
            is_game_over: false,
            is_game_won: false,
        })
    }

    // Rejection sampling: the grid always has more cells than mines, so a free
    // position is eventually drawn.
    fn place_mines<R: Rng>(&mut self, rng: &mut R) {
        let mut positions = HashSet::with_capacity(self.num_mines);
        while positions.len() < self.num_mines {
            let pos = (rng.random_range(0..self.rows), rng.random_range(0..self.cols));
            if positions.insert(pos) {
                self.cells[pos.0][pos.1].is_mine = true;
            } else {
                trace!("Mine position ({}, {}) already taken", pos.0, pos.1);
            }
        }
    }

    fn compute_adjacency(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let adjacent = if self.cells[row][col].is_mine {
                    0
                } else {
                    self.count_adjacent_mines(row, col)
                };
                self.cells[row][col].adjacent_mines = adjacent;
            }
        }
    }

    fn neighbors(&self, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBORS.iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            (r < self.rows && c < self.cols).then_some((r, c))
        })
    }

    /// Number of mines among the up to 8 in-bounds neighbors of a cell.
    pub fn count_adjacent_mines(&self, row: usize, col: usize) -> u8 {
        self.neighbors(row, col)
            .filter(|&(r, c)| self.cells[r][c].is_mine)
            .count() as u8
    }

    pub fn contains(&self, row: isize, col: isize) -> bool {
        usize::try_from(row).is_ok_and(|r| r < self.rows)
            && usize::try_from(col).is_ok_and(|c| c < self.cols)
    }

    fn index(&self, row: isize, col: isize) -> Result<(usize, usize)> {
        if self.contains(row, col) {
            Ok((row as usize, col as usize))
        } else {
            Err(BoardError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Reveals a cell and returns every position that became revealed.
    ///
    /// Flagged and already revealed cells are left alone. A safe cell without
    /// adjacent mines opens its whole zero region plus the numbered border.
    /// Revealing a mine ends the game; the mine itself is marked revealed.
    pub fn reveal(&mut self, row: isize, col: isize) -> Result<Vec<(usize, usize)>> {
        let (row, col) = self.index(row, col)?;
        let cell = &self.cells[row][col];

        if cell.is_flagged {
            debug!("Ignoring reveal on flagged cell ({}, {})", row, col);
            return Ok(Vec::new());
        }
        if cell.is_revealed {
            trace!("Cell ({}, {}) already revealed", row, col);
            return Ok(Vec::new());
        }

        if !cell.is_mine && cell.adjacent_mines == 0 {
            let revealed = self.flood_reveal(row, col);
            debug!(
                "Flood reveal from ({}, {}) opened {} cells",
                row,
                col,
                revealed.len()
            );
            return Ok(revealed);
        }

        let cell = &mut self.cells[row][col];
        cell.is_revealed = true;
        if cell.is_mine {
            self.is_game_over = true;
            debug!("Mine revealed at ({}, {})", row, col);
        }
        Ok(vec![(row, col)])
    }

    // Worklist instead of recursion. Bounds, duplicates and flags are filtered
    // when a position is popped.
    fn flood_reveal(&mut self, row: usize, col: usize) -> Vec<(usize, usize)> {
        let mut revealed = Vec::new();
        let mut stack = vec![(row as isize, col as isize)];

        while let Some((r, c)) = stack.pop() {
            if !self.contains(r, c) {
                continue;
            }
            let cell = &mut self.cells[r as usize][c as usize];
            if cell.is_revealed || cell.is_flagged {
                continue;
            }

            cell.is_revealed = true;
            revealed.push((r as usize, c as usize));

            if cell.adjacent_mines == 0 {
                stack.extend(NEIGHBORS.iter().map(|&(dr, dc)| (r + dr, c + dc)));
            }
        }

        revealed
    }

    /// Toggles the flag on a hidden cell. Returns whether anything changed.
    ///
    /// Revealed cells cannot be flagged, and no new flag is placed once
    /// `num_mines` flags are down. Removing a flag is always allowed.
    pub fn flag(&mut self, row: isize, col: isize) -> Result<bool> {
        let (row, col) = self.index(row, col)?;
        let cell = &mut self.cells[row][col];

        if cell.is_revealed {
            debug!("Ignoring flag on revealed cell ({}, {})", row, col);
            return Ok(false);
        }

        if cell.is_flagged {
            cell.is_flagged = false;
            self.flags_placed -= 1;
            self.mines_remaining = (self.mines_remaining + 1).min(self.num_mines);
            debug!("Cell ({}, {}) unflagged", row, col);
        } else {
            if self.flags_placed >= self.num_mines {
                debug!(
                    "Flag budget of {} exhausted, ignoring ({}, {})",
                    self.num_mines, row, col
                );
                return Ok(false);
            }
            cell.is_flagged = true;
            self.flags_placed += 1;
            self.mines_remaining = self.mines_remaining.saturating_sub(1);
            debug!("Cell ({}, {}) flagged", row, col);
        }

        Ok(true)
    }

    /// Re-derives the win condition from the grid: every safe cell revealed.
    ///
    /// A lost game never becomes won.
    pub fn check_victory(&mut self) -> bool {
        if self.is_game_over {
            return false;
        }

        let won = self
            .cells
            .iter()
            .flatten()
            .all(|cell| cell.is_mine || cell.is_revealed);
        if won && !self.is_game_won {
            debug!("All safe cells revealed");
            self.is_game_won = true;
        }
        self.is_game_won
    }

    pub fn remaining_mine_count(&self) -> usize {
        self.mines_remaining
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// `(rows, cols)`
    pub fn board_dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn num_mines(&self) -> usize {
        self.num_mines
    }

    pub fn flags_placed(&self) -> usize {
        self.flags_placed
    }

    pub fn is_game_over(&self) -> bool {
        self.is_game_over
    }

    pub fn is_game_won(&self) -> bool {
        self.is_game_won
    }

    pub fn cell(&self, row: isize, col: isize) -> Result<&Cell> {
        let (row, col) = self.index(row, col)?;
        Ok(&self.cells[row][col])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.iter().map(Vec::as_slice)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line = row
                .iter()
                .map(|cell| match (cell.is_revealed, cell.is_mine, cell.is_flagged) {
                    (true, true, _) => "M",
                    (true, false, _) => "R",
                    (false, _, true) => "F",
                    (false, _, false) => "H",
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
