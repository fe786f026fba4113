use minesweeper_common::models::Difficulty;

/// State of one grid position. Only [`Board`] ever mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub is_mine: bool,
    pub is_revealed: bool,
    pub is_flagged: bool,
    /// Mines in the 8-neighborhood. Always 0 on mine cells.
    pub adjacent_mines: u8,
}

/// The grid plus the outcome of the game played on it.
#[derive(Debug, Clone)]
pub struct Board {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) num_mines: usize,
    pub(crate) difficulty: Difficulty,
    pub(crate) cells: Vec<Vec<Cell>>,
    pub(crate) mines_remaining: usize,
    pub(crate) flags_placed: usize,
    pub(crate) is_game_over: bool,
    pub(crate) is_game_won: bool,
}
