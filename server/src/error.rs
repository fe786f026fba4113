use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("invalid board configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("position ({row}, {col}) is outside the {rows}x{cols} board")]
    OutOfBounds {
        row: isize,
        col: isize,
        rows: usize,
        cols: usize,
    },
}

impl BoardError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        BoardError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;
