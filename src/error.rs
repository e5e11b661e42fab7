use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid numerical bounds [{lo}, {hi}] on column {col}")]
    InvalidBounds { col: usize, lo: f64, hi: f64 },
    #[error("Empty category set on column {col}")]
    EmptyCategories { col: usize },
    #[error("Parse error at position {position}: {message} (near `{fragment}`)")]
    Parse {
        position: usize,
        fragment: String,
        message: String,
    },
    #[error("Unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("Term on column {col} cannot be adjusted to the given range")]
    NotAdjustable { col: usize },
    #[error("Column `{name}` has {found} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a parse error pointing at `position` inside `input`.
    pub fn parse(input: &str, position: usize, message: impl Into<String>) -> Self {
        let position = position.min(input.len());
        let fragment: String = input
            .get(position..)
            .unwrap_or_default()
            .chars()
            .take(24)
            .collect();
        Self::Parse {
            position,
            fragment,
            message: message.into(),
        }
    }
}
