use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("log key must contain at least one segment")]
    EmptyLogKey,

    #[error("log key segment {index} is empty")]
    EmptySegment { index: usize },

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
