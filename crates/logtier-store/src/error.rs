use std::path::PathBuf;

use thiserror::Error;

use logtier_model::ModelError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("upload source does not exist: {path}")]
    MissingSource { path: PathBuf },

    #[error("refusing to delete with an empty key prefix")]
    EmptyDeletePrefix,
}

pub type StoreResult<T> = Result<T, StoreError>;
