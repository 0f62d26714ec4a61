use thiserror::Error;

use logtier_model::{LogKey, ModelError};
use logtier_store::StoreError;

#[derive(Debug, Error)]
pub enum TierError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("capture already finalized for key: {0}")]
    CaptureFinalized(LogKey),
}

pub type TierResult<T> = Result<T, TierError>;
