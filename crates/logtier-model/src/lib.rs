//! Core domain types for tiered log capture: log keys, stream selectors,
//! read cursors, and the data/metadata records handed to consumers.
mod error;
pub use error::{ModelError, ModelResult};

mod key;
pub use key::LogKey;

mod stream;
pub use stream::StreamSelector;

mod cursor;
pub use cursor::Cursor;

mod data;
pub use data::{CapturedLogData, CapturedLogMetadata};
