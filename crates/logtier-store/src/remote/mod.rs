//! Remote object capability: durable, possibly higher-latency storage for
//! finalized and in-progress log snapshots.
mod fs;
pub use fs::FsRemoteStore;

use std::path::Path;

use async_trait::async_trait;

use logtier_model::{LogKey, StreamSelector};

use crate::error::StoreResult;

/// Durable remote storage for captured log objects.
///
/// Per (key, stream) the store holds at most one *complete* object plus an
/// optional *partial* object — the latest in-progress snapshot, overwritten
/// repeatedly while capture is running and superseded once the complete
/// object exists. Uploads are at-least-once with idempotent overwrite.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// Whether the store holds an object for the key/stream.
    ///
    /// "Does not exist" is a normal negative (`Ok(false)`), never an error;
    /// the read cascade relies on it to fall through to the next tier.
    async fn has_object(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
    ) -> StoreResult<bool>;

    /// Upload the local artifact at `src` as the object for the key/stream.
    async fn upload(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
        src: &Path,
    ) -> StoreResult<()>;

    /// Download the object for the key/stream to the local path `dst`.
    async fn download(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
        dst: &Path,
    ) -> StoreResult<()>;

    /// Download URL for the complete object, when the backend provides one.
    fn download_url(&self, key: &LogKey, selector: StreamSelector) -> Option<String>;

    /// Human-readable location of the object for display purposes.
    fn display_path(&self, key: &LogKey, selector: StreamSelector) -> String;

    /// Delete one object; deleting a missing object is a no-op.
    async fn delete_object(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
    ) -> StoreResult<()>;

    /// Delete every object under the given key-segment prefix.
    async fn delete_prefix(&self, prefix: &[String]) -> StoreResult<()>;
}
