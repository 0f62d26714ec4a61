//! Local capture capability: append-only storage for a running task's
//! output streams, keyed by [`LogKey`], with offset-bounded reads.
mod fs;
pub use fs::FsCaptureStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use logtier_model::{Cursor, LogKey, StreamSelector};

use crate::error::StoreResult;

/// Open write target for one capture session.
///
/// Exactly one sink exists per key at a time (single writer); the local
/// artifact may be read concurrently because the sink only appends.
#[async_trait]
pub trait CaptureSink: Send {
    /// Key this sink writes for.
    fn log_key(&self) -> &LogKey;

    /// Append bytes to one stream.
    async fn append(&mut self, selector: StreamSelector, bytes: &[u8]) -> StoreResult<()>;

    /// Flush buffered bytes to durable local storage.
    async fn flush(&mut self) -> StoreResult<()>;

    /// Flush, then record the completion marker for this key.
    ///
    /// After this returns, [`LocalCaptureStore::is_capture_complete`] reports
    /// `true` for the key. A key is never un-completed.
    async fn complete(self: Box<Self>) -> StoreResult<()>;
}

/// Durable local append storage for captured output streams.
#[async_trait]
pub trait LocalCaptureStore: Send + Sync {
    /// Open the append targets for both streams of a key.
    ///
    /// Both artifacts are created immediately, so an empty stream still
    /// resolves locally instead of falling through to remote tiers.
    async fn begin_capture(&self, key: &LogKey) -> StoreResult<Box<dyn CaptureSink>>;

    /// Path of the local artifact for one stream of a key.
    ///
    /// `partial = true` names the distinct path remote partial snapshots are
    /// downloaded to; it is never conflated with the complete path.
    fn local_path(&self, key: &LogKey, selector: StreamSelector, partial: bool) -> PathBuf;

    /// Read up to `max_bytes` from `path` starting at `offset`.
    ///
    /// A missing file or zero available bytes yields `(None, offset)`; that is
    /// a normal "no data yet" result, not an error.
    async fn read_path(
        &self,
        path: &Path,
        offset: u64,
        max_bytes: Option<u64>,
    ) -> StoreResult<(Option<Vec<u8>>, u64)>;

    /// Whether the capture owning this key has been closed.
    fn is_capture_complete(&self, key: &LogKey) -> bool;

    /// Remove all local artifacts for a key (retention/eviction).
    async fn delete_logs(&self, key: &LogKey) -> StoreResult<()>;

    /// Derive the conventional log key for a run/step pair.
    fn build_log_key(&self, run_id: &str, step_key: &str) -> StoreResult<LogKey> {
        Ok(LogKey::for_run(run_id, step_key)?)
    }

    /// Decode a cursor string (`None`/empty means start of stream).
    fn parse_cursor(&self, raw: Option<&str>) -> StoreResult<Cursor> {
        Ok(Cursor::parse(raw)?)
    }

    /// Encode a cursor to its wire format.
    fn build_cursor(&self, cursor: &Cursor) -> String {
        cursor.encode()
    }
}
