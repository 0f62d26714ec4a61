use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace};

use logtier_model::{LogKey, StreamSelector};

use crate::error::{StoreError, StoreResult};
use crate::local::{CaptureSink, LocalCaptureStore};

/// Extension of the completion sentinel recorded next to the artifacts.
const COMPLETE_EXTENSION: &str = "complete";

/// Suffix appended to the artifact name for downloaded partial snapshots.
const PARTIAL_SUFFIX: &str = "partial";

/// Filesystem-backed [`LocalCaptureStore`].
///
/// Layout under the root, for a key `["run-1", "stepA"]`:
///
/// ```text
/// <root>/run-1/stepA.out              stdout artifact
/// <root>/run-1/stepA.err              stderr artifact
/// <root>/run-1/stepA.out.partial      downloaded remote partial snapshot
/// <root>/run-1/stepA.complete         completion sentinel
/// ```
#[derive(Debug, Clone)]
pub struct FsCaptureStore {
    root: PathBuf,
}

impl FsCaptureStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of a key.
    fn key_dir(&self, key: &LogKey) -> PathBuf {
        let segments = key.segments();
        let mut dir = self.root.clone();
        for seg in &segments[..segments.len().saturating_sub(1)] {
            dir.push(seg);
        }
        dir
    }

    fn sentinel_path(&self, key: &LogKey) -> PathBuf {
        self.key_dir(key)
            .join(format!("{}.{COMPLETE_EXTENSION}", key.last()))
    }
}

#[async_trait]
impl LocalCaptureStore for FsCaptureStore {
    async fn begin_capture(&self, key: &LogKey) -> StoreResult<Box<dyn CaptureSink>> {
        let dir = self.key_dir(key);
        tokio::fs::create_dir_all(&dir).await?;

        let mut open = OpenOptions::new();
        open.create(true).append(true);
        let stdout = open
            .open(self.local_path(key, StreamSelector::Stdout, false))
            .await?;
        let stderr = open
            .open(self.local_path(key, StreamSelector::Stderr, false))
            .await?;

        debug!(key = %key, dir = %dir.display(), "local capture opened");
        Ok(Box::new(FsCaptureSink {
            key: key.clone(),
            stdout,
            stderr,
            sentinel: self.sentinel_path(key),
        }))
    }

    fn local_path(&self, key: &LogKey, selector: StreamSelector, partial: bool) -> PathBuf {
        let mut name = format!("{}.{}", key.last(), selector.extension());
        if partial {
            name.push('.');
            name.push_str(PARTIAL_SUFFIX);
        }
        self.key_dir(key).join(name)
    }

    async fn read_path(
        &self,
        path: &Path,
        offset: u64,
        max_bytes: Option<u64>,
    ) -> StoreResult<(Option<Vec<u8>>, u64)> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %path.display(), "local artifact missing");
                return Ok((None, offset));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = Vec::new();
        match max_bytes {
            Some(n) => {
                (&mut file).take(n).read_to_end(&mut buf).await?;
            }
            None => {
                file.read_to_end(&mut buf).await?;
            }
        }

        if buf.is_empty() {
            return Ok((None, offset));
        }
        let len = buf.len() as u64;
        Ok((Some(buf), offset + len))
    }

    fn is_capture_complete(&self, key: &LogKey) -> bool {
        self.sentinel_path(key).exists()
    }

    async fn delete_logs(&self, key: &LogKey) -> StoreResult<()> {
        let mut targets = vec![self.sentinel_path(key)];
        for selector in StreamSelector::BOTH {
            targets.push(self.local_path(key, selector, false));
            targets.push(self.local_path(key, selector, true));
        }
        for path in targets {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        debug!(key = %key, "local artifacts deleted");
        Ok(())
    }
}

/// Append handle returned by [`FsCaptureStore::begin_capture`].
struct FsCaptureSink {
    key: LogKey,
    stdout: File,
    stderr: File,
    sentinel: PathBuf,
}

impl FsCaptureSink {
    fn file_mut(&mut self, selector: StreamSelector) -> &mut File {
        match selector {
            StreamSelector::Stdout => &mut self.stdout,
            StreamSelector::Stderr => &mut self.stderr,
        }
    }
}

#[async_trait]
impl CaptureSink for FsCaptureSink {
    fn log_key(&self) -> &LogKey {
        &self.key
    }

    async fn append(&mut self, selector: StreamSelector, bytes: &[u8]) -> StoreResult<()> {
        self.file_mut(selector).write_all(bytes).await?;
        Ok(())
    }

    async fn flush(&mut self) -> StoreResult<()> {
        self.stdout.flush().await?;
        self.stderr.flush().await?;
        Ok(())
    }

    async fn complete(mut self: Box<Self>) -> StoreResult<()> {
        self.flush().await?;
        self.stdout.sync_all().await?;
        self.stderr.sync_all().await?;
        tokio::fs::write(&self.sentinel, b"").await?;
        debug!(key = %self.key, "local capture completed");
        Ok(())
    }
}
