use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, trace};

use logtier_model::{LogKey, StreamSelector};

use crate::error::{StoreError, StoreResult};
use crate::remote::RemoteObjectStore;

/// Directory-backed [`RemoteObjectStore`].
///
/// Mirrors the local artifact layout under its own root; upload and download
/// are whole-file copies, so re-uploading the same object is an idempotent
/// overwrite. Suitable for tests and single-host deployments where "remote"
/// means a different volume.
#[derive(Debug, Clone)]
pub struct FsRemoteStore {
    root: PathBuf,
}

impl FsRemoteStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &LogKey, selector: StreamSelector, partial: bool) -> PathBuf {
        let segments = key.segments();
        let mut path = self.root.clone();
        for seg in &segments[..segments.len() - 1] {
            path.push(seg);
        }
        let mut name = format!("{}.{}", key.last(), selector.extension());
        if partial {
            name.push_str(".partial");
        }
        path.join(name)
    }
}

#[async_trait]
impl RemoteObjectStore for FsRemoteStore {
    async fn has_object(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
    ) -> StoreResult<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key, selector, partial)).await?)
    }

    async fn upload(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
        src: &Path,
    ) -> StoreResult<()> {
        if !tokio::fs::try_exists(src).await? {
            return Err(StoreError::MissingSource {
                path: src.to_path_buf(),
            });
        }
        let dst = self.object_path(key, selector, partial);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, &dst).await?;
        debug!(key = %key, stream = %selector, partial, "object uploaded");
        Ok(())
    }

    async fn download(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
        dst: &Path,
    ) -> StoreResult<()> {
        let src = self.object_path(key, selector, partial);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, dst).await?;
        debug!(key = %key, stream = %selector, partial, "object downloaded");
        Ok(())
    }

    fn download_url(&self, key: &LogKey, selector: StreamSelector) -> Option<String> {
        let path = self.object_path(key, selector, false);
        if path.exists() {
            Some(format!("file://{}", path.display()))
        } else {
            None
        }
    }

    fn display_path(&self, key: &LogKey, selector: StreamSelector) -> String {
        self.object_path(key, selector, false).display().to_string()
    }

    async fn delete_object(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        partial: bool,
    ) -> StoreResult<()> {
        let path = self.object_path(key, selector, partial);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                trace!(key = %key, stream = %selector, partial, "object deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn delete_prefix(&self, prefix: &[String]) -> StoreResult<()> {
        if prefix.is_empty() {
            return Err(StoreError::EmptyDeletePrefix);
        }
        let mut path = self.root.clone();
        for seg in prefix {
            path.push(seg);
        }
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> LogKey {
        LogKey::new(["run-1", "stepA"]).unwrap()
    }

    async fn write_src(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    #[tokio::test]
    async fn upload_then_download_roundtrip() {
        let remote_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = FsRemoteStore::new(remote_dir.path());
        let key = key();

        let src = write_src(&scratch, "stepA.out", b"hello").await;
        assert!(
            !store
                .has_object(&key, StreamSelector::Stdout, false)
                .await
                .unwrap()
        );

        store
            .upload(&key, StreamSelector::Stdout, false, &src)
            .await
            .unwrap();
        assert!(
            store
                .has_object(&key, StreamSelector::Stdout, false)
                .await
                .unwrap()
        );

        let dst = scratch.path().join("downloaded.out");
        store
            .download(&key, StreamSelector::Stdout, false, &dst)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn partial_and_complete_objects_are_distinct() {
        let remote_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = FsRemoteStore::new(remote_dir.path());
        let key = key();

        let src = write_src(&scratch, "stepA.out", b"snapshot").await;
        store
            .upload(&key, StreamSelector::Stdout, true, &src)
            .await
            .unwrap();

        assert!(
            store
                .has_object(&key, StreamSelector::Stdout, true)
                .await
                .unwrap()
        );
        assert!(
            !store
                .has_object(&key, StreamSelector::Stdout, false)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn re_upload_overwrites_idempotently() {
        let remote_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = FsRemoteStore::new(remote_dir.path());
        let key = key();

        let src = write_src(&scratch, "stepA.out", b"v1").await;
        store
            .upload(&key, StreamSelector::Stdout, true, &src)
            .await
            .unwrap();
        tokio::fs::write(&src, b"v1-and-more").await.unwrap();
        store
            .upload(&key, StreamSelector::Stdout, true, &src)
            .await
            .unwrap();

        let dst = scratch.path().join("latest.out");
        store
            .download(&key, StreamSelector::Stdout, true, &dst)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"v1-and-more");
    }

    #[tokio::test]
    async fn upload_of_missing_source_is_an_error() {
        let remote_dir = TempDir::new().unwrap();
        let store = FsRemoteStore::new(remote_dir.path());
        let key = key();

        let res = store
            .upload(
                &key,
                StreamSelector::Stdout,
                false,
                Path::new("/nonexistent/stepA.out"),
            )
            .await;
        assert!(matches!(res, Err(StoreError::MissingSource { .. })));
    }

    #[tokio::test]
    async fn download_url_only_for_existing_complete_objects() {
        let remote_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = FsRemoteStore::new(remote_dir.path());
        let key = key();

        assert!(store.download_url(&key, StreamSelector::Stdout).is_none());

        let src = write_src(&scratch, "stepA.out", b"hello").await;
        store
            .upload(&key, StreamSelector::Stdout, false, &src)
            .await
            .unwrap();
        let url = store.download_url(&key, StreamSelector::Stdout).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("stepA.out"));
    }

    #[tokio::test]
    async fn delete_prefix_removes_every_run_object() {
        let remote_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = FsRemoteStore::new(remote_dir.path());
        let key = key();

        let src = write_src(&scratch, "stepA.out", b"hello").await;
        store
            .upload(&key, StreamSelector::Stdout, false, &src)
            .await
            .unwrap();
        store
            .upload(&key, StreamSelector::Stdout, true, &src)
            .await
            .unwrap();

        store.delete_prefix(&["run-1".to_string()]).await.unwrap();
        assert!(
            !store
                .has_object(&key, StreamSelector::Stdout, false)
                .await
                .unwrap()
        );
        assert!(
            !store
                .has_object(&key, StreamSelector::Stdout, true)
                .await
                .unwrap()
        );

        // empty prefix is refused rather than wiping the store root
        assert!(matches!(
            store.delete_prefix(&[]).await,
            Err(StoreError::EmptyDeletePrefix)
        ));
    }
}
