//! Storage capabilities for tiered log capture.
//!
//! Two capability interfaces back the tiered log manager:
//! - [`LocalCaptureStore`] — durable local append storage for a running
//!   task's output streams, with offset-bounded reads and a resumable cursor;
//! - [`RemoteObjectStore`] — durable, possibly higher-latency storage holding
//!   at most one complete object per (key, stream) plus an optional partial
//!   snapshot overwritten while capture is in progress.
//!
//! Filesystem-backed variants of both are provided; object-store adapters
//! implement the same traits out of tree.
mod error;
pub use error::{StoreError, StoreResult};

mod local;
pub use local::{CaptureSink, FsCaptureStore, LocalCaptureStore};

mod remote;
pub use remote::{FsRemoteStore, RemoteObjectStore};
