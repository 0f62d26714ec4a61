use crate::key::LogKey;
use crate::stream::StreamSelector;

/// Result of one read against the tiered log store.
///
/// `None` for a stream means "no data yet" (not started, or not yet flushed
/// to any tier) and is never an error. `cursor` is the advanced bookmark to
/// pass to the next read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLogData {
    /// Key the data was read for.
    pub log_key: LogKey,
    /// Newly delivered stdout bytes, if any.
    pub stdout: Option<Vec<u8>>,
    /// Newly delivered stderr bytes, if any.
    pub stderr: Option<Vec<u8>>,
    /// Encoded cursor reflecting how far each stream was read.
    pub cursor: String,
}

impl CapturedLogData {
    /// Delivered bytes for one stream.
    pub fn chunk(&self, selector: StreamSelector) -> Option<&[u8]> {
        match selector {
            StreamSelector::Stdout => self.stdout.as_deref(),
            StreamSelector::Stderr => self.stderr.as_deref(),
        }
    }

    /// Returns `true` if neither stream delivered bytes.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

/// Display and download locations for a capture, independent of whether any
/// data has been fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedLogMetadata {
    /// Human-readable location of the stdout artifact.
    pub stdout_location: Option<String>,
    /// Human-readable location of the stderr artifact.
    pub stderr_location: Option<String>,
    /// Download URL for the stdout artifact, when the backend provides one.
    pub stdout_download_url: Option<String>,
    /// Download URL for the stderr artifact, when the backend provides one.
    pub stderr_download_url: Option<String>,
}
