use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::stream::StreamSelector;

/// Opaque per-stream read bookmark.
///
/// Wire format is `"<stdout offset>:<stderr offset>"`; the encoded form is
/// stable across process restarts and safe to persist alongside a client's
/// bookmark. All callers outside the capture store treat it as a black box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Bytes of stdout already consumed by the reader.
    pub stdout_offset: u64,
    /// Bytes of stderr already consumed by the reader.
    pub stderr_offset: u64,
}

impl Cursor {
    /// Decode a cursor string; `None` or empty means start of stream.
    pub fn parse(raw: Option<&str>) -> ModelResult<Self> {
        match raw {
            None => Ok(Self::default()),
            Some(s) if s.is_empty() => Ok(Self::default()),
            Some(s) => s.parse(),
        }
    }

    /// Encode to the wire format.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Offset for one stream.
    pub const fn offset(&self, selector: StreamSelector) -> u64 {
        match selector {
            StreamSelector::Stdout => self.stdout_offset,
            StreamSelector::Stderr => self.stderr_offset,
        }
    }

    /// Replace the offset for one stream.
    pub fn set_offset(&mut self, selector: StreamSelector, offset: u64) {
        match selector {
            StreamSelector::Stdout => self.stdout_offset = offset,
            StreamSelector::Stderr => self.stderr_offset = offset,
        }
    }
}

impl FromStr for Cursor {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stdout, stderr) = s
            .split_once(':')
            .ok_or_else(|| ModelError::InvalidCursor(s.to_string()))?;
        let stdout_offset = stdout
            .parse()
            .map_err(|_| ModelError::InvalidCursor(s.to_string()))?;
        let stderr_offset = stderr
            .parse()
            .map_err(|_| ModelError::InvalidCursor(s.to_string()))?;
        Ok(Self {
            stdout_offset,
            stderr_offset,
        })
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.stdout_offset, self.stderr_offset)
    }
}
