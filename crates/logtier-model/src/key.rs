use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Ordered sequence of string segments identifying one capture session.
///
/// Conventionally derived from a run identifier plus a step or task
/// identifier. Every tier and the subscription registry key their
/// bookkeeping off this value; it is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogKey(Vec<String>);

impl LogKey {
    /// Create a log key from an ordered list of segments.
    ///
    /// Rules:
    /// - at least one segment;
    /// - no segment is empty or whitespace-only.
    pub fn new<I, S>(segments: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ModelError::EmptyLogKey);
        }
        for (index, seg) in segments.iter().enumerate() {
            if seg.trim().is_empty() {
                return Err(ModelError::EmptySegment { index });
            }
        }
        Ok(Self(segments))
    }

    /// Build the conventional two-segment key for a run/step pair.
    pub fn for_run(run_id: &str, step_key: &str) -> ModelResult<Self> {
        Self::new([run_id, step_key])
    }

    /// All segments in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Final segment, used as the artifact file stem.
    pub fn last(&self) -> &str {
        // invariant: at least one segment (checked in `new`)
        self.0.last().map(|s| s.as_str()).unwrap_or_default()
    }

    /// Returns `true` if this key starts with the given segment prefix.
    pub fn starts_with(&self, prefix: &[String]) -> bool {
        self.0.len() >= prefix.len() && self.0[..prefix.len()] == *prefix
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}
