use std::fmt;

use serde::{Deserialize, Serialize};

/// Which output stream of a captured task an operation targets.
///
/// Every capture, read and upload operation works on exactly one selector;
/// callers needing both issue two calls (or iterate [`StreamSelector::BOTH`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSelector {
    Stdout,
    Stderr,
}

impl StreamSelector {
    /// Both selectors, in stdout-first order.
    pub const BOTH: [StreamSelector; 2] = [StreamSelector::Stdout, StreamSelector::Stderr];

    /// Stable lowercase name, used in logs and display paths.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamSelector::Stdout => "stdout",
            StreamSelector::Stderr => "stderr",
        }
    }

    /// File extension of the local artifact for this stream.
    pub const fn extension(&self) -> &'static str {
        match self {
            StreamSelector::Stdout => "out",
            StreamSelector::Stderr => "err",
        }
    }
}

impl fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
