//! Tiered compute-log capture and streaming.
//!
//! Captures a running task's stdout/stderr to local storage, offloads
//! snapshots to a remote object store while capture is in progress, and
//! serves reads and live subscriptions from whichever tier currently holds
//! the freshest copy: local artifact first, remote complete object second,
//! remote partial snapshot third.
mod error;
pub use error::{TierError, TierResult};

mod config;
pub use config::TierConfig;

mod manager;
pub use manager::{ScopedCapture, TieredLogManager};

mod subscription;
pub use subscription::LogSubscription;

mod watchdog;

pub mod prelude {
    pub use crate::config::TierConfig;
    pub use crate::error::{TierError, TierResult};
    pub use crate::manager::{ScopedCapture, TieredLogManager};
    pub use crate::subscription::LogSubscription;
}
