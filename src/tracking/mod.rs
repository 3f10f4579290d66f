pub mod observer;
pub mod session;

use std::time::Duration;

/// Cadence shared by the publishing and observing sides.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A sample older than this is reported as stale.
pub const STALE_AFTER: Duration = Duration::from_secs(2 * POLL_INTERVAL.as_secs());
