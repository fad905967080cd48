//! Time provider abstraction
//!
//! Token issuance stamps `iat`/`exp` and verification compares `exp` against
//! "now". Both go through a [`Clock`] so production code reads the system time
//! while tests move time forward explicitly.
//!
//! ```
//! use glimpse::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.now_secs() > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicI64, Ordering};

/// A time provider for getting current timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Current time as whole seconds since the Unix epoch.
    fn now_secs(&self) -> i64;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Test clock that only moves when told to.
///
/// ```
/// use glimpse::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_000);
/// assert_eq!(clock.now_secs(), 1_000);
/// clock.advance(60);
/// assert_eq!(clock.now_secs(), 1_060);
/// ```
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    secs: AtomicI64,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// Create a new fixed clock at the given time in seconds.
    pub fn new(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// Advance the clock by the given number of seconds.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to a specific time in seconds.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1_704_067_200)
    }
}
