//! Monotonic microsecond timestamps.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds since a process-wide epoch fixed on first use.
///
/// Timestamps taken on different threads are comparable because they share
/// the same epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tic(u64);

impl Tic {
    pub const ZERO: Tic = Tic(0);

    #[inline]
    pub fn now() -> Self {
        let epoch = *EPOCH.get_or_init(Instant::now);
        Tic(epoch.elapsed().as_micros() as u64)
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Tic(micros)
    }

    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[inline]
    pub fn saturating_since(self, earlier: Tic) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}
