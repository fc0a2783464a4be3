//! Randomness and time, isolated behind small traits (out-of-scope external
//! collaborators per spec §1, given a minimal production default here).

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// A uniform duration oracle: draws a service delay or break-cadence delay
/// from a closed range.
pub trait DurationOracle: Send + Sync {
    /// Draw a duration uniformly from `range` (inclusive on both ends).
    fn sample(&self, range: RangeInclusive<Duration>) -> Duration;
}

/// Production oracle backed by `rand::thread_rng`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformOracle;

impl DurationOracle for UniformOracle {
    fn sample(&self, range: RangeInclusive<Duration>) -> Duration {
        let (low, high) = (range.start().as_nanos(), range.end().as_nanos());
        if high <= low {
            return *range.start();
        }
        let nanos = rand::thread_rng().gen_range(low..=high);
        Duration::from_nanos(nanos as u64)
    }
}

/// A deterministic oracle returning the midpoint of every requested window,
/// as scenario fixtures in spec §8 require.
#[derive(Debug, Default, Clone, Copy)]
pub struct MidpointOracle;

impl DurationOracle for MidpointOracle {
    fn sample(&self, range: RangeInclusive<Duration>) -> Duration {
        let (low, high) = (range.start().as_nanos(), range.end().as_nanos());
        Duration::from_nanos(((low + high) / 2) as u64)
    }
}

/// The `delay(duration)` primitive, isolated so tests can swap in
/// `tokio::time::pause`/`advance` without touching engine code.
pub trait Clock: Send + Sync {
    /// Suspend the calling task for `duration`.
    fn delay(&self, duration: Duration) -> futures::future::BoxFuture<'static, ()>;
}

/// Production clock backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn delay(&self, duration: Duration) -> futures::future::BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
