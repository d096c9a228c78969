use std::{
    ops::{Add, AddAssign, Sub},
    time::Duration,
};

/// Milliseconds on the caller's frame clock.
///
/// The engine never reads a wall clock on its own, every frame and fix is
/// stamped by whoever drives it. This keeps animation deterministic under test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    /// Saturates at zero when `rhs` is later than `self`.
    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_millis(self.0.saturating_sub(rhs.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_millis() as u64)
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.as_millis() as u64
    }
}

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Fraction of `duration` that has passed between `start` and `self`, clamped to `[0, 1]`.
    /// A zero duration is always complete.
    pub fn progress_since(&self, start: Timestamp, duration: Duration) -> f64 {
        if duration.is_zero() {
            return 1.0;
        }
        let elapsed = (*self - start).as_secs_f64();
        (elapsed / duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

#[test]
fn sub_saturates() {
    let early = Timestamp::from_millis(100);
    let late = Timestamp::from_millis(350);
    assert_eq!(late - early, Duration::from_millis(250));
    assert_eq!(early - late, Duration::ZERO);
}

#[test]
fn progress_is_clamped() {
    let start = Timestamp::from_millis(1_000);
    let duration = Duration::from_millis(4_000);
    assert_eq!(Timestamp::from_millis(500).progress_since(start, duration), 0.0);
    assert_eq!(Timestamp::from_millis(3_000).progress_since(start, duration), 0.5);
    assert_eq!(Timestamp::from_millis(9_000).progress_since(start, duration), 1.0);
    assert_eq!(start.progress_since(start, Duration::ZERO), 1.0);
}

#[test]
fn add_duration() {
    let mut time = Timestamp::from_millis(10);
    time += Duration::from_millis(40);
    assert_eq!(time + Duration::from_secs(1), Timestamp::from_millis(1_050));
}
