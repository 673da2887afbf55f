/*!
    Timestamp types for media timing.
*/

use std::time::Duration;

use crate::Rational;

/**
    Presentation timestamp in time_base units.

    This is the raw tick value from the media stream. To convert it to a
    wall-clock duration you need the stream's time base; to convert it to
    a frame index you need a [`Timebase`](crate::Timebase).
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

impl Pts {
    /**
        The wall-clock moment this tick represents in the given time
        base. Negative ticks (lead-in frames that exist only for decoder
        priming) clamp to zero.
    */
    #[inline]
    pub fn to_duration(self, time_base: Rational) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        let seconds = self.0 as f64 * time_base.to_f64();
        Duration::from_secs_f64(seconds.max(0.0))
    }

    /**
        The tick nearest to a wall-clock offset in the given time base.
    */
    #[inline]
    pub fn from_duration(duration: Duration, time_base: Rational) -> Self {
        let seconds = duration.as_secs_f64();
        Self((seconds / time_base.to_f64()).round() as i64)
    }
}

impl From<i64> for Pts {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Pts> for i64 {
    fn from(pts: Pts) -> Self {
        pts.0
    }
}

/**
    Duration in time_base units.

    Same representation as [`Pts`] but semantically a span rather than a
    point in time; a packet's duration is the number of ticks its frame
    stays on screen.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaDuration(pub i64);

impl MediaDuration {
    /**
        The wall-clock span this tick count represents in the given time
        base. Negative values clamp to zero.
    */
    #[inline]
    pub fn to_duration(self, time_base: Rational) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        let seconds = self.0 as f64 * time_base.to_f64();
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

impl From<i64> for MediaDuration {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MediaDuration> for i64 {
    fn from(duration: MediaDuration) -> Self {
        duration.0
    }
}

static_assertions::assert_impl_all!(Pts: Send, Sync);
static_assertions::assert_impl_all!(MediaDuration: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    const TB_1_1000: Rational = Rational { num: 1, den: 1000 };
    const TB_1_90000: Rational = Rational { num: 1, den: 90000 };

    #[test]
    fn pts_to_duration() {
        assert_eq!(Pts(1000).to_duration(TB_1_1000), Duration::from_secs(1));
        assert_eq!(Pts(45000).to_duration(TB_1_90000), Duration::from_millis(500));
    }

    #[test]
    fn pts_negative_clamps_to_zero() {
        assert_eq!(Pts(-3000).to_duration(TB_1_90000), Duration::ZERO);
    }

    #[test]
    fn pts_from_duration() {
        assert_eq!(Pts::from_duration(Duration::from_secs(2), TB_1_90000), Pts(180000));
    }

    #[test]
    fn pts_ordering() {
        assert!(Pts(-100) < Pts(0));
        assert!(Pts(0) < Pts(100));
    }

    #[test]
    fn media_duration_to_duration() {
        assert_eq!(MediaDuration(33).to_duration(TB_1_1000), Duration::from_millis(33));
        assert_eq!(MediaDuration(-50).to_duration(TB_1_1000), Duration::ZERO);
    }
}
