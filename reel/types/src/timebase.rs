/*!
    Frame index to presentation timestamp mapping.
*/

use crate::{Pts, Rational};

/**
    Authoritative mapping between 0-based frame indices and stream ticks.

    Built from a stream's rational frame rate and rational tick time base,
    plus the stream's start timestamps. All arithmetic is performed with
    integer math over `i128` intermediates — no floating point is
    involved, so the mapping is exact for integer frame rates against
    standard time bases, and it is total over negative ticks (frames
    before the nominal start, as produced by B-frame reordering).

    The forward direction rounds to the nearest tick; the reverse
    direction floors, because the callers of [`pts_to_frame`] are asking
    "which frame is displayed at this tick", not "which frame starts
    nearest to it".

    [`pts_to_frame`]: Timebase::pts_to_frame
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timebase {
    fps: Rational,
    tick: Rational,
    start_pts: Pts,
    start_dts: Pts,
}

impl Timebase {
    /**
        Create a mapping with both start timestamps at zero.

        # Panics

        Panics if the frame rate or time base is not strictly positive.
    */
    pub fn new(fps: Rational, tick: Rational) -> Self {
        Self::with_start(fps, tick, Pts(0), Pts(0))
    }

    /**
        Create a mapping anchored at the given start timestamps.

        # Panics

        Panics if the frame rate or time base is not strictly positive.
    */
    pub fn with_start(fps: Rational, tick: Rational, start_pts: Pts, start_dts: Pts) -> Self {
        assert!(fps.is_positive(), "frame rate must be positive");
        assert!(tick.is_positive(), "time base must be positive");
        Self {
            fps,
            tick,
            start_pts,
            start_dts,
        }
    }

    #[inline]
    pub fn fps(&self) -> Rational {
        self.fps
    }

    #[inline]
    pub fn tick(&self) -> Rational {
        self.tick
    }

    #[inline]
    pub fn start_pts(&self) -> Pts {
        self.start_pts
    }

    #[inline]
    pub fn start_dts(&self) -> Pts {
        self.start_dts
    }

    /**
        Convert a 0-based frame index to its presentation tick.
    */
    pub fn frame_to_pts(&self, frame: i64) -> Pts {
        Pts(self.start_pts.0 + self.ticks_for_frame(frame))
    }

    /**
        Convert a 0-based frame index to its decode tick.

        Same arithmetic as [`frame_to_pts`](Timebase::frame_to_pts) but
        anchored at the stream's start DTS, which precedes the start PTS
        for inter-coded streams.
    */
    pub fn frame_to_dts(&self, frame: i64) -> Pts {
        Pts(self.start_dts.0 + self.ticks_for_frame(frame))
    }

    /**
        Convert a tick to the 0-based index of the frame displayed at it.
    */
    pub fn pts_to_frame(&self, pts: Pts) -> i64 {
        let num = (pts.0 as i128 - self.start_pts.0 as i128)
            * self.tick.num as i128
            * self.fps.num as i128;
        let den = self.tick.den as i128 * self.fps.den as i128;
        floor_div(num, den)
    }

    fn ticks_for_frame(&self, frame: i64) -> i64 {
        let num = frame as i128 * self.fps.den as i128 * self.tick.den as i128;
        let den = self.fps.num as i128 * self.tick.num as i128;
        round_div(num, den)
    }
}

/// Division rounding to nearest, ties away from zero. `den` must be positive.
fn round_div(num: i128, den: i128) -> i64 {
    let half = den / 2;
    if num >= 0 {
        ((num + half) / den) as i64
    } else {
        ((num - half) / den) as i64
    }
}

/// Division rounding toward negative infinity. `den` must be positive.
fn floor_div(num: i128, den: i128) -> i64 {
    num.div_euclid(den) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tb(fps: (i32, i32), tick: (i32, i32)) -> Timebase {
        Timebase::new(Rational::new(fps.0, fps.1), Rational::new(tick.0, tick.1))
    }

    #[test]
    fn frame_to_pts_common_rates() {
        // 25 fps in a 1/90000 time base: 3600 ticks per frame.
        let t = tb((25, 1), (1, 90000));
        assert_eq!(t.frame_to_pts(0), Pts(0));
        assert_eq!(t.frame_to_pts(1), Pts(3600));
        assert_eq!(t.frame_to_pts(250), Pts(900000));

        // NTSC film rate in a millisecond time base.
        let t = tb((24000, 1001), (1, 1000));
        assert_eq!(t.frame_to_pts(24), Pts(1001));
    }

    #[test]
    fn pts_to_frame_floors() {
        let t = tb((25, 1), (1, 90000));
        // Any tick inside a frame's display window maps to that frame.
        assert_eq!(t.pts_to_frame(Pts(0)), 0);
        assert_eq!(t.pts_to_frame(Pts(3599)), 0);
        assert_eq!(t.pts_to_frame(Pts(3600)), 1);
        assert_eq!(t.pts_to_frame(Pts(7199)), 1);
    }

    #[test]
    fn round_trip_over_rate_matrix() {
        // Each rate paired with time bases in which a frame period is a
        // whole number of ticks — the case the mapping is exact for.
        let pairs = [
            ((24, 1), (1, 90000)),
            ((24, 1), (1, 24)),
            ((25, 1), (1, 1000)),
            ((25, 1), (1, 90000)),
            ((30, 1), (1, 600)),
            ((24000, 1001), (1001, 24000)),
            ((30000, 1001), (1001, 30000)),
            ((30000, 1001), (1, 30000)),
            ((30000, 1001), (1, 90000)),
        ];
        for (fps, tick) in pairs {
            let t = tb(fps, tick);
            for frame in 0..500 {
                assert_eq!(
                    t.pts_to_frame(t.frame_to_pts(frame)),
                    frame,
                    "fps={fps:?} tick={tick:?} frame={frame}"
                );
            }
        }
    }

    #[test]
    fn monotonically_non_decreasing() {
        let t = tb((24000, 1001), (1, 1000));
        let mut last = i64::MIN;
        for pts in -2000..2000 {
            let frame = t.pts_to_frame(Pts(pts));
            assert!(frame >= last);
            last = frame;
        }
    }

    #[test]
    fn negative_ticks_map_to_negative_frames() {
        let t = tb((25, 1), (1, 90000));
        assert_eq!(t.pts_to_frame(Pts(-1)), -1);
        assert_eq!(t.pts_to_frame(Pts(-3600)), -1);
        assert_eq!(t.pts_to_frame(Pts(-3601)), -2);
    }

    #[test]
    fn start_offsets_are_honored() {
        let fps = Rational::new(25, 1);
        let tick = Rational::new(1, 90000);
        let t = Timebase::with_start(fps, tick, Pts(7200), Pts(3600));
        assert_eq!(t.frame_to_pts(0), Pts(7200));
        assert_eq!(t.frame_to_pts(1), Pts(10800));
        assert_eq!(t.frame_to_dts(0), Pts(3600));
        assert_eq!(t.frame_to_dts(1), Pts(7200));
        assert_eq!(t.pts_to_frame(Pts(7200)), 0);
        assert_eq!(t.pts_to_frame(Pts(7199)), -1);
        assert_eq!(t.pts_to_frame(Pts(10800)), 1);
    }

    #[test]
    fn huge_frame_index_does_not_overflow() {
        let t = tb((30000, 1001), (1, 90000));
        // The frame-count scan seeks near this nominal index.
        let pts = t.frame_to_pts(1 << 29);
        assert!(pts.0 > 0);
        assert_eq!(t.pts_to_frame(pts), 1 << 29);
    }

    #[test]
    #[should_panic(expected = "frame rate must be positive")]
    fn rejects_non_positive_rate() {
        Timebase::new(Rational::new(0, 1), Rational::new(1, 1000));
    }
}
