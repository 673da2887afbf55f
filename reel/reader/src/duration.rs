/*!
    Start timestamp and frame count estimation.

    Container metadata is unreliable: movie-level durations are stored
    rounded into a fixed global time base, stream-level frame counts may
    be absent, and some files carry no usable duration at all. The
    estimators here run a cascade from the cheapest, most authoritative
    strategy down to a full packet scan, and each later strategy runs
    only when every earlier one produced nothing usable.
*/

use ffmpeg_next::{Packet, ffi, format};
use tracing::{debug, trace};

use reel_types::{Pts, Rational};

use crate::stream::{NO_PTS, VideoStream};

/// The fixed global time base container durations are expressed in
/// (microseconds in practice).
const GLOBAL_TIME_BASE: i64 = ffi::AV_TIME_BASE as i64;

/**
    Determine the stream's start PTS and DTS.

    An explicit non-negative container start time is honored as-is.
    Otherwise the stream is seeked back to its (invalid) reported start
    and scanned for the first packet whose presentation window ends
    after zero — reference players discard the negative-timestamped
    lead-in frames that exist only for decoder priming, and using this
    packet as frame zero makes our output line up with theirs. A stream
    with no such packet starts at 0/0.
*/
pub(crate) fn stream_start_times(
    input: &mut format::context::Input,
    stream: &mut VideoStream,
) -> (i64, i64) {
    let reported = stream.reported_start_time();
    if let Some(start) = reported {
        if start >= 0 {
            trace!(start, "start time from container metadata");
            return (start, start);
        }
    }

    trace!("container start time absent or negative, scanning packets");
    stream.decoder.flush();
    let raw = reported.unwrap_or(NO_PTS);
    let seeked = unsafe {
        ffi::av_seek_frame(
            input.as_mut_ptr(),
            stream.index() as i32,
            raw,
            ffi::AVSEEK_FLAG_BACKWARD as i32,
        )
    };
    if seeked >= 0 {
        // Local packet: the source's reusable packet belongs to the
        // decode path and must never be touched by metadata scans.
        let mut packet = Packet::empty();
        while packet.read(input).is_ok() {
            if packet.stream() != stream.index() {
                continue;
            }
            let pts = packet.pts().unwrap_or(NO_PTS);
            if pts.saturating_add(packet.duration()) > 0 {
                let dts = packet.dts().unwrap_or(pts);
                trace!(pts, dts, "start time from packet scan");
                return (pts, dts);
            }
        }
    }

    // No packet ends after zero; presentation effectively starts at 0.
    (0, 0)
}

/**
    Determine the stream's total frame count.
*/
pub(crate) fn stream_frame_count(
    input: &mut format::context::Input,
    stream: &mut VideoStream,
) -> i64 {
    let mut frames = 0;

    // Preferred: the movie-level duration, which reflects any edit-list
    // remapping of the track without recoding it.
    let container_duration = input.duration();
    if container_duration > 0 {
        frames = frames_from_container_duration(container_duration, stream.fps());
        frames = reconcile_with_reported(frames, stream.reported_frame_count());
        trace!(frames, "frame count from container duration");
    }

    if frames <= 0 && stream.reported_frame_count() > 0 {
        frames = stream.reported_frame_count();
        trace!(frames, "frame count from stream metadata");
    }

    if frames <= 0 {
        let stream_duration = stream.reported_duration();
        if stream_duration > 0 {
            frames = frames_from_stream_duration(
                stream_duration,
                stream.timebase().tick(),
                stream.fps(),
            );
            trace!(frames, "frame count from stream duration");
        }
    }

    if frames <= 0 {
        frames = scan_for_last_pts(input, stream);
        trace!(frames, "frame count from packet scan");
    }

    frames
}

/**
    Frames from the container-level duration.

    The container stores its duration converted, with round-to-nearest
    semantics, into the fixed global time base; the original rational
    duration is lost, so an exact-frame-count duration may arrive one
    tick high or low. Subtracting one tick and then rounding the frame
    conversion up yields the exact count in every rounding direction the
    container may have taken.
*/
pub(crate) fn frames_from_container_duration(duration: i64, fps: Rational) -> i64 {
    let divisor = GLOBAL_TIME_BASE as i128 * fps.den as i128;
    let num = (duration as i128 - 1) * fps.num as i128;
    ((num + divisor - 1) / divisor) as i64
}

/**
    Some muxers round the stored duration to a coarser unit (commonly
    milliseconds), which can overstate the estimate by exactly one
    frame. When the stream's own reported count is within one frame of
    the estimate, the reported count is the trustworthy one.
*/
pub(crate) fn reconcile_with_reported(estimate: i64, reported: i64) -> i64 {
    if reported > 0 && (estimate - reported).abs() <= 1 {
        reported
    } else {
        estimate
    }
}

/**
    Frames from the stream's own duration, expressed in its native time
    base rather than the container's fixed global one.
*/
pub(crate) fn frames_from_stream_duration(duration: i64, tick: Rational, fps: Rational) -> i64 {
    ((duration as i128 * tick.num as i128 * fps.num as i128)
        / (tick.den as i128 * fps.den as i128)) as i64
}

/// Last resort: seek to the last keyframe (by way of an absurdly large
/// nominal frame index) and scan every remaining packet for the
/// maximum valid PTS.
fn scan_for_last_pts(input: &mut format::context::Input, stream: &mut VideoStream) -> i64 {
    debug!("no usable duration metadata, scanning stream for last PTS");

    let timebase = *stream.timebase();
    let mut max_pts = timebase.start_pts().0;

    stream.decoder.flush();
    let target = timebase.frame_to_pts(1 << 29).0;
    unsafe {
        ffi::av_seek_frame(
            input.as_mut_ptr(),
            stream.index() as i32,
            target,
            ffi::AVSEEK_FLAG_BACKWARD as i32,
        );
    }

    // Local packet; see stream_start_times.
    let mut packet = Packet::empty();
    while packet.read(input).is_ok() {
        if packet.stream() != stream.index() {
            continue;
        }
        if let Some(pts) = packet.pts() {
            if pts > max_pts {
                max_pts = pts;
            }
        }
    }

    // Start and max PTS are both frame starts, so the stream extends
    // one frame beyond the range between them.
    timebase.pts_to_frame(Pts(max_pts)) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS_24: Rational = Rational { num: 24, den: 1 };
    const FPS_25: Rational = Rational { num: 25, den: 1 };

    #[test]
    fn container_duration_exact() {
        // 10 frames at 25 fps is exactly 400000 microseconds.
        assert_eq!(frames_from_container_duration(400_000, FPS_25), 10);
    }

    #[test]
    fn container_duration_rounded_down_one_tick() {
        // 5 frames at 24 fps is 208333.3 microseconds; the container may
        // have stored the floor.
        assert_eq!(frames_from_container_duration(208_333, FPS_24), 5);
        assert_eq!(frames_from_container_duration(399_999, FPS_25), 10);
    }

    #[test]
    fn container_duration_rounded_up_one_tick() {
        assert_eq!(frames_from_container_duration(208_334, FPS_24), 5);
        assert_eq!(frames_from_container_duration(400_001, FPS_25), 10);
    }

    #[test]
    fn reported_count_wins_within_one_frame() {
        // A duration rounded up to a whole millisecond overstates a
        // 5-frame 24 fps clip as 6 frames.
        let estimate = frames_from_container_duration(209_000, FPS_24);
        assert_eq!(estimate, 6);
        assert_eq!(reconcile_with_reported(estimate, 5), 5);
    }

    #[test]
    fn reported_count_ignored_when_far_off() {
        assert_eq!(reconcile_with_reported(100, 5), 100);
        assert_eq!(reconcile_with_reported(100, 0), 100);
        assert_eq!(reconcile_with_reported(100, -3), 100);
    }

    #[test]
    fn stream_duration_conversion() {
        // 240 ticks in a 1/24 time base at 24 fps.
        assert_eq!(
            frames_from_stream_duration(240, Rational::new(1, 24), FPS_24),
            240
        );
        // 10 seconds in a 1/90000 time base at 25 fps.
        assert_eq!(
            frames_from_stream_duration(900_000, Rational::new(1, 90000), FPS_25),
            250
        );
    }
}
