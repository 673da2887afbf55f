/*!
    Frame-accurate decoding.

    Decoding frame N is a search, not an array index: the demuxer is
    seeked backward to the nearest keyframe at or before N's timestamp,
    packets are fed to the decoder, and every decoded frame is tested
    against N until the right one falls out. B-frame reordering, open
    GOPs and end-of-stream flushing all complicate the search; the one
    reliable fallback for inter-coded streams is a single retry from the
    absolute start of the stream.
*/

use ffmpeg_next::{Packet, ffi, format};
use tracing::{trace, warn};

use reel_types::{Error, Pts, Result, Timebase};

use crate::source::VideoSource;
use crate::stream::{NO_PTS, VideoStream};

/// A decoded frame satisfies `target` if it is the target frame itself,
/// or if it is an earlier frame whose display window holds it on screen
/// past the target's tick (some frames display longer than one output
/// frame period).
fn frame_covers_target(timebase: &Timebase, pts: i64, duration: i64, target: i64) -> bool {
    let index = timebase.pts_to_frame(Pts(pts));
    index == target
        || (index < target
            && timebase.pts_to_frame(Pts(pts.saturating_add(duration))) > target)
}

enum DemuxError {
    Read(ffmpeg_next::Error),
    Decode(ffmpeg_next::Error),
}

impl VideoSource {
    /**
        Decode the given 1-based frame number into `buffer`.

        With `load_nearest` set, an out-of-range request clamps to the
        nearest valid frame; without it, the request fails with
        [`Error::MissingFrame`] — a contract violation deliberately
        distinct from a decode-internal miss.

        On failure the buffer is left untouched (or holding the previous
        successful conversion); it never passes for a decoded frame.
    */
    pub fn decode(&mut self, frame: i64, load_nearest: bool, buffer: &mut [u8]) -> Result<()> {
        if self.streams.is_empty() {
            return Err(Error::invalid_data(self.error_message()));
        }

        // External frame numbers are 1-based.
        let requested = frame - 1;

        let (min_frame, frame_count) = {
            let stream = &self.streams[self.selected];
            let start = stream
                .reported_start_time()
                .unwrap_or_else(|| stream.timebase().start_pts().0);
            (stream.timebase().pts_to_frame(Pts(start)), stream.frame_count())
        };

        let target = if requested < min_frame {
            if !load_nearest {
                return Err(Error::MissingFrame { frame });
            }
            min_frame
        } else if requested >= frame_count {
            if !load_nearest {
                return Err(Error::MissingFrame { frame });
            }
            frame_count - 1
        } else {
            requested
        };

        // Sequential fast path: when the decoder is already positioned
        // to produce `target` next, skip the (costly) seek and resume
        // from the current demux position.
        let needs_seek = {
            let stream = &self.streams[self.selected];
            match stream.last_pts {
                Some(pts) => stream.timebase().pts_to_frame(Pts(pts)) + 1 != target,
                None => true,
            }
        };
        if needs_seek {
            let timestamp = self.streams[self.selected].timebase().frame_to_pts(target).0;
            trace!(target, timestamp, "seeking");
            self.seek_to(timestamp, ffi::AVSEEK_FLAG_BACKWARD as i32)?;
        } else {
            trace!(target, "sequential fast path, no seek");
        }

        let intra_only = self.streams[self.selected].is_intra_only();
        let mut retried = false;
        loop {
            if self.demux_and_decode(target)? {
                break;
            }
            if intra_only || retried {
                return Err(Error::DecodeFailed { frame });
            }
            // Last-ditch effort for inter-coded streams: a forward seek
            // can land between keyframes with unresolved reference
            // frames, and restarting from the head of the stream is the
            // only reliable way to get frame-accurate output.
            retried = true;
            warn!(frame, "no picture produced, restarting from stream start");
            self.seek_to(0, (ffi::AVSEEK_FLAG_FRAME | ffi::AVSEEK_FLAG_BACKWARD) as i32)?;
        }

        let stream = &mut self.streams[self.selected];
        stream.convert_current()?;
        stream.copy_output(buffer)?;
        stream.last_pts = stream.intermediate.pts();
        Ok(())
    }

    /// Flush the decoder and reposition the demuxer. Any failure is
    /// recorded and aborts the decode call.
    fn seek_to(&mut self, timestamp: i64, flags: i32) -> Result<()> {
        let stream = &mut self.streams[self.selected];
        stream.decoder.flush();
        let index = stream.index() as i32;
        let ret = unsafe { ffi::av_seek_frame(self.input.as_mut_ptr(), index, timestamp, flags) };
        if ret < 0 {
            let err = ffmpeg_next::Error::from(ret);
            self.set_internal_error(err, "failed to seek frame: ");
            return Err(Error::seek(err.to_string()));
        }
        Ok(())
    }

    /// One pass of the demux-and-decode loop from the current position.
    /// Returns Ok(true) when the intermediate frame holds the target.
    fn demux_and_decode(&mut self, target: i64) -> Result<bool> {
        let selected = self.selected;
        let outcome = demux_loop(
            &mut self.input,
            &mut self.streams[selected],
            &mut self.packet,
            target,
        );
        match outcome {
            Ok(found) => Ok(found),
            Err(DemuxError::Read(err)) => {
                self.set_internal_error(err, "failed to read frame: ");
                Err(Error::codec(format!("packet read failed: {err}")))
            }
            Err(DemuxError::Decode(err)) => {
                self.set_internal_error(err, "failed to decode packet: ");
                Err(Error::codec(format!("decode failed: {err}")))
            }
        }
    }
}

fn demux_loop(
    input: &mut format::context::Input,
    stream: &mut VideoStream,
    packet: &mut Packet,
    target: i64,
) -> std::result::Result<bool, DemuxError> {
    loop {
        match packet.read(input) {
            Ok(()) => {
                if packet.stream() != stream.index() {
                    continue;
                }
                stream
                    .decoder
                    .send_packet(&*packet)
                    .map_err(DemuxError::Decode)?;
                if receive_until_match(stream, target).map_err(DemuxError::Decode)? {
                    return Ok(true);
                }
            }
            Err(ffmpeg_next::Error::Eof) => break,
            Err(err) => return Err(DemuxError::Read(err)),
        }
    }

    // End of stream: the decoder may still hold reordered frames. Drain
    // it and keep applying the same matching rule to flushed output.
    match stream.decoder.send_eof() {
        Ok(()) | Err(ffmpeg_next::Error::Eof) => {}
        Err(err) => return Err(DemuxError::Decode(err)),
    }
    receive_until_match(stream, target).map_err(DemuxError::Decode)
}

/// Receive decoded frames until the target is found or the decoder runs
/// dry. Frames other than the sought one are discarded, not buffered;
/// only the first match in scan order is used.
fn receive_until_match(
    stream: &mut VideoStream,
    target: i64,
) -> std::result::Result<bool, ffmpeg_next::Error> {
    loop {
        match stream.decoder.receive_frame(&mut stream.intermediate) {
            Ok(()) => {
                // B-frame reordering can leave a frame without a PTS;
                // fall back to the DTS of the packet that produced it.
                let pts = match stream.intermediate.pts() {
                    Some(pts) => pts,
                    None => unsafe { (*stream.intermediate.as_ptr()).pkt_dts },
                };
                stream.intermediate.set_pts(Some(pts));
                let duration = unsafe { (*stream.intermediate.as_ptr()).duration };

                if pts != NO_PTS && frame_covers_target(stream.timebase(), pts, duration, target) {
                    trace!(pts, target, "matched frame");
                    return Ok(true);
                }
                trace!(pts, target, "discarding non-target frame");
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                return Ok(false);
            }
            Err(ffmpeg_next::Error::Eof) => return Ok(false),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_types::Rational;

    fn timebase_25fps() -> Timebase {
        // 25 fps in a 1/90000 tick: 3600 ticks per frame.
        Timebase::new(Rational::new(25, 1), Rational::new(1, 90000))
    }

    #[test]
    fn exact_index_matches() {
        let tb = timebase_25fps();
        assert!(frame_covers_target(&tb, 3600, 3600, 1));
        assert!(!frame_covers_target(&tb, 3600, 3600, 2));
    }

    #[test]
    fn display_window_straddle_matches() {
        let tb = timebase_25fps();
        // A frame at tick 3600 held for three frame periods covers
        // targets 1 through 3; it leaves the screen at tick 14400.
        assert!(frame_covers_target(&tb, 3600, 10800, 1));
        assert!(frame_covers_target(&tb, 3600, 10800, 2));
        assert!(frame_covers_target(&tb, 3600, 10800, 3));
        assert!(!frame_covers_target(&tb, 3600, 10800, 4));
    }

    #[test]
    fn later_frame_never_matches_earlier_target() {
        let tb = timebase_25fps();
        assert!(!frame_covers_target(&tb, 7200, 36000, 1));
    }

    #[test]
    fn single_period_frame_does_not_straddle() {
        let tb = timebase_25fps();
        // Normal frames cover exactly their own index.
        for frame in 0..10 {
            let pts = frame * 3600;
            assert!(frame_covers_target(&tb, pts, 3600, frame));
            assert!(!frame_covers_target(&tb, pts, 3600, frame + 1));
        }
    }
}
