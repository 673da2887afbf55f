/*!
    Opening a container and selecting its usable video streams.
*/

use std::path::Path;
use std::thread;

use ffmpeg_next::{Dictionary, Packet, codec, decoder, ffi, format, media};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use reel_types::{Error, Result};

use crate::convert::ColorMatrix;
use crate::duration;
use crate::policy;
use crate::stream::{MAX_DECODE_THREADS, StreamProps, VideoStream};

/// The library's default probe window is tuned for single-stream files
/// and is too small to reliably distinguish the tracks of a stereo
/// QuickTime; with a short probe the second track can be reported with
/// different properties than the first even when they are identical.
const PROBE_SIZE: &str = "100000000";

/**
    Stream information reported to the host once per clip-preferences
    pass.
*/
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub frame_count: i64,
}

#[derive(Default)]
struct ErrorState {
    message: String,
    invalid: bool,
}

/**
    An opened container and its usable video streams.

    A source with no usable streams is permanently invalid: every query
    returns its failure gracefully instead of touching absent streams.
    Decode and info queries need `&mut self` / `&self` borrows, which
    serializes access per source; the error state sits behind its own
    lock so an invalid-flag check can run while an open is still being
    inspected elsewhere.
*/
pub struct VideoSource {
    filename: String,
    pub(crate) input: format::context::Input,
    pub(crate) streams: Vec<VideoStream>,
    pub(crate) selected: usize,
    error: Mutex<ErrorState>,
    /// Reused by the single-frame decode path only. Metadata scans use
    /// function-local packets: this one stays associated with the frame
    /// being displayed and must survive between decode calls.
    pub(crate) packet: Packet,
}

impl VideoSource {
    /**
        Open a container and enumerate its decodable video streams.

        Container open and probe failures are returned as errors, as are
        decoder-context and pixel-format-descriptor failures for an
        otherwise accepted stream. A container that opens but yields no
        usable video stream produces a source in the permanent invalid
        state, with the message distinguishing "nothing decodable" from
        "everything rejected by policy".
    */
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::open(e.to_string()))?;

        let filename = path.as_ref().to_string_lossy().into_owned();
        debug!(%filename, "opening container");

        let mut options = Dictionary::new();
        // Follow external track references (QuickTime reference movies).
        options.set("enable_drefs", "1");
        options.set("probesize", PROBE_SIZE);

        let mut input = format::input_with_dictionary(&path, options)
            .map_err(|e| Error::open(format!("{filename}: {e}")))?;

        let mut streams: Vec<VideoStream> = Vec::new();
        let mut policy_rejected = false;

        for stream in input.streams() {
            let index = stream.index();
            let params = stream.parameters();
            if params.medium() != media::Type::Video {
                trace!(index, "not a video stream, skipping");
                continue;
            }
            let Some(props) = StreamProps::capture(&stream) else {
                trace!(index, "unknown pixel format, skipping");
                continue;
            };
            let Some(video_codec) = decoder::find(params.id()) else {
                trace!(index, "decoder not found, skipping");
                continue;
            };
            if !policy::is_codec_readable(video_codec.name()) {
                debug!(index, codec = video_codec.name(), "codec disallowed, skipping");
                policy_rejected = true;
                continue;
            }

            let mut context = codec::context::Context::from_parameters(params)
                .map_err(|e| Error::open(format!("decoder context allocation failed: {e}")))?;

            // Threading must be configured before the decoder opens.
            let threads = thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_DECODE_THREADS);
            let kind = if video_codec
                .capabilities()
                .contains(codec::Capabilities::SLICE_THREADS)
            {
                // Slice threading splits single frames across threads,
                // reducing per-frame latency.
                codec::threading::Type::Slice
            } else {
                codec::threading::Type::Frame
            };
            context.set_threading(codec::threading::Config {
                kind,
                count: threads,
            });

            let opened = match context.decoder().open_as(video_codec) {
                Ok(opened) => opened,
                Err(e) => {
                    debug!(index, codec = video_codec.name(), %e, "decoder failed to open, skipping");
                    continue;
                }
            };
            let video = match opened.video() {
                Ok(video) => video,
                Err(e) => {
                    debug!(index, %e, "not usable as a video decoder, skipping");
                    continue;
                }
            };

            if let Some(first) = streams.first() {
                // Assume a stream whose properties differ from the first
                // accepted stream's is unrelated content rather than an
                // alternative view. Provisional until a user-facing
                // view-to-stream mapping exists; candidates are compared
                // against stream 0 only, deliberately.
                if !first.props_match(&props) {
                    debug!(index, "properties do not match first video stream, ignoring");
                    continue;
                }
            }

            let accepted = VideoStream::new(index, video, &stream, props)?;
            debug!(
                index,
                codec = video_codec.name(),
                width = accepted.width(),
                height = accepted.height(),
                "accepted video stream"
            );
            streams.push(accepted);
        }

        let error = if streams.is_empty() {
            let cause = if policy_rejected {
                Error::UnsupportedCodec
            } else {
                Error::NoVideoStream
            };
            warn!(%filename, %cause, "no usable video stream");
            ErrorState {
                message: cause.to_string(),
                invalid: true,
            }
        } else {
            ErrorState::default()
        };

        let mut source = Self {
            filename,
            input,
            streams,
            selected: 0,
            error: Mutex::new(error),
            packet: Packet::empty(),
        };

        // Start timestamps and frame counts are computed once, here, and
        // never per decode call.
        for i in 0..source.streams.len() {
            let (start_pts, start_dts) =
                duration::stream_start_times(&mut source.input, &mut source.streams[i]);
            source.streams[i].finalize_timing(start_pts, start_dts);
            let frames = duration::stream_frame_count(&mut source.input, &mut source.streams[i]);
            source.streams[i].set_frame_count(frames);
            trace!(stream = i, start_pts, frames, "stream timing established");
        }

        Ok(source)
    }

    #[inline]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[inline]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /**
        The currently selected stream, if the source holds any.
    */
    pub fn selected_stream(&self) -> Option<&VideoStream> {
        self.streams.get(self.selected)
    }

    /**
        Select the stream decode and queries operate on. An out-of-range
        index falls back to stream 0.
    */
    pub fn set_selected_stream(&mut self, index: usize) {
        if index < self.streams.len() {
            self.selected = index;
        } else {
            warn!(index, "invalid stream index, falling back to stream 0");
            self.selected = 0;
        }
    }

    /**
        Width, height, pixel aspect ratio and frame count of the selected
        stream. Returns None when the source is in the invalid state.
    */
    pub fn info(&self) -> Option<VideoInfo> {
        let stream = self.streams.get(self.selected)?;
        Some(VideoInfo {
            width: stream.width(),
            height: stream.height(),
            aspect_ratio: stream.aspect_ratio(),
            frame_count: stream.frame_count(),
        })
    }

    /**
        Frame rate of the selected stream.
    */
    pub fn fps(&self) -> Option<f64> {
        self.streams.get(self.selected).map(|s| s.fps().to_f64())
    }

    /**
        Bytes needed for one decoded output frame.

        Sized for the first stream; all accepted streams share its
        geometry by construction.
    */
    pub fn buffer_len(&self) -> usize {
        self.streams.first().map_or(0, VideoStream::bytes_per_frame)
    }

    /**
        Override the YUV conversion matrix for every stream. Invalidates
        the cached conversion contexts.
    */
    pub fn set_color_matrix(&mut self, matrix: ColorMatrix) {
        for stream in &mut self.streams {
            stream.set_color_matrix(matrix);
        }
    }

    /**
        A colorspace label for the selected stream, inferred from the
        transfer characteristic, with a gamma fallback chosen by the
        codec's storage family (YUV vs RGB).
    */
    pub fn colorspace(&self) -> &'static str {
        let Some(stream) = self.streams.get(self.selected) else {
            return "Gamma2.2";
        };
        let ctx = unsafe { &*stream.decoder.as_ptr() };

        // ProRes reports RGB-capable pixel formats, but official players
        // treat 4444 as gamma 1.8 and 422 variants as gamma 2.2.
        if ctx.codec_id == ffi::AVCodecID::AV_CODEC_ID_PRORES {
            let tag_4444 = u32::from_le_bytes(*b"ap4h");
            let tag_4444_xq = u32::from_le_bytes(*b"ap4x");
            if ctx.codec_tag == tag_4444 || ctx.codec_tag == tag_4444_xq {
                return "Gamma1.8";
            }
            return "Gamma2.2";
        }

        use ffi::AVColorTransferCharacteristic as Trc;
        match ctx.color_trc {
            Trc::AVCOL_TRC_BT709 | Trc::AVCOL_TRC_SMPTE240M => "rec709",
            Trc::AVCOL_TRC_GAMMA22 => "Gamma2.2",
            Trc::AVCOL_TRC_SMPTE170M => "rec601",
            Trc::AVCOL_TRC_SMPTE2084 => "st2084",
            Trc::AVCOL_TRC_IEC61966_2_1 => "sRGB",
            Trc::AVCOL_TRC_LINEAR => "linear",
            _ => {
                if stream.is_yuv() {
                    "Gamma2.2"
                } else {
                    "Gamma1.8"
                }
            }
        }
    }

    /**
        The current error message, empty when no error has occurred.
    */
    pub fn error_message(&self) -> String {
        self.error.lock().message.clone()
    }

    /**
        Returns true if the source can never produce a frame.
    */
    pub fn is_invalid(&self) -> bool {
        self.error.lock().invalid
    }

    /// Record a per-call internal library error: the numeric status is
    /// translated and kept for `error_message`, without invalidating the
    /// source — a later call may still succeed.
    pub(crate) fn set_internal_error(&self, err: ffmpeg_next::Error, prefix: &str) {
        let message = format!("{prefix}{err}");
        let code: i32 = err.into();
        self.error.lock().message = format!("{message} (error {code})");
    }
}

// SAFETY: every FFmpeg handle in a source is exclusively owned by it,
// and all mutation goes through `&mut self` or the internal lock.
unsafe impl Send for VideoSource {}
