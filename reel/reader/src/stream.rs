/*!
    Per-stream decoding state.
*/

use ffmpeg_next::{
    codec, decoder, ffi,
    format::{Pixel, stream::Stream as FormatStream},
    frame,
};

use reel_types::{Error, Pts, Rational, Result, Timebase};

use crate::convert::{ColorConverter, ColorMatrix};

/// AV_NOPTS_VALUE: the library's "no timestamp" sentinel.
pub(crate) const NO_PTS: i64 = i64::MIN;

/// Decoder thread cap. Opening many sources at once, each spawning one
/// decode thread per core, starves the process of threads and fails
/// reads; the cap bounds the total.
pub(crate) const MAX_DECODE_THREADS: usize = 16;

/// Codecs that are intra-only in practice but can report a nonzero GOP
/// size when muxed by tools that write one anyway.
const KNOWN_INTRA_CODECS: &[codec::Id] = &[
    codec::Id::PRORES,
    codec::Id::DNXHD,
    codec::Id::MJPEG,
    codec::Id::MJPEGB,
    codec::Id::PNG,
];

fn pixel_descriptor(format: Pixel) -> Option<&'static ffi::AVPixFmtDescriptor> {
    let ptr = unsafe { ffi::av_pix_fmt_desc_get(format.into()) };
    if ptr.is_null() { None } else { Some(unsafe { &*ptr }) }
}

/**
    Snapshot of the container-level properties used to decide whether a
    later video stream is another view of the same content. Streams that
    agree on every one of these are far more likely to be multi-view
    pairs than unrelated tracks.
*/
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StreamProps {
    codec_id: i32,
    bits_per_raw_sample: i32,
    width: i32,
    height: i32,
    codec_aspect: (i32, i32),
    components: u8,
    stream_aspect: (i32, i32),
    time_base: (i32, i32),
    start_time: i64,
    duration: i64,
    nb_frames: i64,
    real_frame_rate: (i32, i32),
}

impl StreamProps {
    /// Returns None when the stream has no known pixel format — such a
    /// stream is never accepted, and never matched against.
    pub(crate) fn capture(stream: &FormatStream<'_>) -> Option<Self> {
        let params = stream.parameters();
        let par = unsafe { &*params.as_ptr() };
        if par.format == ffi::AVPixelFormat::AV_PIX_FMT_NONE as i32 {
            return None;
        }
        // SAFETY: the raw value originates from the library, which only
        // stores valid AVPixelFormat discriminants.
        let raw_format = unsafe { std::mem::transmute::<i32, ffi::AVPixelFormat>(par.format) };
        let desc = unsafe { ffi::av_pix_fmt_desc_get(raw_format) };
        if desc.is_null() {
            return None;
        }
        let st = unsafe { &*stream.as_ptr() };
        Some(Self {
            codec_id: par.codec_id as i32,
            bits_per_raw_sample: par.bits_per_raw_sample,
            width: par.width,
            height: par.height,
            codec_aspect: (par.sample_aspect_ratio.num, par.sample_aspect_ratio.den),
            components: unsafe { (*desc).nb_components },
            stream_aspect: (st.sample_aspect_ratio.num, st.sample_aspect_ratio.den),
            time_base: (st.time_base.num, st.time_base.den),
            start_time: st.start_time,
            duration: st.duration,
            nb_frames: st.nb_frames,
            real_frame_rate: (st.r_frame_rate.num, st.r_frame_rate.den),
        })
    }
}

/**
    One usable video elementary stream inside an open source.

    Geometry and pixel format are fixed once the decoder opens; frame
    count and start timestamps are fixed once first computed during open
    and never recomputed per decode call.
*/
pub struct VideoStream {
    index: usize,
    pub(crate) decoder: decoder::Video,
    /// Decode target, reused across receive calls so the converter's
    /// retained output frame survives unrelated decoder churn.
    pub(crate) intermediate: frame::Video,
    pub(crate) converter: ColorConverter,
    props: StreamProps,
    width: u32,
    height: u32,
    bit_depth: u32,
    components: u32,
    aspect: f64,
    output_format: Pixel,
    fps: Rational,
    is_yuv: bool,
    intra_only: bool,
    timebase: Timebase,
    frame_count: i64,
    /// PTS of the last frame the decode path produced; drives the
    /// sequential fast path.
    pub(crate) last_pts: Option<i64>,
    color_matrix: ColorMatrix,
    generation: u64,
}

impl VideoStream {
    pub(crate) fn new(
        index: usize,
        decoder: decoder::Video,
        stream: &FormatStream<'_>,
        props: StreamProps,
    ) -> Result<Self> {
        let format = decoder.format();
        let Some(desc) = pixel_descriptor(format) else {
            // Continuing would leave the stream with undefined geometry.
            return Err(Error::invalid_data("pixel format descriptor lookup failed"));
        };

        // The consuming layer only understands 3- and 4-channel data;
        // 1- and 2-channel formats are promoted to 3 so every buffer
        // size calculation downstream stays consistent.
        let components = (desc.nb_components as u32).max(3);

        let mut bit_depth = unsafe { (*decoder.as_ptr()).bits_per_raw_sample } as u32;
        if bit_depth == 0 {
            bit_depth = unsafe { ffi::av_get_bits_per_pixel(desc) } as u32 / components;
        }

        let output_format = if bit_depth > 8 {
            if components == 4 { Pixel::RGBA64LE } else { Pixel::RGB48LE }
        } else if components == 4 {
            Pixel::RGBA
        } else {
            Pixel::RGB24
        };

        let rate = stream.rate();
        let fps = if rate.numerator() != 0 && rate.denominator() != 0 {
            Rational::new(rate.numerator(), rate.denominator())
        } else {
            // Unspecified frame rate; assume 1 fps.
            Rational::new(1, 1)
        };
        let tb = stream.time_base();
        let tick = Rational::new(tb.numerator(), tb.denominator());

        let aspect = {
            let stream_sar = unsafe { (*stream.as_ptr()).sample_aspect_ratio };
            let codec_sar = unsafe { (*decoder.as_ptr()).sample_aspect_ratio };
            if stream_sar.num != 0 {
                f64::from(ffmpeg_next::Rational::from(stream_sar))
            } else if codec_sar.num != 0 {
                f64::from(ffmpeg_next::Rational::from(codec_sar))
            } else {
                1.0
            }
        };

        // A zero GOP size means intra-only encoding, which permits
        // sequential output assumptions and changes the retry policy.
        let gop_size = unsafe { (*decoder.as_ptr()).gop_size };
        let intra_only = gop_size == 0 || KNOWN_INTRA_CODECS.contains(&decoder.id());

        let is_yuv = (desc.flags & ffi::AV_PIX_FMT_FLAG_RGB as u64) == 0;

        let width = decoder.width();
        let height = decoder.height();
        let timebase = Timebase::new(fps, tick);

        Ok(Self {
            index,
            decoder,
            intermediate: frame::Video::empty(),
            converter: ColorConverter::new(),
            props,
            width,
            height,
            bit_depth,
            components,
            aspect,
            output_format,
            fps,
            is_yuv,
            intra_only,
            timebase,
            frame_count: 0,
            last_pts: None,
            color_matrix: ColorMatrix::Auto,
            generation: 0,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    #[inline]
    pub fn components(&self) -> u32 {
        self.components
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect
    }

    #[inline]
    pub fn output_format(&self) -> Pixel {
        self.output_format
    }

    #[inline]
    pub fn fps(&self) -> Rational {
        self.fps
    }

    #[inline]
    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }

    #[inline]
    pub fn frame_count(&self) -> i64 {
        self.frame_count
    }

    #[inline]
    pub fn is_intra_only(&self) -> bool {
        self.intra_only
    }

    /// True when the decoder stores YUV rather than RGB data.
    #[inline]
    pub fn is_yuv(&self) -> bool {
        self.is_yuv
    }

    /// Bytes needed for one output frame in the chosen output format.
    pub fn bytes_per_frame(&self) -> usize {
        let depth = if self.bit_depth > 8 { 2 } else { 1 };
        self.width as usize * self.height as usize * self.components as usize * depth
    }

    pub(crate) fn props_match(&self, candidate: &StreamProps) -> bool {
        self.props == *candidate
    }

    pub(crate) fn reported_start_time(&self) -> Option<i64> {
        (self.props.start_time != NO_PTS).then_some(self.props.start_time)
    }

    pub(crate) fn reported_duration(&self) -> i64 {
        self.props.duration
    }

    pub(crate) fn reported_frame_count(&self) -> i64 {
        self.props.nb_frames
    }

    /// Anchor the timebase once the start timestamps are known.
    pub(crate) fn finalize_timing(&mut self, start_pts: i64, start_dts: i64) {
        self.timebase = Timebase::with_start(
            self.fps,
            self.timebase.tick(),
            Pts(start_pts),
            Pts(start_dts),
        );
    }

    pub(crate) fn set_frame_count(&mut self, frames: i64) {
        self.frame_count = frames;
    }

    /// Changing the matrix override invalidates the cached conversion
    /// context; the bumped generation forces a rebuild on next use.
    pub(crate) fn set_color_matrix(&mut self, matrix: ColorMatrix) {
        if self.color_matrix != matrix {
            self.color_matrix = matrix;
            self.generation += 1;
        }
    }

    /// Convert the frame currently held in the intermediate buffer into
    /// the converter's retained output frame.
    pub(crate) fn convert_current(&mut self) -> Result<()> {
        let (format, width, height) = (self.output_format, self.width, self.height);
        // HD material defaults to Rec.709 coefficients.
        let rec709 = self.height >= 720;
        let (is_yuv, matrix, generation) = (self.is_yuv, self.color_matrix, self.generation);
        self.converter
            .convert(
                &self.intermediate,
                format,
                width,
                height,
                is_yuv,
                rec709,
                matrix,
                generation,
            )
            .map(|_| ())
    }

    /// Copy the retained output frame into a caller buffer, packing rows
    /// tightly (the scaler's own rows may carry alignment padding).
    pub(crate) fn copy_output(&self, buffer: &mut [u8]) -> Result<()> {
        let Some(converted) = self.converter.output() else {
            return Err(Error::invalid_data("no converted frame available"));
        };
        let depth = if self.bit_depth > 8 { 2 } else { 1 };
        let row_bytes = self.width as usize * self.components as usize * depth;
        let needed = row_bytes * self.height as usize;
        if buffer.len() < needed {
            return Err(Error::invalid_data(format!(
                "output buffer too small: {} bytes, need {needed}",
                buffer.len()
            )));
        }
        let stride = converted.stride(0);
        let data = converted.data(0);
        for (row, out) in buffer[..needed].chunks_exact_mut(row_bytes).enumerate() {
            let start = row * stride;
            out.copy_from_slice(&data[start..start + row_bytes]);
        }
        Ok(())
    }
}
