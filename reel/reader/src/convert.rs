/*!
    Pixel format and colorspace conversion.

    Wraps the library's software scaler to turn a decoded frame in the
    codec's native pixel format into the stream's chosen packed RGB(A)
    output format. The scaler context is built lazily and cached; any
    setter that changes a parameter feeding it bumps the owning stream's
    generation counter, and the cache rebuilds when the generation it was
    built at falls behind.
*/

use std::ptr;

use ffmpeg_next::{ffi, format::Pixel, frame, util::color};

use reel_types::{Error, Result};

/**
    User override for the YUV to RGB conversion matrix.

    `Auto` picks ITU-R 709 for HD-sized material and 601 otherwise; an
    explicit choice takes precedence over the auto detection.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMatrix {
    #[default]
    Auto,
    Bt709,
    Bt601,
}

/// Map deprecated full-range "J" pixel formats to their canonical
/// limited-range equivalents before any matrix is computed. When the
/// decoder left the range unspecified, a J format implies full range.
pub(crate) fn canonical_format(format: Pixel, range: color::Range) -> (Pixel, color::Range) {
    let jpeg_if_unset = |r: color::Range| {
        if r == color::Range::Unspecified {
            color::Range::JPEG
        } else {
            r
        }
    };
    match format {
        Pixel::YUVJ420P => (Pixel::YUV420P, jpeg_if_unset(range)),
        Pixel::YUVJ422P => (Pixel::YUV422P, jpeg_if_unset(range)),
        Pixel::YUVJ444P => (Pixel::YUV444P, jpeg_if_unset(range)),
        Pixel::YUVJ440P => (Pixel::YUV440P, jpeg_if_unset(range)),
        _ => (format, range),
    }
}

/// The scaler's source range flag: 1 = full (0..255), 0 = limited
/// (16..235). Unspecified ranges default to limited for YUV data and
/// full for RGB data.
pub(crate) fn range_flag(range: color::Range, is_yuv: bool) -> i32 {
    match range {
        color::Range::MPEG => 0,
        color::Range::JPEG => 1,
        _ => {
            if is_yuv {
                0
            } else {
                1
            }
        }
    }
}

/**
    Cached conversion state for one stream.

    Owns the scaler context and the output frame. The output frame is
    allocated once, on first use, and retains the most recently converted
    picture and its timing metadata across calls — the decode fast path
    reads the retained PTS to decide whether a seek is needed.
*/
pub(crate) struct ColorConverter {
    ctx: *mut ffi::SwsContext,
    built_generation: u64,
    output: Option<frame::Video>,
}

impl ColorConverter {
    pub(crate) fn new() -> Self {
        Self {
            ctx: ptr::null_mut(),
            built_generation: 0,
            output: None,
        }
    }

    /// The most recently converted frame, if any conversion has run.
    pub(crate) fn output(&self) -> Option<&frame::Video> {
        self.output.as_ref()
    }

    /**
        Convert `src` into the owned output frame.

        `generation` is the owning stream's current parameter generation;
        a mismatch with the generation the scaler was built at tears the
        context down before converting.
    */
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn convert(
        &mut self,
        src: &frame::Video,
        dst_format: Pixel,
        dst_width: u32,
        dst_height: u32,
        is_yuv: bool,
        rec709: bool,
        matrix: ColorMatrix,
        generation: u64,
    ) -> Result<&frame::Video> {
        if self.built_generation != generation {
            self.free_ctx();
            self.built_generation = generation;
        }

        let (src_format, src_range) = canonical_format(src.format(), src.color_range());

        if self.ctx.is_null() {
            self.ctx = unsafe {
                ffi::sws_getContext(
                    src.width() as i32,
                    src.height() as i32,
                    src_format.into(),
                    dst_width as i32,
                    dst_height as i32,
                    dst_format.into(),
                    ffi::SWS_BICUBIC as i32,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null(),
                )
            };
            if self.ctx.is_null() {
                return Err(Error::codec("failed to create conversion context"));
            }

            // Colorspace coefficients make no sense for RGB sources.
            if is_yuv {
                let colorspace = match matrix {
                    ColorMatrix::Bt709 => ffi::SWS_CS_ITU709 as i32,
                    ColorMatrix::Bt601 => ffi::SWS_CS_ITU601 as i32,
                    ColorMatrix::Auto if rec709 => ffi::SWS_CS_ITU709 as i32,
                    ColorMatrix::Auto => ffi::SWS_CS_ITU601 as i32,
                };
                unsafe {
                    ffi::sws_setColorspaceDetails(
                        self.ctx,
                        ffi::sws_getCoefficients(colorspace),
                        range_flag(src_range, is_yuv),
                        ffi::sws_getCoefficients(ffi::SWS_CS_DEFAULT as i32),
                        1,
                        0,
                        1 << 16,
                        1 << 16,
                    );
                }
            }
        }

        let output = self
            .output
            .get_or_insert_with(|| frame::Video::new(dst_format, dst_width, dst_height));

        unsafe {
            let src_ptr = src.as_ptr();
            let dst_ptr = output.as_mut_ptr();
            (*dst_ptr).pts = (*src_ptr).pts;
            (*dst_ptr).pkt_dts = (*src_ptr).pkt_dts;
            (*dst_ptr).duration = (*src_ptr).duration;

            let ret = ffi::sws_scale(
                self.ctx,
                (*src_ptr).data.as_ptr() as *const *const u8,
                (*src_ptr).linesize.as_ptr(),
                0,
                src.height() as i32,
                (*dst_ptr).data.as_ptr() as *const *mut u8,
                (*dst_ptr).linesize.as_ptr(),
            );
            if ret < 0 {
                return Err(Error::codec("pixel format conversion failed"));
            }
        }

        Ok(output)
    }

    fn free_ctx(&mut self) {
        if !self.ctx.is_null() {
            unsafe {
                ffi::sws_freeContext(self.ctx);
            }
            self.ctx = ptr::null_mut();
        }
    }
}

impl Drop for ColorConverter {
    fn drop(&mut self) {
        self.free_ctx();
    }
}

// SAFETY: the scaler context is only ever touched through &mut self.
unsafe impl Send for ColorConverter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuvj_formats_canonicalize() {
        let (fmt, range) = canonical_format(Pixel::YUVJ420P, color::Range::Unspecified);
        assert_eq!(fmt, Pixel::YUV420P);
        assert_eq!(range, color::Range::JPEG);

        let (fmt, range) = canonical_format(Pixel::YUVJ422P, color::Range::Unspecified);
        assert_eq!(fmt, Pixel::YUV422P);
        assert_eq!(range, color::Range::JPEG);
    }

    #[test]
    fn explicit_range_survives_canonicalization() {
        let (fmt, range) = canonical_format(Pixel::YUVJ444P, color::Range::MPEG);
        assert_eq!(fmt, Pixel::YUV444P);
        assert_eq!(range, color::Range::MPEG);
    }

    #[test]
    fn non_j_formats_pass_through() {
        let (fmt, range) = canonical_format(Pixel::YUV420P, color::Range::Unspecified);
        assert_eq!(fmt, Pixel::YUV420P);
        assert_eq!(range, color::Range::Unspecified);
    }

    #[test]
    fn range_defaults_by_family() {
        // Unspecified: limited for YUV, full for RGB.
        assert_eq!(range_flag(color::Range::Unspecified, true), 0);
        assert_eq!(range_flag(color::Range::Unspecified, false), 1);
        // Explicit ranges are honored either way.
        assert_eq!(range_flag(color::Range::MPEG, false), 0);
        assert_eq!(range_flag(color::Range::JPEG, true), 1);
    }

    #[test]
    fn default_matrix_is_auto() {
        assert_eq!(ColorMatrix::default(), ColorMatrix::Auto);
    }
}
