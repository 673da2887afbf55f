/*!
    Capability catalog for the linked FFmpeg build.

    The library registers its codec and format tables process-statically,
    but which of them this module is willing to use is a policy question
    (see [`crate::policy`]). The catalog intersects the two: everything
    the linked build actually provides, filtered through the policy
    tables. It is an ordinary owned value — construct it once at startup
    and pass it by reference to whatever needs to populate a choice list.
*/

use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;

use ffmpeg_next::ffi;

use crate::policy;

/**
    The codec and container names usable for reading and writing with
    the linked library build.
*/
pub struct CapabilityCatalog {
    readable_codecs: Vec<String>,
    writable_codecs: Vec<String>,
    readable_formats: Vec<String>,
    writable_formats: Vec<String>,
}

impl CapabilityCatalog {
    /**
        Enumerate the linked build's codecs, demuxers and muxers and keep
        the policy-approved ones. The underlying registration tables are
        process-static, so one catalog per process is enough.
    */
    pub fn new() -> Self {
        let _ = ffmpeg_next::init();

        let mut readable_codecs = Vec::new();
        let mut writable_codecs = Vec::new();
        let mut readable_formats = Vec::new();
        let mut writable_formats = Vec::new();

        unsafe {
            let mut opaque: *mut c_void = ptr::null_mut();
            loop {
                let codec = ffi::av_codec_iterate(&mut opaque);
                if codec.is_null() {
                    break;
                }
                let Ok(name) = CStr::from_ptr((*codec).name).to_str() else {
                    continue;
                };
                if ffi::av_codec_is_decoder(codec) != 0 && policy::is_codec_readable(name) {
                    readable_codecs.push(name.to_owned());
                }
                if ffi::av_codec_is_encoder(codec) != 0 && policy::is_codec_writable(name) {
                    writable_codecs.push(name.to_owned());
                }
            }

            let mut opaque: *mut c_void = ptr::null_mut();
            loop {
                let format = ffi::av_demuxer_iterate(&mut opaque);
                if format.is_null() {
                    break;
                }
                let Ok(name) = CStr::from_ptr((*format).name).to_str() else {
                    continue;
                };
                // Demuxer names can be comma-separated alias lists
                // ("mov,mp4,m4a,3gp,3g2,mj2").
                for alias in name.split(',') {
                    if policy::is_format_readable(alias) {
                        readable_formats.push(alias.to_owned());
                    }
                }
            }

            let mut opaque: *mut c_void = ptr::null_mut();
            loop {
                let format = ffi::av_muxer_iterate(&mut opaque);
                if format.is_null() {
                    break;
                }
                let Ok(name) = CStr::from_ptr((*format).name).to_str() else {
                    continue;
                };
                for alias in name.split(',') {
                    if policy::is_format_writable(alias) {
                        writable_formats.push(alias.to_owned());
                    }
                }
            }
        }

        for list in [
            &mut readable_codecs,
            &mut writable_codecs,
            &mut readable_formats,
            &mut writable_formats,
        ] {
            list.sort();
            list.dedup();
        }

        Self {
            readable_codecs,
            writable_codecs,
            readable_formats,
            writable_formats,
        }
    }

    pub fn readable_codecs(&self) -> &[String] {
        &self.readable_codecs
    }

    pub fn writable_codecs(&self) -> &[String] {
        &self.writable_codecs
    }

    pub fn readable_formats(&self) -> &[String] {
        &self.readable_formats
    }

    pub fn writable_formats(&self) -> &[String] {
        &self.writable_formats
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_agrees_with_policy() {
        let catalog = CapabilityCatalog::new();
        for name in catalog.readable_codecs() {
            assert!(policy::is_codec_readable(name), "{name}");
        }
        for name in catalog.writable_codecs() {
            assert!(policy::is_codec_writable(name), "{name}");
        }
        for name in catalog.readable_formats() {
            assert!(policy::is_format_readable(name), "{name}");
        }
        for name in catalog.writable_formats() {
            assert!(policy::is_format_writable(name), "{name}");
        }
    }

    #[test]
    fn catalog_lists_are_sorted_and_unique() {
        let catalog = CapabilityCatalog::new();
        for list in [
            catalog.readable_codecs(),
            catalog.writable_codecs(),
            catalog.readable_formats(),
            catalog.writable_formats(),
        ] {
            assert!(list.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn catalog_never_offers_the_mpeg1_writer() {
        let catalog = CapabilityCatalog::new();
        assert!(!catalog.writable_codecs().iter().any(|n| n == "mpeg1video"));
    }
}
