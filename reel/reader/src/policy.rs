/*!
    Codec and container compatibility policy.

    The linked multimedia library advertises hundreds of codecs of wildly
    different quality, legality, and compatibility. These tables are the
    single place that encodes which of those we trust — each entry flags
    read and write eligibility independently. Write eligibility is
    consulted by the encoder selection layer and by the capability
    catalog; the reader only cares about the read flags.
*/

/**
    Read/write eligibility for one named codec or container format.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capability {
    pub read: bool,
    pub write: bool,
}

struct FilterEntry {
    name: &'static str,
    read: bool,
    write: bool,
}

const fn entry(name: &'static str, read: bool, write: bool) -> FilterEntry {
    FilterEntry { name, read, write }
}

const FORMAT_WHITELIST: &[FilterEntry] = &[
    entry("3gp", true, true),
    entry("3g2", true, true),
    entry("avi", true, true),
    entry("dv", true, false),        // DV, no HD support
    entry("flv", true, true),        // only used with the flv codec
    entry("gif", true, true),
    entry("h264", true, false),      // raw H.264; prefer a proper container
    entry("hevc", true, false),      // raw HEVC
    entry("m4v", true, false),       // raw MPEG-4; prefer a proper container
    entry("matroska", true, true),
    entry("mov", true, true),
    entry("mp4", true, true),
    entry("mpeg", true, true),
    entry("mpegts", true, true),
    entry("mxf", true, false),       // too many write-side profile constraints
    entry("ogg", true, false),       // use ogv for writing
    entry("ogv", true, true),
];

const CODEC_WHITELIST: &[FilterEntry] = &[
    // Video codecs.
    entry("aic", true, false),           // Apple Intermediate Codec (no encoder)
    entry("avrp", true, true),           // Avid 1:1 10-bit RGB Packer
    entry("avui", true, false),          // Avid Meridien, SD only
    entry("ayuv", true, true),           // Uncompressed packed MS 4:4:4:4
    entry("cfhd", true, false),          // Cineform HD
    entry("cinepak", true, true),
    entry("dxv", true, false),           // Resolume DXV
    entry("dnxhd", true, true),          // VC3/DNxHD
    entry("ffv1", true, true),
    entry("ffvhuff", true, true),        // Huffyuv FFmpeg variant
    entry("flv", true, true),            // Sorenson Spark (Flash Video)
    entry("gif", true, true),
    entry("h263p", true, true),          // H.263+ / H.263-1998
    entry("h264", true, false),          // the encoder is libx264
    entry("hap", true, true),            // Vidvox Hap
    entry("hevc", true, false),          // the encoder is libx265
    entry("huffyuv", true, true),
    entry("jpeg2000", true, true),
    entry("jpegls", true, true),
    entry("libopenh264", true, true),    // Cisco H.264 encoder
    entry("libopenjpeg", true, true),    // OpenJPEG JPEG 2000
    entry("libschroedinger", true, true), // Dirac
    entry("libtheora", true, true),
    entry("libvpx", true, true),         // On2 VP8
    entry("libvpx-vp9", true, true),     // Google VP9
    entry("libx264", true, true),
    entry("libx264rgb", true, true),
    entry("libx265", true, true),
    entry("libxavs", true, false),       // Chinese AVS encoder, untested
    entry("libxvid", true, true),        // MPEG-4 part 2
    entry("ljpeg", true, true),          // Lossless JPEG
    entry("mjpeg", true, true),          // Motion JPEG (MJPEG-A)
    entry("mpeg1video", true, false),    // the writer produces blocky artifacts
    entry("mpeg2video", true, true),
    entry("mpeg4", true, true),          // MPEG-4 part 2
    entry("msmpeg4v2", true, true),      // MPEG-4 part 2 MS variant v2
    entry("msmpeg4", true, true),        // MPEG-4 part 2 MS variant v3
    entry("png", true, true),
    entry("prores", true, false),        // the encoder is prores_ks
    entry("qtrle", true, true),          // QuickTime Animation (RLE)
    entry("r10k", true, false),          // AJA Kona 10-bit RGB
    entry("r210", true, false),          // Uncompressed RGB 10-bit
    entry("rawvideo", true, false),
    entry("svq1", true, true),           // Sorenson Video 1
    entry("targa", true, true),
    entry("theora", true, false),        // decoder only
    entry("tiff", true, true),
    entry("v210", true, false),          // Uncompressed 4:2:2 10-bit
    entry("v308", true, true),           // Uncompressed packed 4:4:4
    entry("v408", true, true),           // Uncompressed packed QT 4:4:4:4
    entry("v410", true, true),           // Uncompressed 4:4:4 10-bit
    entry("vc2", true, true),            // SMPTE VC-2
    entry("vp8", true, false),           // decoder only
    entry("vp9", true, false),           // decoder only
    // Audio codecs.
    entry("pcm_alaw", true, true),
    entry("pcm_f32be", true, true),
    entry("pcm_f32le", true, true),
    entry("pcm_f64be", true, true),
    entry("pcm_f64le", true, true),
    entry("pcm_mulaw", true, true),
    entry("pcm_s16be", true, true),
    entry("pcm_s16le", true, true),
    entry("pcm_s24be", true, true),
    entry("pcm_s24le", true, true),
    entry("pcm_s32be", true, true),
    entry("pcm_s32le", true, true),
    entry("pcm_s8", true, true),
    entry("pcm_u16be", true, true),
    entry("pcm_u16le", true, true),
    entry("pcm_u24be", true, true),
    entry("pcm_u24le", true, true),
    entry("pcm_u32be", true, true),
    entry("pcm_u32le", true, true),
    entry("pcm_u8", true, true),
];

/// Different library builds suffix codec names with variant or version
/// markers, so a lookup name and a table name match when either is a
/// prefix of the other. The first matching table entry wins.
fn names_match(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

fn lookup(name: &str, table: &'static [FilterEntry]) -> Option<Capability> {
    table
        .iter()
        .find(|e| names_match(name, e.name))
        .map(|e| Capability {
            read: e.read,
            write: e.write,
        })
}

/**
    Look up the capability record for a container format name.
*/
pub fn format_capability(name: &str) -> Option<Capability> {
    lookup(name, FORMAT_WHITELIST)
}

/**
    Look up the capability record for a codec name.
*/
pub fn codec_capability(name: &str) -> Option<Capability> {
    lookup(name, CODEC_WHITELIST)
}

/**
    Look up a codec capability, letting a caller-supplied deny-list veto
    an otherwise-allowed name. Deny-list membership wins over allow-list
    membership.
*/
pub fn codec_capability_with_denylist(name: &str, denylist: &[&str]) -> Option<Capability> {
    let capability = lookup(name, CODEC_WHITELIST)?;
    if denylist.iter().any(|denied| names_match(name, denied)) {
        return None;
    }
    Some(capability)
}

/**
    Returns true if the named container format may be demuxed.
*/
pub fn is_format_readable(name: &str) -> bool {
    format_capability(name).is_some_and(|c| c.read)
}

/**
    Returns true if the named container format may be muxed.
*/
pub fn is_format_writable(name: &str) -> bool {
    format_capability(name).is_some_and(|c| c.write)
}

/**
    Returns true if the named codec may be used for decoding.
*/
pub fn is_codec_readable(name: &str) -> bool {
    codec_capability(name).is_some_and(|c| c.read)
}

/**
    Returns true if the named codec may be used for encoding.
*/
pub fn is_codec_writable(name: &str) -> bool {
    codec_capability(name).is_some_and(|c| c.write)
}

/**
    Returns true if the filename's extension names a still-image format.

    Hosts use this to route still images and image sequences to a
    dedicated reader instead of the video path.
*/
pub fn is_image_extension(filename: &str) -> bool {
    let Some((_, ext)) = filename.rsplit_once('.') else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "bmp" | "cin" | "dpx" | "exr" | "jpeg" | "jpg" | "pix" | "png" | "ppm" | "ptx" | "rgb"
            | "rgba" | "tga" | "tiff" | "webp"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h264_reads_but_does_not_write() {
        assert!(is_codec_readable("h264"));
        assert!(!is_codec_writable("h264"));
    }

    #[test]
    fn mpeg1video_reads_but_does_not_write() {
        assert!(is_codec_readable("mpeg1video"));
        assert!(!is_codec_writable("mpeg1video"));
    }

    #[test]
    fn container_formats() {
        assert!(is_format_readable("mov"));
        assert!(is_format_writable("mov"));
        assert!(is_format_readable("dv"));
        assert!(!is_format_writable("dv"));
        assert!(!is_format_readable("nut"));
    }

    #[test]
    fn version_suffixed_names_match() {
        // A build advertising "prores_ks" still resolves to the prores entry.
        assert!(is_codec_readable("prores_ks"));
        assert!(!is_codec_writable("prores_ks"));
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert_eq!(codec_capability("wmv3"), None);
        assert!(!is_codec_readable("wmv3"));
    }

    #[test]
    fn denylist_wins_over_allowlist() {
        assert!(codec_capability_with_denylist("mjpeg", &[]).is_some());
        assert!(codec_capability_with_denylist("mjpeg", &["mjpeg"]).is_none());
        // Names absent from the allow-list stay rejected regardless.
        assert!(codec_capability_with_denylist("wmv3", &["mjpeg"]).is_none());
    }

    #[test]
    fn image_extensions() {
        assert!(is_image_extension("plate.0001.exr"));
        assert!(is_image_extension("shot.PNG"));
        assert!(!is_image_extension("clip.mov"));
        assert!(!is_image_extension("no_extension"));
    }
}
