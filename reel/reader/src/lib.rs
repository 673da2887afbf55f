/*!
    Deterministic, frame-indexed reading of video elementary streams.

    This crate wraps the FFmpeg demux/decode API to expose a seekable,
    frame-indexed view of a video file: open a container, get an
    authoritative frame count and geometry, then ask for frame N and get
    exactly frame N — with correct seek-and-resync behavior across
    B-frame reordering, open GOPs and decoder flushing.

    # Example

    ```ignore
    use reel_reader::VideoSource;

    let mut source = VideoSource::open("clip.mov")?;
    let info = source.info().expect("no usable video stream");

    let mut buffer = vec![0u8; source.buffer_len()];
    for frame in 1..=info.frame_count {
        source.decode(frame, false, &mut buffer)?;
        // Hand the packed RGB(A) buffer to the host.
    }
    ```

    # Sharing open sources

    Hosts that reference the same file from several logical readers
    should go through [`SourceCache`], which reuses open handles per
    owner and transparently replaces handles that have gone invalid:

    ```ignore
    use reel_reader::{OwnerId, SourceCache};

    let cache = SourceCache::new();
    let source = cache.get_or_create(OwnerId(instance_id), "clip.mov")?;
    source.lock().decode(1, false, &mut buffer)?;
    ```

    # Policy

    The linked library advertises far more codecs and containers than
    are trustworthy; the policy tables ([`is_codec_readable`] and
    friends) pin down which are usable for reading and writing, and
    [`CapabilityCatalog`] intersects them with what the linked build
    actually provides.
*/

mod cache;
mod catalog;
mod convert;
mod decode;
mod duration;
mod policy;
mod source;
mod stream;

pub use cache::{OwnerId, SourceCache, SourceHandle};
pub use catalog::CapabilityCatalog;
pub use convert::ColorMatrix;
pub use policy::{
    Capability, codec_capability, codec_capability_with_denylist, format_capability,
    is_codec_readable, is_codec_writable, is_format_readable, is_format_writable,
    is_image_extension,
};
pub use source::{VideoInfo, VideoSource};
pub use stream::VideoStream;

pub use reel_types::{Error, MediaDuration, Pts, Rational, Result, Timebase};
