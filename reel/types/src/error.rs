/*!
    Error types for the reel crate family.
*/

use std::fmt;

/**
    Error type for the reel crate family.

    Open-time fatal conditions (`Open`, `NoVideoStream`,
    `UnsupportedCodec`) describe a source that can never decode anything.
    `Codec` and `Seek` are per-call internal failures — a later call
    against the same source may still succeed. `MissingFrame` is a caller
    contract violation (a frame outside the valid range requested without
    clamping), deliberately distinct from `DecodeFailed`, which means the
    demuxer and decoder were exhausted without producing the frame.
*/
#[derive(Debug)]
pub enum Error {
    /// I/O error (file not found, permissions, etc.)
    Io(std::io::Error),
    /// Container could not be opened or probed.
    Open { message: String },
    /// The container holds no stream the library can decode.
    NoVideoStream,
    /// Video streams exist but every one was rejected by policy.
    UnsupportedCodec,
    /// Codec error (decode failure, conversion failure).
    Codec { message: String },
    /// Seek failure reported by the demuxer.
    Seek { message: String },
    /// Requested frame number outside the valid range.
    MissingFrame { frame: i64 },
    /// No picture could be produced for the frame, retries included.
    DecodeFailed { frame: i64 },
    /// Invalid data (malformed input, undersized buffer).
    InvalidData { message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Open { message } => write!(f, "failed to open container: {message}"),
            Self::NoVideoStream => write!(f, "unable to find video stream"),
            Self::UnsupportedCodec => write!(f, "unsupported codec"),
            Self::Codec { message } => write!(f, "codec error: {message}"),
            Self::Seek { message } => write!(f, "seek error: {message}"),
            Self::MissingFrame { frame } => write!(f, "missing frame {frame}"),
            Self::DecodeFailed { frame } => write!(f, "failed to decode frame {frame}"),
            Self::InvalidData { message } => write!(f, "invalid data: {message}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl Error {
    /**
        Create an open error with the given message.
    */
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }

    /**
        Create a codec error with the given message.
    */
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /**
        Create a seek error with the given message.
    */
    pub fn seek(message: impl Into<String>) -> Self {
        Self::Seek {
            message: message.into(),
        }
    }

    /**
        Create an invalid data error with the given message.
    */
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /**
        Returns true if this is a missing-frame (caller contract) error.
    */
    pub fn is_missing_frame(&self) -> bool {
        matches!(self, Self::MissingFrame { .. })
    }

    /**
        Returns true if this error marks a source as permanently unusable.
    */
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::NoVideoStream | Self::UnsupportedCodec
        )
    }
}

/**
    Result type alias for the reel crate family.
*/
pub type Result<T> = std::result::Result<T, Error>;

static_assertions::assert_impl_all!(Error: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn error_display() {
        let e = Error::open("probe failed");
        assert_eq!(format!("{e}"), "failed to open container: probe failed");

        let e = Error::codec("send_packet failed");
        assert_eq!(format!("{e}"), "codec error: send_packet failed");

        let e = Error::MissingFrame { frame: 11 };
        assert_eq!(format!("{e}"), "missing frame 11");

        let e = Error::DecodeFailed { frame: 3 };
        assert_eq!(format!("{e}"), "failed to decode frame 3");

        assert_eq!(format!("{}", Error::NoVideoStream), "unable to find video stream");
        assert_eq!(format!("{}", Error::UnsupportedCodec), "unsupported codec");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(StdError::source(&e).is_some());
    }

    #[test]
    fn missing_frame_is_distinct_from_decode_failure() {
        assert!(Error::MissingFrame { frame: 1 }.is_missing_frame());
        assert!(!Error::DecodeFailed { frame: 1 }.is_missing_frame());
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::NoVideoStream.is_fatal());
        assert!(Error::UnsupportedCodec.is_fatal());
        assert!(Error::open("x").is_fatal());
        assert!(!Error::codec("x").is_fatal());
        assert!(!Error::seek("x").is_fatal());
        assert!(!Error::MissingFrame { frame: 1 }.is_fatal());
    }
}
