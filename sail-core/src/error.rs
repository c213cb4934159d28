//! Error types shared by every SAIL component.
//!
//! The taxonomy is a closed set: every failure a codec, stream, or session
//! can report maps to exactly one kind here. Each kind has a stable
//! SCREAMING_SNAKE name used in logs and a numeric code that is stable
//! across patch releases within a major version.

use thiserror::Error;

use crate::compression::Compression;
use crate::pixel::PixelFormat;

/// Unified error type for all SAIL operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied value failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An I/O object is missing a required operation or was used in the
    /// wrong direction (e.g. writing to a read-only stream).
    #[error("invalid I/O object: {0}")]
    InvalidIo(String),

    /// A pixel format is not supported by the selected codec.
    #[error("unsupported pixel format {0}")]
    UnsupportedPixelFormat(PixelFormat),

    /// A compression kind is not supported by the selected codec.
    #[error("unsupported compression {0}")]
    UnsupportedCompression(Compression),

    /// Image dimensions are zero or otherwise unusable.
    #[error("incorrect image dimensions {width}x{height}")]
    IncorrectImageDimensions { width: u32, height: u32 },

    /// An allocation request could not be satisfied.
    #[error("memory allocation of {0} bytes failed")]
    MemoryAllocationFailed(usize),

    /// A file could not be opened.
    #[error("failed to open '{path}': {message}")]
    FileOpenError { path: String, message: String },

    /// A file could not be closed or flushed on teardown.
    #[error("failed to close file: {0}")]
    FileCloseError(String),

    /// A configuration or metadata file failed to parse.
    #[error("parse error at line {line}: {message}")]
    FileParseError { line: usize, message: String },

    /// No codec matched the requested extension, MIME type, or magic.
    #[error("no codec found for '{0}'")]
    PluginNotFound(String),

    /// A codec plugin binary could not be loaded.
    #[error("failed to load codec plugin '{0}'")]
    PluginLoadError(String),

    /// A required entry point is missing from a codec plugin.
    #[error("failed to resolve symbol '{symbol}' in '{path}'")]
    PluginSymbolResolveError { path: String, symbol: String },

    /// A codec metadata file declares a layout version this build does not
    /// understand.
    #[error("unsupported codec layout version {0}")]
    UnsupportedPluginLayout(u32),

    /// A session operation was started while another is in progress.
    #[error("another operation is already in progress")]
    ConflictingOperation,

    /// A session operation was invoked without a started session.
    #[error("operation requires a started session")]
    StateNull,

    /// The requested operation exists in the API but has no implementation.
    #[error("not yet implemented")]
    NotYetImplemented,

    /// The end of a stream was reached where more data was required.
    #[error("end of file")]
    EndOfFile,

    /// A multi-frame source has no further frames to decode.
    #[error("no more frames")]
    NoMoreFrames,

    /// A stream operation was interrupted by the caller.
    #[error("I/O interrupted")]
    InterruptedIo,

    /// Fewer bytes were read than the operation required.
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    /// Fewer bytes were written than the operation required.
    #[error("short write: wanted {wanted} bytes, wrote {wrote}")]
    ShortWrite { wanted: usize, wrote: usize },

    /// Image data is structurally invalid.
    #[error("corrupted image: {0}")]
    CorruptedImage(String),

    /// Image data ends before the declared payload is complete.
    #[error("truncated image: expected {expected} bytes, got {actual}")]
    TruncatedImage { expected: usize, actual: usize },

    /// The file uses a format feature the codec does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl Error {
    /// Stable name of this error kind, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::InvalidIo(_) => "INVALID_IO",
            Error::UnsupportedPixelFormat(_) => "UNSUPPORTED_PIXEL_FORMAT",
            Error::UnsupportedCompression(_) => "UNSUPPORTED_COMPRESSION",
            Error::IncorrectImageDimensions { .. } => "INCORRECT_IMAGE_DIMENSIONS",
            Error::MemoryAllocationFailed(_) => "MEMORY_ALLOCATION_FAILED",
            Error::FileOpenError { .. } => "FILE_OPEN_ERROR",
            Error::FileCloseError(_) => "FILE_CLOSE_ERROR",
            Error::FileParseError { .. } => "FILE_PARSE_ERROR",
            Error::PluginNotFound(_) => "PLUGIN_NOT_FOUND",
            Error::PluginLoadError(_) => "PLUGIN_LOAD_ERROR",
            Error::PluginSymbolResolveError { .. } => "PLUGIN_SYMBOL_RESOLVE_ERROR",
            Error::UnsupportedPluginLayout(_) => "UNSUPPORTED_PLUGIN_LAYOUT",
            Error::ConflictingOperation => "CONFLICTING_OPERATION",
            Error::StateNull => "STATE_NULL",
            Error::NotYetImplemented => "NOT_YET_IMPLEMENTED",
            Error::EndOfFile => "END_OF_FILE",
            Error::NoMoreFrames => "NO_MORE_FRAMES",
            Error::InterruptedIo => "INTERRUPTED_IO",
            Error::ShortRead { .. } => "SHORT_READ",
            Error::ShortWrite { .. } => "SHORT_WRITE",
            Error::CorruptedImage(_) => "CORRUPTED_IMAGE",
            Error::TruncatedImage { .. } => "TRUNCATED_IMAGE",
            Error::UnsupportedFeature(_) => "UNSUPPORTED_FEATURE",
        }
    }

    /// Stable numeric code, grouped by category: argument errors in the
    /// 10s, resource errors in the 20s, state machine errors in the 30s,
    /// stream errors in the 40s, decode/encode errors in the 50s.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidArgument(_) => 10,
            Error::InvalidIo(_) => 11,
            Error::UnsupportedPixelFormat(_) => 12,
            Error::UnsupportedCompression(_) => 13,
            Error::IncorrectImageDimensions { .. } => 14,
            Error::MemoryAllocationFailed(_) => 20,
            Error::FileOpenError { .. } => 21,
            Error::FileCloseError(_) => 22,
            Error::FileParseError { .. } => 23,
            Error::PluginNotFound(_) => 24,
            Error::PluginLoadError(_) => 25,
            Error::PluginSymbolResolveError { .. } => 26,
            Error::UnsupportedPluginLayout(_) => 27,
            Error::ConflictingOperation => 30,
            Error::StateNull => 31,
            Error::NotYetImplemented => 32,
            Error::EndOfFile => 40,
            Error::NoMoreFrames => 41,
            Error::InterruptedIo => 42,
            Error::ShortRead { .. } => 43,
            Error::ShortWrite { .. } => 44,
            Error::CorruptedImage(_) => 50,
            Error::TruncatedImage { .. } => 51,
            Error::UnsupportedFeature(_) => 52,
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Check if this is the end-of-frames marker of a multi-frame source.
    #[must_use]
    pub fn is_no_more_frames(&self) -> bool {
        matches!(self, Error::NoMoreFrames)
    }

    /// Check if this is an end-of-file condition.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::EndOfFile)
    }
}

/// Result type alias using the SAIL error type.
pub type Result<T> = std::result::Result<T, Error>;
