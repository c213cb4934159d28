//! Codec traits: the fixed entry-point set every codec implements.
//!
//! A codec never owns the I/O stream; the session passes it to every call
//! and retains ownership. Codec state must not hold on to caller pixel
//! buffers after a call returns.

use sail_core::{Image, ImageHeader, IoStream, Result};

use crate::features::{ReadFeatures, WriteFeatures};
use crate::options::{ReadOptions, WriteOptions};

/// Static description of one codec: naming, matching, capabilities.
#[derive(Debug, Clone)]
pub struct CodecDescriptor {
    /// Short machine name, e.g. "gif".
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Codec version string.
    pub version: &'static str,
    /// Lowercase file extensions, without the leading dot.
    pub extensions: &'static [&'static str],
    /// MIME types.
    pub mime_types: &'static [&'static str],
    /// Decode capabilities.
    pub read_features: ReadFeatures,
    /// Encode capabilities.
    pub write_features: WriteFeatures,
}

/// One image codec: a decoder/encoder pair behind a uniform interface.
pub trait Codec: Send + Sync {
    /// Describe this codec's naming and capabilities.
    fn describe(&self) -> CodecDescriptor;

    /// Non-destructive sniff: parse the first frame header if the stream
    /// looks like this codec's format, else return `None`. The stream
    /// position is restored before returning.
    fn probe(&self, io: &mut dyn IoStream) -> Result<Option<ImageHeader>>;

    /// Prepare a decoding context. The stream is positioned at the start
    /// of the file.
    fn read_init(&self, io: &mut dyn IoStream, options: &ReadOptions) -> Result<Box<dyn Decoder>>;

    /// Prepare an encoding context. The stream is positioned at the start
    /// of the output.
    fn write_init(&self, io: &mut dyn IoStream, options: &WriteOptions)
        -> Result<Box<dyn Encoder>>;
}

/// Decoding context for one session.
pub trait Decoder: Send {
    /// Advance to the next frame and return its header. Returns
    /// [`sail_core::Error::NoMoreFrames`] after the last frame.
    fn seek_next_frame(&mut self, io: &mut dyn IoStream) -> Result<ImageHeader>;

    /// Decode the current frame into `image`. The image is allocated by
    /// the caller from the header returned by [`Decoder::seek_next_frame`].
    fn read_frame(&mut self, io: &mut dyn IoStream, image: &mut Image) -> Result<()>;

    /// Release the decoding context.
    fn finish(&mut self, io: &mut dyn IoStream) -> Result<()>;
}

/// Encoding context for one session.
pub trait Encoder: Send {
    /// Prepare the container for the next frame described by `image`.
    fn seek_next_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()>;

    /// Encode `image` as the current frame.
    fn write_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()>;

    /// Finalize the container and release the encoding context.
    fn finish(&mut self, io: &mut dyn IoStream) -> Result<()>;
}
