//! # SAIL
//!
//! A uniform facade over format-specific image codecs.
//!
//! Callers read and write images without linking against any specific
//! codec: the process-wide [`Registry`] resolves a codec by file
//! extension, MIME type, or magic bytes, and a session decodes or
//! encodes frames one at a time through the codec's uniform interface.
//!
//! ## Quick start
//!
//! ```no_run
//! fn main() -> sail::Result<()> {
//!     // One-shot: decode the first frame.
//!     let image = sail::read_path("photo.bmp")?;
//!     println!("{}x{} {}", image.width(), image.height(), image.pixel_format());
//!
//!     // Probe without decoding pixels.
//!     let (header, codec) = sail::probe_path("photo.bmp")?;
//!     println!("{} says {}x{}", codec.metadata().description, header.width, header.height);
//!
//!     // Frame-at-a-time session for animations.
//!     let mut input = sail::ImageInput::new();
//!     input.start_path("animation.gif")?;
//!     loop {
//!         match input.next_frame() {
//!             Ok(frame) => println!("frame, {} ms", frame.delay_ms()),
//!             Err(err) if err.is_no_more_frames() => break,
//!             Err(err) => return Err(err),
//!         }
//!     }
//!     input.stop()
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several crates:
//! - `sail-core`: errors, pixel formats, the image model, I/O streams
//! - `sail-codecs`: codec traits, capability descriptors, built-in codecs
//! - `sail-plugin`: metadata files, discovery, the codec registry
//!
//! This crate re-exports the common types and adds the session state
//! machines and the one-shot API.

#![warn(missing_docs)]

mod input;
mod oneshot;
mod output;

// Re-export core types
pub use sail_core::{
    Compression, Error, IccProfile, Image, ImageHeader, IoStream, MemReader, MemWriter,
    MetaEntry, Palette, PixelFormat, Result, SeekFrom,
};

// Re-export codec traits and descriptors
pub use sail_codecs::{
    Codec, CodecDescriptor, CompressionLevel, Decoder, Encoder, FeatureFlags,
    ImageProperties, ReadFeatures, ReadOptions, WriteFeatures, WriteOptions,
};

// Re-export registry types
pub use sail_plugin::{CodecMetadata, CodecRecord, Registry, CODECS_PATH_ENV};

pub use input::ImageInput;
pub use oneshot::{
    probe_io, probe_mem, probe_path, read_io, read_mem, read_mem_with, read_path,
    read_path_with, write_mem, write_mem_into, write_mem_with, write_path, write_path_with,
};
pub use output::ImageOutput;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string.
pub fn version() -> &'static str {
    VERSION
}

/// Drop every cached codec instance in the process-wide registry without
/// invalidating metadata. No session may be active while unloading; the
/// next session transparently rebinds.
pub fn unload_plugins() {
    Registry::global().unload_plugins();
}
