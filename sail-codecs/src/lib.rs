//! # sail-codecs
//!
//! Codec traits and built-in codecs for the SAIL image abstraction layer.
//!
//! Every codec implements the [`Codec`] trait: a probe plus decoder and
//! encoder constructors, with capabilities advertised through
//! [`ReadFeatures`] and [`WriteFeatures`]. The built-in codecs (PNM, BMP,
//! GIF) are statically linked; external codecs are discovered through
//! metadata files by the registry crate.

#![warn(missing_docs)]

mod bmp;
mod features;
mod gif;
mod options;
mod pnm;
mod traits;

pub use bmp::BmpCodec;
pub use features::{
    CompressionLevel, FeatureFlags, ImageProperties, ReadFeatures, WriteFeatures,
};
pub use gif::GifCodec;
pub use options::{ReadOptions, WriteOptions};
pub use pnm::PnmCodec;
pub use traits::{Codec, CodecDescriptor, Decoder, Encoder};

/// Codecs compiled into this build, in registration order.
pub fn builtin_codecs() -> Vec<std::sync::Arc<dyn Codec>> {
    vec![
        std::sync::Arc::new(PnmCodec::new()),
        std::sync::Arc::new(BmpCodec::new()),
        std::sync::Arc::new(GifCodec::new()),
    ]
}
