//! # sail-plugin
//!
//! Codec discovery and the process-wide registry for the SAIL image
//! abstraction layer.
//!
//! Codecs are described by small metadata files sited next to their
//! plugin binaries. This crate parses those files, searches the
//! configured directories (plus `SAIL_CODECS_PATH`), and builds an
//! ordered catalog searchable by extension, MIME type, path, or content.

#![warn(missing_docs)]

mod loader;
mod metadata;
mod registry;

pub use loader::{
    default_search_paths, plugin_path_for, CodecLoader, CODECS_PATH_ENV, METADATA_SUFFIX,
};
pub use metadata::{
    layout_supported, parse_metadata, read_metadata, CodecMetadata, CODEC_LAYOUT_CURRENT,
    CODEC_LAYOUT_MIN,
};
pub use registry::{CodecRecord, Registry};
