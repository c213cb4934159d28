//! # sail-core
//!
//! Core types for the SAIL image codec abstraction layer.
//!
//! This crate provides the building blocks shared by every SAIL component:
//! - Unified error taxonomy with stable names and codes
//! - The closed pixel format and compression catalogs
//! - The image model: frame headers, pixel buffers, palettes, metadata
//! - The I/O stream abstraction over files, memory, and custom streams

#![warn(missing_docs)]

pub mod compression;
pub mod error;
pub mod image;
pub mod io;
pub mod pixel;

pub use compression::Compression;
pub use error::{Error, Result};
pub use image::{IccProfile, Image, ImageHeader, MetaEntry, Palette};
pub use io::{FileStream, IoStream, MemReader, MemWriter, SeekFrom};
pub use pixel::PixelFormat;
