//! Compression kinds known to any codec.

use std::fmt;

/// Compression method. A codec advertises the subset it supports in its
/// write features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    /// Sentinel for unrecognized compression names.
    #[default]
    Unknown,
    /// No compression.
    None,
    /// Run-length encoding.
    Rle,
    /// LZW (GIF, TIFF).
    Lzw,
    /// DEFLATE (PNG, TIFF).
    Deflate,
    /// JPEG DCT coding.
    Jpeg,
    /// PackBits (TIFF).
    PackBits,
    /// CCITT Group 3 fax.
    CcittFax3,
    /// CCITT Group 4 fax.
    CcittFax4,
}

impl Compression {
    /// Every compression kind, including the sentinel.
    pub const ALL: [Compression; 9] = [
        Compression::Unknown,
        Compression::None,
        Compression::Rle,
        Compression::Lzw,
        Compression::Deflate,
        Compression::Jpeg,
        Compression::PackBits,
        Compression::CcittFax3,
        Compression::CcittFax4,
    ];

    /// Canonical name of this compression kind.
    pub fn name(self) -> &'static str {
        match self {
            Compression::Unknown => "UNKNOWN",
            Compression::None => "NONE",
            Compression::Rle => "RLE",
            Compression::Lzw => "LZW",
            Compression::Deflate => "DEFLATE",
            Compression::Jpeg => "JPEG",
            Compression::PackBits => "PACKBITS",
            Compression::CcittFax3 => "CCITT-FAX3",
            Compression::CcittFax4 => "CCITT-FAX4",
        }
    }

    /// Parse a canonical name. Any non-matching string yields
    /// [`Compression::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "NONE" => Compression::None,
            "RLE" => Compression::Rle,
            "LZW" => Compression::Lzw,
            "DEFLATE" => Compression::Deflate,
            "JPEG" => Compression::Jpeg,
            "PACKBITS" => Compression::PackBits,
            "CCITT-FAX3" => Compression::CcittFax3,
            "CCITT-FAX4" => Compression::CcittFax4,
            _ => Compression::Unknown,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
