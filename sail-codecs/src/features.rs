//! Per-codec capability descriptors.
//!
//! A codec advertises what it can read and write; sessions validate
//! caller options against these descriptors before the codec sees them.

use std::ops::BitOr;

use sail_core::{Compression, PixelFormat};

/// OR-mask of codec capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags(u32);

impl FeatureFlags {
    /// Still images.
    pub const STATIC: Self = FeatureFlags(1 << 0);
    /// Multi-frame animations.
    pub const ANIMATED: Self = FeatureFlags(1 << 1);
    /// Multi-page documents.
    pub const MULTI_PAGED: Self = FeatureFlags(1 << 2);
    /// Textual metadata entries.
    pub const META_INFO: Self = FeatureFlags(1 << 3);
    /// Interlaced row storage.
    pub const INTERLACED: Self = FeatureFlags(1 << 4);
    /// Embedded ICC profiles.
    pub const ICC_PROFILE: Self = FeatureFlags(1 << 5);

    /// No capabilities.
    pub const fn empty() -> Self {
        FeatureFlags(0)
    }

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FeatureFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        FeatureFlags(self.0 | rhs.0)
    }
}

/// OR-mask of properties the codec requires of input images when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageProperties(u32);

impl ImageProperties {
    /// Input rows must be supplied bottom-up.
    pub const FLIPPED_VERTICALLY: Self = ImageProperties(1 << 0);

    /// No required properties.
    pub const fn empty() -> Self {
        ImageProperties(0)
    }

    /// Whether every property in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ImageProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ImageProperties(self.0 | rhs.0)
    }
}

/// Compression level range advertised by an encoder.
///
/// The all-zero tuple means tuning is disabled. A range with
/// `min == max != 0` keeps tuning enabled with a single legal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionLevel {
    /// Lowest accepted level.
    pub min: i32,
    /// Highest accepted level.
    pub max: i32,
    /// Level used when the caller does not choose one.
    pub default: i32,
    /// Suggested increment between levels.
    pub step: i32,
}

impl CompressionLevel {
    /// Disabled tuning: every field zero.
    pub const DISABLED: Self = CompressionLevel {
        min: 0,
        max: 0,
        default: 0,
        step: 0,
    };

    /// Whether the encoder accepts a level at all.
    pub fn is_tunable(&self) -> bool {
        *self != Self::DISABLED
    }
}

/// What a codec can produce when decoding.
#[derive(Debug, Clone, Default)]
pub struct ReadFeatures {
    /// Pixel formats the codec natively decodes from files.
    pub input_pixel_formats: Vec<PixelFormat>,
    /// Pixel formats a caller may request as decode output.
    pub output_pixel_formats: Vec<PixelFormat>,
    /// Output format used when the caller does not choose one.
    /// `Unknown` means "whatever the source natively stores".
    pub default_output_pixel_format: PixelFormat,
    /// Capability mask.
    pub features: FeatureFlags,
}

/// What a codec accepts when encoding.
#[derive(Debug, Clone, Default)]
pub struct WriteFeatures {
    /// Pixel formats the codec accepts as encode input.
    pub output_pixel_formats: Vec<PixelFormat>,
    /// Capability mask.
    pub features: FeatureFlags,
    /// Properties required of input images.
    pub properties: ImageProperties,
    /// Compression kinds the encoder supports.
    pub compressions: Vec<Compression>,
    /// Compression used when the caller does not choose one.
    pub default_compression: Compression,
    /// Compression level range.
    pub compression_level: CompressionLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_flags_mask() {
        let flags = FeatureFlags::STATIC | FeatureFlags::META_INFO;
        assert!(flags.contains(FeatureFlags::STATIC));
        assert!(flags.contains(FeatureFlags::META_INFO));
        assert!(!flags.contains(FeatureFlags::ANIMATED));
        assert!(flags.contains(FeatureFlags::empty()));
    }

    #[test]
    fn test_compression_level_tunable() {
        assert!(!CompressionLevel::DISABLED.is_tunable());

        let pinned = CompressionLevel {
            min: 6,
            max: 6,
            default: 6,
            step: 0,
        };
        assert!(pinned.is_tunable());
    }
}
