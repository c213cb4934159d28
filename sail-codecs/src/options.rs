//! Session options derived from codec feature descriptors.

use sail_core::{Compression, Error, PixelFormat, Result};

use crate::features::{ReadFeatures, WriteFeatures};

/// Options for one decoding session.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Requested output pixel format. `Unknown` keeps the source format.
    pub output_pixel_format: PixelFormat,
    /// Surface textual metadata entries.
    pub meta_info: bool,
    /// Surface embedded ICC profiles.
    pub icc_profile: bool,
}

impl ReadOptions {
    /// Derive defaults from a codec's read features: the codec's default
    /// output format, with metadata and ICC enabled iff advertised.
    pub fn from_features(features: &ReadFeatures) -> Self {
        Self {
            output_pixel_format: features.default_output_pixel_format,
            meta_info: features
                .features
                .contains(crate::features::FeatureFlags::META_INFO),
            icc_profile: features
                .features
                .contains(crate::features::FeatureFlags::ICC_PROFILE),
        }
    }

    /// Request a specific output pixel format.
    #[must_use]
    pub fn with_output_pixel_format(mut self, format: PixelFormat) -> Self {
        self.output_pixel_format = format;
        self
    }

    /// Enable or disable metadata extraction.
    #[must_use]
    pub fn with_meta_info(mut self, enabled: bool) -> Self {
        self.meta_info = enabled;
        self
    }

    /// Enable or disable ICC profile extraction.
    #[must_use]
    pub fn with_icc_profile(mut self, enabled: bool) -> Self {
        self.icc_profile = enabled;
        self
    }

    /// Validate against the codec's read features. Fails without side
    /// effects if the requested output format is not advertised.
    pub fn validate(&self, features: &ReadFeatures) -> Result<()> {
        if self.output_pixel_format != PixelFormat::Unknown
            && !features
                .output_pixel_formats
                .contains(&self.output_pixel_format)
        {
            return Err(Error::UnsupportedPixelFormat(self.output_pixel_format));
        }
        Ok(())
    }
}

/// Options for one encoding session.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Compression kind to use.
    pub compression: Compression,
    /// Compression level, ignored when the codec's tuning is disabled.
    pub compression_level: i32,
    /// Write textual metadata entries.
    pub meta_info: bool,
    /// Write embedded ICC profiles.
    pub icc_profile: bool,
}

impl WriteOptions {
    /// Derive defaults from a codec's write features.
    pub fn from_features(features: &WriteFeatures) -> Self {
        Self {
            compression: features.default_compression,
            compression_level: features.compression_level.default,
            meta_info: features
                .features
                .contains(crate::features::FeatureFlags::META_INFO),
            icc_profile: features
                .features
                .contains(crate::features::FeatureFlags::ICC_PROFILE),
        }
    }

    /// Select a compression kind.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Select a compression level.
    #[must_use]
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Enable or disable metadata writing.
    #[must_use]
    pub fn with_meta_info(mut self, enabled: bool) -> Self {
        self.meta_info = enabled;
        self
    }

    /// Enable or disable ICC profile writing.
    #[must_use]
    pub fn with_icc_profile(mut self, enabled: bool) -> Self {
        self.icc_profile = enabled;
        self
    }

    /// Validate against the codec's write features. The compression must
    /// be advertised; the level must lie in `[min, max]` when tuning is
    /// enabled and is ignored otherwise.
    pub fn validate(&self, features: &WriteFeatures) -> Result<()> {
        if !features.compressions.contains(&self.compression) {
            return Err(Error::UnsupportedCompression(self.compression));
        }

        let level = features.compression_level;
        if level.is_tunable()
            && (self.compression_level < level.min || self.compression_level > level.max)
        {
            return Err(Error::invalid_argument(format!(
                "compression level {} outside [{}, {}]",
                self.compression_level, level.min, level.max
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{CompressionLevel, FeatureFlags};

    fn read_features() -> ReadFeatures {
        ReadFeatures {
            input_pixel_formats: vec![PixelFormat::Rgb24],
            output_pixel_formats: vec![PixelFormat::Rgb24, PixelFormat::Rgba32],
            default_output_pixel_format: PixelFormat::Unknown,
            features: FeatureFlags::STATIC | FeatureFlags::META_INFO,
        }
    }

    fn write_features() -> WriteFeatures {
        WriteFeatures {
            output_pixel_formats: vec![PixelFormat::Rgb24],
            features: FeatureFlags::STATIC,
            properties: Default::default(),
            compressions: vec![Compression::None, Compression::Rle],
            default_compression: Compression::None,
            compression_level: CompressionLevel {
                min: 1,
                max: 9,
                default: 6,
                step: 1,
            },
        }
    }

    #[test]
    fn test_read_defaults_follow_features() {
        let options = ReadOptions::from_features(&read_features());
        assert_eq!(options.output_pixel_format, PixelFormat::Unknown);
        assert!(options.meta_info);
        assert!(!options.icc_profile);
    }

    #[test]
    fn test_read_validation() {
        let features = read_features();

        let ok = ReadOptions::from_features(&features)
            .with_output_pixel_format(PixelFormat::Rgba32);
        assert!(ok.validate(&features).is_ok());

        let bad = ReadOptions::from_features(&features)
            .with_output_pixel_format(PixelFormat::Yuv24);
        assert_eq!(
            bad.validate(&features),
            Err(Error::UnsupportedPixelFormat(PixelFormat::Yuv24))
        );
    }

    #[test]
    fn test_write_validation() {
        let features = write_features();

        let ok = WriteOptions::from_features(&features);
        assert!(ok.validate(&features).is_ok());

        let bad_compression =
            WriteOptions::from_features(&features).with_compression(Compression::Jpeg);
        assert_eq!(
            bad_compression.validate(&features),
            Err(Error::UnsupportedCompression(Compression::Jpeg))
        );

        let bad_level = WriteOptions::from_features(&features).with_compression_level(12);
        assert!(matches!(
            bad_level.validate(&features),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_level_ignored_when_tuning_disabled() {
        let mut features = write_features();
        features.compression_level = CompressionLevel::DISABLED;

        let options = WriteOptions::from_features(&features).with_compression_level(99);
        assert!(options.validate(&features).is_ok());
    }
}
