//! Codec metadata records and their file format.
//!
//! A metadata file is a line-oriented key=value document describing one
//! codec. The `layout` key must come first; it selects the key schema and
//! the plugin ABI the sibling binary conforms to.

use std::path::Path;

use serde::{Deserialize, Serialize};

use sail_core::{Error, Result};

/// Oldest metadata layout this build understands.
pub const CODEC_LAYOUT_MIN: u32 = 1;
/// Newest metadata layout this build understands.
pub const CODEC_LAYOUT_CURRENT: u32 = 2;

/// Whether this build understands a metadata layout version.
pub fn layout_supported(layout: u32) -> bool {
    (CODEC_LAYOUT_MIN..=CODEC_LAYOUT_CURRENT).contains(&layout)
}

/// Parsed description of one codec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecMetadata {
    /// Metadata layout version.
    pub layout: u32,
    /// Codec version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Lowercase file extensions without the leading dot, source order.
    pub extensions: Vec<String>,
    /// Lowercase MIME types, source order.
    pub mime_types: Vec<String>,
}

/// Split a semicolon-separated list: empty tokens are skipped, the rest
/// are trimmed and lowercased, source order preserved.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Parse metadata file contents.
///
/// The `layout` key must be the first key; unknown keys and unknown
/// layout versions reject the whole file.
pub fn parse_metadata(text: &str) -> Result<CodecMetadata> {
    let mut metadata = CodecMetadata::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        // Section headers carry no information; the file has one codec.
        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::FileParseError {
                line: line_number,
                message: format!("expected key=value, got '{line}'"),
            });
        };
        let key = key.trim();
        let value = value.trim();

        if key == "layout" {
            metadata.layout = match value.parse::<u32>() {
                Ok(layout) if layout >= CODEC_LAYOUT_MIN => layout,
                _ => {
                    return Err(Error::FileParseError {
                        line: line_number,
                        message: format!("bad layout version '{value}'"),
                    })
                }
            };
            continue;
        }

        if metadata.layout == 0 {
            return Err(Error::FileParseError {
                line: line_number,
                message: "the layout version must be the first key".into(),
            });
        }
        if !layout_supported(metadata.layout) {
            return Err(Error::UnsupportedPluginLayout(metadata.layout));
        }

        match key {
            "version" => metadata.version = value.to_string(),
            "description" => metadata.description = value.to_string(),
            "extensions" => metadata.extensions = split_list(value),
            "mime-types" => metadata.mime_types = split_list(value),
            unknown => {
                return Err(Error::FileParseError {
                    line: line_number,
                    message: format!("unknown key '{unknown}'"),
                })
            }
        }
    }

    if metadata.layout == 0 {
        return Err(Error::FileParseError {
            line: 1,
            message: "missing layout version key".into(),
        });
    }
    if !layout_supported(metadata.layout) {
        return Err(Error::UnsupportedPluginLayout(metadata.layout));
    }

    Ok(metadata)
}

/// Read and parse a metadata file from disk.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<CodecMetadata> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::FileOpenError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    parse_metadata(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_file() {
        let text = "layout=1\nversion=1.0\ndescription=X\n\
                    extensions=jpg;jpeg\nmime-types=image/jpeg";
        let metadata = parse_metadata(text).unwrap();

        assert_eq!(metadata.layout, 1);
        assert_eq!(metadata.version, "1.0");
        assert_eq!(metadata.description, "X");
        assert_eq!(metadata.extensions, vec!["jpg", "jpeg"]);
        assert_eq!(metadata.mime_types, vec!["image/jpeg"]);
    }

    #[test]
    fn test_layout_must_be_first() {
        let err = parse_metadata("version=1.0\nlayout=1").unwrap_err();
        assert!(matches!(err, Error::FileParseError { line: 1, .. }));
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let err = parse_metadata("layout=999\ndescription=X").unwrap_err();
        assert_eq!(err, Error::UnsupportedPluginLayout(999));

        let err = parse_metadata("layout=999").unwrap_err();
        assert_eq!(err, Error::UnsupportedPluginLayout(999));
    }

    #[test]
    fn test_bad_layout_value_rejected() {
        assert!(matches!(
            parse_metadata("layout=0"),
            Err(Error::FileParseError { .. })
        ));
        assert!(matches!(
            parse_metadata("layout=banana"),
            Err(Error::FileParseError { .. })
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse_metadata("layout=1\ncolor-depth=8").unwrap_err();
        assert!(matches!(err, Error::FileParseError { line: 2, .. }));
    }

    #[test]
    fn test_list_splitting_skips_empty_tokens() {
        let metadata =
            parse_metadata("layout=2\nextensions=;;JPG; jpeg ;;\nmime-types=IMAGE/JPEG")
                .unwrap();
        assert_eq!(metadata.extensions, vec!["jpg", "jpeg"]);
        assert_eq!(metadata.mime_types, vec!["image/jpeg"]);
    }

    #[test]
    fn test_sections_and_comments_ignored() {
        let text = "; generated file\n[codec]\nlayout=1\n# note\ndescription=GIF codec";
        let metadata = parse_metadata(text).unwrap();
        assert_eq!(metadata.description, "GIF codec");
    }

    #[test]
    fn test_missing_layout_rejected() {
        assert!(matches!(
            parse_metadata(""),
            Err(Error::FileParseError { .. })
        ));
        assert!(matches!(
            parse_metadata("; only a comment"),
            Err(Error::FileParseError { .. })
        ));
    }

    #[test]
    fn test_read_metadata_missing_file() {
        let err = read_metadata("/no/such/codec.info").unwrap_err();
        assert!(matches!(err, Error::FileOpenError { .. }));
    }
}
