//! GIF codec: GIF87a and GIF89a.
//!
//! Supports LZW compression, global and local color tables, interlaced
//! images, multi-frame animations with per-frame delays, and comment
//! extensions surfaced as metadata. Frames are decoded one at a time as
//! the session advances; by default they are composited onto an RGBA
//! canvas, or the raw indexed data can be requested instead.

mod decoder;
mod encoder;

use sail_core::{
    Compression, Error, ImageHeader, IoStream, PixelFormat, Result, SeekFrom,
};

use crate::features::{CompressionLevel, FeatureFlags, ImageProperties, ReadFeatures, WriteFeatures};
use crate::options::{ReadOptions, WriteOptions};
use crate::traits::{Codec, CodecDescriptor, Decoder, Encoder};

pub(crate) const SIGNATURE_87A: &[u8; 6] = b"GIF87a";
pub(crate) const SIGNATURE_89A: &[u8; 6] = b"GIF89a";

pub(crate) const EXTENSION_INTRODUCER: u8 = 0x21;
pub(crate) const IMAGE_SEPARATOR: u8 = 0x2C;
pub(crate) const TRAILER: u8 = 0x3B;

pub(crate) const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
pub(crate) const COMMENT_LABEL: u8 = 0xFE;
pub(crate) const APPLICATION_LABEL: u8 = 0xFF;

pub(crate) const MAX_CODE_SIZE: u8 = 12;
pub(crate) const MAX_TABLE_SIZE: usize = 1 << MAX_CODE_SIZE;

/// Frame disposal method from the graphic control extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DisposalMethod {
    /// No disposal specified.
    #[default]
    None,
    /// Leave the frame in place.
    Keep,
    /// Clear the frame's rectangle to transparent.
    RestoreBackground,
    /// Restore the canvas as it was before this frame.
    RestorePrevious,
}

impl DisposalMethod {
    pub(crate) fn from_packed(flags: u8) -> Self {
        match (flags >> 2) & 0x07 {
            1 => DisposalMethod::Keep,
            2 => DisposalMethod::RestoreBackground,
            3 => DisposalMethod::RestorePrevious,
            _ => DisposalMethod::None,
        }
    }
}

/// Logical screen descriptor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub global_table_entries: usize,
}

/// Parse the signature, logical screen descriptor, and global color
/// table. Returns `None` if the signature does not match.
pub(crate) fn parse_screen(
    io: &mut dyn IoStream,
) -> Result<Option<(ScreenDescriptor, Option<Vec<u8>>)>> {
    let mut signature = [0u8; 6];
    match io.read_exact(&mut signature) {
        Ok(()) => {}
        Err(Error::ShortRead { .. }) => return Ok(None),
        Err(err) => return Err(err),
    }
    if &signature != SIGNATURE_87A && &signature != SIGNATURE_89A {
        return Ok(None);
    }

    let mut descriptor = [0u8; 7];
    io.read_exact(&mut descriptor)?;

    let width = u16::from_le_bytes([descriptor[0], descriptor[1]]);
    let height = u16::from_le_bytes([descriptor[2], descriptor[3]]);
    let flags = descriptor[4];

    if width == 0 || height == 0 {
        return Err(Error::IncorrectImageDimensions {
            width: width as u32,
            height: height as u32,
        });
    }

    let has_global_table = flags & 0x80 != 0;
    let global_table_entries = if has_global_table {
        1usize << ((flags & 0x07) + 1)
    } else {
        0
    };

    let global_palette = if has_global_table {
        let mut table = vec![0u8; global_table_entries * 3];
        io.read_exact(&mut table)?;
        Some(table)
    } else {
        None
    };

    Ok(Some((
        ScreenDescriptor {
            width,
            height,
            global_table_entries,
        },
        global_palette,
    )))
}

/// Skip sub-blocks without collecting their payload.
pub(crate) fn skip_sub_blocks(io: &mut dyn IoStream) -> Result<()> {
    loop {
        let size = io.read_byte()? as i64;
        if size == 0 {
            return Ok(());
        }
        io.seek(SeekFrom::Current(size))?;
    }
}

/// Collect the payload of consecutive sub-blocks.
pub(crate) fn collect_sub_blocks(io: &mut dyn IoStream) -> Result<Vec<u8>> {
    let mut collected = Vec::new();
    loop {
        let size = io.read_byte()? as usize;
        if size == 0 {
            return Ok(collected);
        }
        let start = collected.len();
        collected.resize(start + size, 0);
        io.read_exact(&mut collected[start..])?;
    }
}

/// The GIF codec.
#[derive(Debug, Default)]
pub struct GifCodec;

impl GifCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

fn read_features() -> ReadFeatures {
    ReadFeatures {
        input_pixel_formats: vec![PixelFormat::Indexed8],
        output_pixel_formats: vec![PixelFormat::Rgba32, PixelFormat::Indexed8],
        default_output_pixel_format: PixelFormat::Rgba32,
        features: FeatureFlags::STATIC
            | FeatureFlags::ANIMATED
            | FeatureFlags::META_INFO
            | FeatureFlags::INTERLACED,
    }
}

fn write_features() -> WriteFeatures {
    WriteFeatures {
        output_pixel_formats: vec![PixelFormat::Indexed8],
        features: FeatureFlags::STATIC | FeatureFlags::ANIMATED | FeatureFlags::META_INFO,
        properties: ImageProperties::empty(),
        compressions: vec![Compression::Lzw],
        default_compression: Compression::Lzw,
        compression_level: CompressionLevel::DISABLED,
    }
}

impl Codec for GifCodec {
    fn describe(&self) -> CodecDescriptor {
        CodecDescriptor {
            name: "gif",
            description: "Graphics Interchange Format",
            version: "1.0.0",
            extensions: &["gif"],
            mime_types: &["image/gif"],
            read_features: read_features(),
            write_features: write_features(),
        }
    }

    fn probe(&self, io: &mut dyn IoStream) -> Result<Option<ImageHeader>> {
        let origin = io.tell()?;
        let screen = parse_screen(io);
        io.seek(SeekFrom::Start(origin))?;

        Ok(screen?.map(|(screen, _)| {
            let mut header = ImageHeader::new(
                screen.width as u32,
                screen.height as u32,
                PixelFormat::Rgba32,
            );
            header.source_pixel_format = PixelFormat::Indexed8;
            header
        }))
    }

    fn read_init(&self, io: &mut dyn IoStream, options: &ReadOptions) -> Result<Box<dyn Decoder>> {
        let (screen, global_palette) = parse_screen(io)?
            .ok_or_else(|| Error::CorruptedImage("not a GIF stream".into()))?;

        Ok(Box::new(decoder::GifDecoder::new(
            options.clone(),
            screen,
            global_palette,
        )))
    }

    fn write_init(
        &self,
        _io: &mut dyn IoStream,
        options: &WriteOptions,
    ) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(encoder::GifEncoder::new(options.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_core::MemReader;

    #[test]
    fn test_disposal_from_packed() {
        assert_eq!(DisposalMethod::from_packed(0x00), DisposalMethod::None);
        assert_eq!(DisposalMethod::from_packed(0x04), DisposalMethod::Keep);
        assert_eq!(
            DisposalMethod::from_packed(0x08),
            DisposalMethod::RestoreBackground
        );
        assert_eq!(
            DisposalMethod::from_packed(0x0C),
            DisposalMethod::RestorePrevious
        );
    }

    #[test]
    fn test_parse_screen_rejects_other_signatures() {
        let data = b"NOTGIF_______";
        let mut io = MemReader::new(&data[..]);
        assert!(parse_screen(&mut io).unwrap().is_none());
    }

    #[test]
    fn test_parse_screen_reads_global_table() {
        // 2x1 screen, global table with 2 entries
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[2, 0, 1, 0, 0x80, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 255, 255, 255]);

        let mut io = MemReader::new(&data);
        let (screen, palette) = parse_screen(&mut io).unwrap().unwrap();
        assert_eq!(screen.width, 2);
        assert_eq!(screen.height, 1);
        assert_eq!(screen.global_table_entries, 2);
        assert_eq!(palette.unwrap().len(), 6);
    }

    #[test]
    fn test_probe_reports_screen_dimensions() {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[4, 0, 3, 0, 0x80, 0, 0]);
        data.extend_from_slice(&[0u8; 6]);

        let mut io = MemReader::new(&data);
        let header = GifCodec::new().probe(&mut io).unwrap().unwrap();
        assert_eq!(header.width, 4);
        assert_eq!(header.height, 3);
        assert_eq!(header.pixel_format, PixelFormat::Rgba32);
        assert_eq!(header.source_pixel_format, PixelFormat::Indexed8);
        assert_eq!(io.tell().unwrap(), 0);
    }
}
