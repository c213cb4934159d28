//! PNM codec: binary PPM (P6) and PGM (P5).
//!
//! Uncompressed, lossless, single-frame. Header `#` comments surface as
//! "Comment" metadata entries and are written back out when metadata is
//! enabled.

use sail_core::{
    Compression, Error, Image, ImageHeader, IoStream, PixelFormat, Result, SeekFrom,
};

use crate::features::{CompressionLevel, FeatureFlags, ImageProperties, ReadFeatures, WriteFeatures};
use crate::options::{ReadOptions, WriteOptions};
use crate::traits::{Codec, CodecDescriptor, Decoder, Encoder};

const MAX_SAMPLE_8: u32 = 255;
const MAX_SAMPLE_16: u32 = 65535;

/// The PNM codec.
#[derive(Debug, Default)]
pub struct PnmCodec;

impl PnmCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

fn read_features() -> ReadFeatures {
    ReadFeatures {
        input_pixel_formats: vec![
            PixelFormat::Grayscale8,
            PixelFormat::Grayscale16,
            PixelFormat::Rgb24,
            PixelFormat::Rgb48,
        ],
        output_pixel_formats: vec![
            PixelFormat::Grayscale8,
            PixelFormat::Grayscale16,
            PixelFormat::Rgb24,
            PixelFormat::Rgb48,
            PixelFormat::Rgba32,
        ],
        default_output_pixel_format: PixelFormat::Unknown,
        features: FeatureFlags::STATIC | FeatureFlags::META_INFO,
    }
}

fn write_features() -> WriteFeatures {
    WriteFeatures {
        output_pixel_formats: vec![
            PixelFormat::Grayscale8,
            PixelFormat::Grayscale16,
            PixelFormat::Rgb24,
            PixelFormat::Rgb48,
        ],
        features: FeatureFlags::STATIC | FeatureFlags::META_INFO,
        properties: ImageProperties::empty(),
        compressions: vec![Compression::None],
        default_compression: Compression::None,
        compression_level: CompressionLevel::DISABLED,
    }
}

/// Parsed PNM header.
#[derive(Debug, Clone)]
struct PnmHeader {
    color: bool,
    width: u32,
    height: u32,
    maxval: u32,
    comments: Vec<String>,
}

impl PnmHeader {
    fn source_pixel_format(&self) -> PixelFormat {
        match (self.color, self.maxval > MAX_SAMPLE_8) {
            (false, false) => PixelFormat::Grayscale8,
            (false, true) => PixelFormat::Grayscale16,
            (true, false) => PixelFormat::Rgb24,
            (true, true) => PixelFormat::Rgb48,
        }
    }
}

/// Read one header token, skipping whitespace and `#` comments.
/// Consumes exactly one trailing whitespace byte after the token, so the
/// raster begins right after the maxval token.
fn read_token(io: &mut dyn IoStream, comments: &mut Vec<String>) -> Result<String> {
    let mut token = String::new();

    loop {
        let byte = io
            .read_byte()
            .map_err(|_| Error::CorruptedImage("unexpected end of header".into()))?;

        match byte {
            b'#' if token.is_empty() => {
                let mut comment = Vec::new();
                loop {
                    match io.read_byte() {
                        Ok(b'\n') => break,
                        Ok(b) => comment.push(b),
                        Err(_) => break,
                    }
                }
                comments.push(String::from_utf8_lossy(&comment).trim().to_string());
            }
            b' ' | b'\t' | b'\r' | b'\n' => {
                if !token.is_empty() {
                    return Ok(token);
                }
            }
            _ => token.push(byte as char),
        }
    }
}

fn parse_number(token: &str) -> Result<u32> {
    token
        .parse::<u32>()
        .map_err(|_| Error::CorruptedImage(format!("bad header number '{token}'")))
}

fn parse_header(io: &mut dyn IoStream) -> Result<Option<PnmHeader>> {
    let mut magic = [0u8; 2];
    match io.read_exact(&mut magic) {
        Ok(()) => {}
        Err(Error::ShortRead { .. }) => return Ok(None),
        Err(err) => return Err(err),
    }
    if magic[0] != b'P' || (magic[1] != b'5' && magic[1] != b'6') {
        return Ok(None);
    }

    let mut comments = Vec::new();
    let width = parse_number(&read_token(io, &mut comments)?)?;
    let height = parse_number(&read_token(io, &mut comments)?)?;
    let maxval = parse_number(&read_token(io, &mut comments)?)?;

    if width == 0 || height == 0 {
        return Err(Error::IncorrectImageDimensions { width, height });
    }
    if maxval == 0 || maxval > MAX_SAMPLE_16 {
        return Err(Error::CorruptedImage(format!("bad maxval {maxval}")));
    }

    Ok(Some(PnmHeader {
        color: magic[1] == b'6',
        width,
        height,
        maxval,
        comments,
    }))
}

impl Codec for PnmCodec {
    fn describe(&self) -> CodecDescriptor {
        CodecDescriptor {
            name: "pnm",
            description: "Portable Any Map (PPM/PGM)",
            version: "1.0.0",
            extensions: &["ppm", "pgm", "pnm"],
            mime_types: &["image/x-portable-pixmap", "image/x-portable-graymap"],
            read_features: read_features(),
            write_features: write_features(),
        }
    }

    fn probe(&self, io: &mut dyn IoStream) -> Result<Option<ImageHeader>> {
        let origin = io.tell()?;
        let header = parse_header(io);
        io.seek(SeekFrom::Start(origin))?;

        Ok(header?.map(|h| ImageHeader::new(h.width, h.height, h.source_pixel_format())))
    }

    fn read_init(
        &self,
        _io: &mut dyn IoStream,
        options: &ReadOptions,
    ) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(PnmDecoder {
            options: options.clone(),
            header: None,
            frame_done: false,
        }))
    }

    fn write_init(
        &self,
        _io: &mut dyn IoStream,
        options: &WriteOptions,
    ) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(PnmEncoder {
            options: options.clone(),
            frames_written: 0,
        }))
    }
}

struct PnmDecoder {
    options: ReadOptions,
    header: Option<PnmHeader>,
    frame_done: bool,
}

impl PnmDecoder {
    /// Resolve the buffer format this session yields, applying the
    /// conversions this codec implements.
    fn output_format(&self, source: PixelFormat) -> Result<PixelFormat> {
        let requested = self.options.output_pixel_format;
        if requested == PixelFormat::Unknown || requested == source {
            return Ok(source);
        }

        match (source, requested) {
            (PixelFormat::Grayscale8, PixelFormat::Rgb24)
            | (PixelFormat::Grayscale8, PixelFormat::Rgba32)
            | (PixelFormat::Rgb24, PixelFormat::Rgba32) => Ok(requested),
            _ => Err(Error::UnsupportedPixelFormat(requested)),
        }
    }
}

impl Decoder for PnmDecoder {
    fn seek_next_frame(&mut self, io: &mut dyn IoStream) -> Result<ImageHeader> {
        if self.frame_done {
            return Err(Error::NoMoreFrames);
        }

        let header = parse_header(io)?
            .ok_or_else(|| Error::CorruptedImage("not a PNM stream".into()))?;

        let source = header.source_pixel_format();
        let output = self.output_format(source)?;

        let mut image_header = ImageHeader::new(header.width, header.height, output);
        image_header.source_pixel_format = source;

        self.header = Some(header);
        Ok(image_header)
    }

    fn read_frame(&mut self, io: &mut dyn IoStream, image: &mut Image) -> Result<()> {
        let header = self.header.take().ok_or(Error::StateNull)?;
        self.frame_done = true;

        let source = header.source_pixel_format();
        let source_row = source.bytes_per_line(header.width);

        if image.pixel_format() == source {
            for y in 0..header.height {
                io.read_exact(image.row_mut(y))?;
            }
        } else {
            let mut row = vec![0u8; source_row];
            let dest_format = image.pixel_format();
            for y in 0..header.height {
                io.read_exact(&mut row)?;
                expand_row(&row, image.row_mut(y), source, dest_format);
            }
        }

        if self.options.meta_info {
            for comment in &header.comments {
                image.push_meta("Comment", comment.clone());
            }
        }

        Ok(())
    }

    fn finish(&mut self, _io: &mut dyn IoStream) -> Result<()> {
        Ok(())
    }
}

/// Expand one source row into a wider output format.
fn expand_row(src: &[u8], dst: &mut [u8], from: PixelFormat, to: PixelFormat) {
    match (from, to) {
        (PixelFormat::Grayscale8, PixelFormat::Rgb24) => {
            for (i, &g) in src.iter().enumerate() {
                dst[i * 3..i * 3 + 3].copy_from_slice(&[g, g, g]);
            }
        }
        (PixelFormat::Grayscale8, PixelFormat::Rgba32) => {
            for (i, &g) in src.iter().enumerate() {
                dst[i * 4..i * 4 + 4].copy_from_slice(&[g, g, g, 255]);
            }
        }
        (PixelFormat::Rgb24, PixelFormat::Rgba32) => {
            for (i, rgb) in src.chunks_exact(3).enumerate() {
                dst[i * 4..i * 4 + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
        }
        _ => {}
    }
}

struct PnmEncoder {
    options: WriteOptions,
    frames_written: u32,
}

impl Encoder for PnmEncoder {
    fn seek_next_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        if self.frames_written > 0 {
            return Err(Error::NoMoreFrames);
        }

        let (magic, maxval) = match image.pixel_format() {
            PixelFormat::Grayscale8 => ("P5", MAX_SAMPLE_8),
            PixelFormat::Grayscale16 => ("P5", MAX_SAMPLE_16),
            PixelFormat::Rgb24 => ("P6", MAX_SAMPLE_8),
            PixelFormat::Rgb48 => ("P6", MAX_SAMPLE_16),
            other => return Err(Error::UnsupportedPixelFormat(other)),
        };

        let mut header = format!("{magic}\n");
        if self.options.meta_info {
            for entry in image.meta() {
                if entry.key == "Comment" {
                    header.push_str(&format!("# {}\n", entry.value));
                }
            }
        }
        header.push_str(&format!("{} {}\n{}\n", image.width(), image.height(), maxval));

        io.write_all(header.as_bytes())
    }

    fn write_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        self.frames_written += 1;
        for y in 0..image.height() {
            io.write_all(image.row(y))?;
        }
        Ok(())
    }

    fn finish(&mut self, io: &mut dyn IoStream) -> Result<()> {
        io.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_core::{MemReader, MemWriter};

    fn gray_file() -> Vec<u8> {
        let mut data = b"P5\n# test shot\n2 2\n255\n".to_vec();
        data.extend_from_slice(&[10, 20, 30, 40]);
        data
    }

    #[test]
    fn test_probe_parses_header_and_rewinds() {
        let data = gray_file();
        let mut io = MemReader::new(&data);

        let header = PnmCodec::new().probe(&mut io).unwrap().unwrap();
        assert_eq!(header.width, 2);
        assert_eq!(header.height, 2);
        assert_eq!(header.pixel_format, PixelFormat::Grayscale8);
        assert_eq!(io.tell().unwrap(), 0);
    }

    #[test]
    fn test_probe_rejects_other_formats() {
        let data = b"BM000000";
        let mut io = MemReader::new(&data[..]);
        assert!(PnmCodec::new().probe(&mut io).unwrap().is_none());
    }

    #[test]
    fn test_decode_with_comment_meta() {
        let data = gray_file();
        let mut io = MemReader::new(&data);
        let codec = PnmCodec::new();

        let options = ReadOptions::from_features(&codec.describe().read_features);
        let mut decoder = codec.read_init(&mut io, &options).unwrap();

        let header = decoder.seek_next_frame(&mut io).unwrap();
        let mut image = Image::from_header(header).unwrap();
        decoder.read_frame(&mut io, &mut image).unwrap();

        assert_eq!(image.pixels(), &[10, 20, 30, 40]);
        assert_eq!(image.find_meta("Comment"), Some("test shot"));

        assert_eq!(
            decoder.seek_next_frame(&mut io).unwrap_err(),
            Error::NoMoreFrames
        );
    }

    #[test]
    fn test_decode_gray_as_rgba() {
        let data = gray_file();
        let mut io = MemReader::new(&data);
        let codec = PnmCodec::new();

        let options = ReadOptions::from_features(&codec.describe().read_features)
            .with_output_pixel_format(PixelFormat::Rgba32);
        let mut decoder = codec.read_init(&mut io, &options).unwrap();

        let header = decoder.seek_next_frame(&mut io).unwrap();
        assert_eq!(header.pixel_format, PixelFormat::Rgba32);
        assert_eq!(header.source_pixel_format, PixelFormat::Grayscale8);

        let mut image = Image::from_header(header).unwrap();
        decoder.read_frame(&mut io, &mut image).unwrap();
        assert_eq!(&image.pixels()[..4], &[10, 10, 10, 255]);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = PnmCodec::new();
        let mut original = Image::new(2, 2, PixelFormat::Rgb24).unwrap();
        original
            .pixels_mut()
            .copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        original.push_meta("Comment", "round trip");

        let mut sink = MemWriter::new();
        let options = WriteOptions::from_features(&codec.describe().write_features);
        let mut encoder = codec.write_init(&mut sink, &options).unwrap();
        encoder.seek_next_frame(&mut sink, &original).unwrap();
        encoder.write_frame(&mut sink, &original).unwrap();
        encoder.finish(&mut sink).unwrap();

        let encoded = sink.into_inner();
        let mut io = MemReader::new(&encoded);
        let read_options = ReadOptions::from_features(&codec.describe().read_features);
        let mut decoder = codec.read_init(&mut io, &read_options).unwrap();
        let header = decoder.seek_next_frame(&mut io).unwrap();
        let mut decoded = Image::from_header(header).unwrap();
        decoder.read_frame(&mut io, &mut decoded).unwrap();

        assert_eq!(decoded.pixels(), original.pixels());
        assert_eq!(decoded.find_meta("Comment"), Some("round trip"));
    }

    #[test]
    fn test_truncated_raster() {
        let mut data = b"P5\n2 2\n255\n".to_vec();
        data.extend_from_slice(&[10, 20]); // 2 of 4 bytes

        let mut io = MemReader::new(&data);
        let codec = PnmCodec::new();
        let options = ReadOptions::from_features(&codec.describe().read_features);
        let mut decoder = codec.read_init(&mut io, &options).unwrap();
        let header = decoder.seek_next_frame(&mut io).unwrap();
        let mut image = Image::from_header(header).unwrap();

        assert!(matches!(
            decoder.read_frame(&mut io, &mut image),
            Err(Error::ShortRead { .. })
        ));
    }
}
