//! BMP codec: uncompressed BITMAPINFOHEADER bitmaps.
//!
//! Reads and writes 24-bit BGR and 32-bit BGRA, bottom-up or top-down
//! row order, with rows padded to four bytes.

use byteorder::{ByteOrder, LittleEndian};

use sail_core::{
    Compression, Error, Image, ImageHeader, IoStream, PixelFormat, Result, SeekFrom,
};

use crate::features::{CompressionLevel, FeatureFlags, ImageProperties, ReadFeatures, WriteFeatures};
use crate::options::{ReadOptions, WriteOptions};
use crate::traits::{Codec, CodecDescriptor, Decoder, Encoder};

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;
const BI_RGB: u32 = 0;

/// The BMP codec.
#[derive(Debug, Default)]
pub struct BmpCodec;

impl BmpCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

fn read_features() -> ReadFeatures {
    ReadFeatures {
        input_pixel_formats: vec![PixelFormat::Bgr24, PixelFormat::Bgra32],
        output_pixel_formats: vec![
            PixelFormat::Bgr24,
            PixelFormat::Bgra32,
            PixelFormat::Rgb24,
            PixelFormat::Rgba32,
        ],
        default_output_pixel_format: PixelFormat::Unknown,
        features: FeatureFlags::STATIC,
    }
}

fn write_features() -> WriteFeatures {
    WriteFeatures {
        output_pixel_formats: vec![PixelFormat::Bgr24, PixelFormat::Bgra32],
        features: FeatureFlags::STATIC,
        properties: ImageProperties::empty(),
        compressions: vec![Compression::None],
        default_compression: Compression::None,
        compression_level: CompressionLevel::DISABLED,
    }
}

#[derive(Debug, Clone, Copy)]
struct BmpHeader {
    width: u32,
    height: u32,
    bottom_up: bool,
    bits_per_pixel: u16,
    pixel_offset: u32,
}

impl BmpHeader {
    fn source_pixel_format(&self) -> PixelFormat {
        if self.bits_per_pixel == 32 {
            PixelFormat::Bgra32
        } else {
            PixelFormat::Bgr24
        }
    }

    /// Source rows are padded to a four-byte boundary.
    fn padded_row_size(&self) -> usize {
        let raw = self.width as usize * (self.bits_per_pixel as usize / 8);
        (raw + 3) & !3
    }
}

fn parse_header(io: &mut dyn IoStream) -> Result<Option<BmpHeader>> {
    let mut file_header = [0u8; FILE_HEADER_SIZE as usize];
    match io.read_exact(&mut file_header) {
        Ok(()) => {}
        Err(Error::ShortRead { .. }) => return Ok(None),
        Err(err) => return Err(err),
    }
    if &file_header[0..2] != b"BM" {
        return Ok(None);
    }
    let pixel_offset = LittleEndian::read_u32(&file_header[10..14]);

    let mut info = [0u8; INFO_HEADER_SIZE as usize];
    io.read_exact(&mut info)?;

    let info_size = LittleEndian::read_u32(&info[0..4]);
    if info_size < INFO_HEADER_SIZE {
        return Err(Error::CorruptedImage(format!(
            "info header too small: {info_size}"
        )));
    }

    let raw_width = LittleEndian::read_i32(&info[4..8]);
    let raw_height = LittleEndian::read_i32(&info[8..12]);
    let bits_per_pixel = LittleEndian::read_u16(&info[14..16]);
    let compression = LittleEndian::read_u32(&info[16..20]);

    if compression != BI_RGB {
        return Err(Error::UnsupportedFeature(format!(
            "BMP compression {compression}"
        )));
    }
    if bits_per_pixel != 24 && bits_per_pixel != 32 {
        return Err(Error::UnsupportedFeature(format!(
            "BMP bit depth {bits_per_pixel}"
        )));
    }
    if raw_width <= 0 || raw_height == 0 {
        return Err(Error::IncorrectImageDimensions {
            width: raw_width.max(0) as u32,
            height: raw_height.unsigned_abs(),
        });
    }

    Ok(Some(BmpHeader {
        width: raw_width as u32,
        height: raw_height.unsigned_abs(),
        bottom_up: raw_height > 0,
        bits_per_pixel,
        pixel_offset,
    }))
}

impl Codec for BmpCodec {
    fn describe(&self) -> CodecDescriptor {
        CodecDescriptor {
            name: "bmp",
            description: "Windows Bitmap",
            version: "1.0.0",
            extensions: &["bmp", "dib"],
            mime_types: &["image/bmp", "image/x-ms-bmp"],
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
        Ok(Box::new(BmpDecoder {
            options: options.clone(),
            header: None,
            frame_done: false,
        }))
    }

    fn write_init(
        &self,
        _io: &mut dyn IoStream,
        _options: &WriteOptions,
    ) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(BmpEncoder { frames_written: 0 }))
    }
}

struct BmpDecoder {
    options: ReadOptions,
    header: Option<BmpHeader>,
    frame_done: bool,
}

impl BmpDecoder {
    fn output_format(&self, source: PixelFormat) -> Result<PixelFormat> {
        let requested = self.options.output_pixel_format;
        if requested == PixelFormat::Unknown || requested == source {
            return Ok(source);
        }

        match (source, requested) {
            (PixelFormat::Bgr24, PixelFormat::Rgb24)
            | (PixelFormat::Bgra32, PixelFormat::Rgba32) => Ok(requested),
            _ => Err(Error::UnsupportedPixelFormat(requested)),
        }
    }
}

impl Decoder for BmpDecoder {
    fn seek_next_frame(&mut self, io: &mut dyn IoStream) -> Result<ImageHeader> {
        if self.frame_done {
            return Err(Error::NoMoreFrames);
        }

        let header = parse_header(io)?
            .ok_or_else(|| Error::CorruptedImage("not a BMP stream".into()))?;

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

        io.seek(SeekFrom::Start(header.pixel_offset as u64))?;

        let swap_channels = image.pixel_format() != header.source_pixel_format();
        let channels = header.bits_per_pixel as usize / 8;
        let mut row = vec![0u8; header.padded_row_size()];

        for i in 0..header.height {
            let y = if header.bottom_up {
                header.height - 1 - i
            } else {
                i
            };

            io.read_exact(&mut row)?;
            let dst = image.row_mut(y);
            dst.copy_from_slice(&row[..dst.len()]);

            if swap_channels {
                for pixel in dst.chunks_exact_mut(channels) {
                    pixel.swap(0, 2);
                }
            }
        }

        Ok(())
    }

    fn finish(&mut self, _io: &mut dyn IoStream) -> Result<()> {
        Ok(())
    }
}

struct BmpEncoder {
    frames_written: u32,
}

impl Encoder for BmpEncoder {
    fn seek_next_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        if self.frames_written > 0 {
            return Err(Error::NoMoreFrames);
        }

        let bits_per_pixel: u16 = match image.pixel_format() {
            PixelFormat::Bgr24 => 24,
            PixelFormat::Bgra32 => 32,
            other => return Err(Error::UnsupportedPixelFormat(other)),
        };

        let raw_row = image.width() as usize * (bits_per_pixel as usize / 8);
        let padded_row = (raw_row + 3) & !3;
        let pixel_bytes = padded_row as u32 * image.height();
        let pixel_offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE;

        let mut file_header = [0u8; FILE_HEADER_SIZE as usize];
        file_header[0..2].copy_from_slice(b"BM");
        LittleEndian::write_u32(&mut file_header[2..6], pixel_offset + pixel_bytes);
        LittleEndian::write_u32(&mut file_header[10..14], pixel_offset);
        io.write_all(&file_header)?;

        let mut info = [0u8; INFO_HEADER_SIZE as usize];
        LittleEndian::write_u32(&mut info[0..4], INFO_HEADER_SIZE);
        LittleEndian::write_i32(&mut info[4..8], image.width() as i32);
        LittleEndian::write_i32(&mut info[8..12], image.height() as i32);
        LittleEndian::write_u16(&mut info[12..14], 1);
        LittleEndian::write_u16(&mut info[14..16], bits_per_pixel);
        LittleEndian::write_u32(&mut info[16..20], BI_RGB);
        LittleEndian::write_u32(&mut info[20..24], pixel_bytes);
        io.write_all(&info)
    }

    fn write_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        self.frames_written += 1;

        let raw_row = image.bytes_per_line();
        let padding = [0u8; 3];
        let pad = ((raw_row + 3) & !3) - raw_row;

        // Rows are stored bottom-up.
        for i in 0..image.height() {
            let y = image.height() - 1 - i;
            io.write_all(image.row(y))?;
            if pad > 0 {
                io.write_all(&padding[..pad])?;
            }
        }

        Ok(())
    }

    fn finish(&mut self, io: &mut dyn IoStream) -> Result<()> {
        io.flush()
    }
}
