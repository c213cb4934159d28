//! GIF encoder with LZW compression.

use sail_core::{Error, Image, IoStream, Palette, PixelFormat, Result};

use super::{
    DisposalMethod, COMMENT_LABEL, EXTENSION_INTRODUCER, GRAPHIC_CONTROL_LABEL,
    IMAGE_SEPARATOR, MAX_TABLE_SIZE, SIGNATURE_89A, TRAILER,
};
use crate::options::WriteOptions;
use crate::traits::Encoder;

pub(crate) struct GifEncoder {
    options: WriteOptions,
    screen: Option<(u16, u16)>,
    global_palette: Option<Vec<u8>>,
    frame_code_size: Option<u8>,
}

impl GifEncoder {
    pub(crate) fn new(options: WriteOptions) -> Self {
        Self {
            options,
            screen: None,
            global_palette: None,
            frame_code_size: None,
        }
    }

    fn write_comments(&self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        for entry in image.meta() {
            if entry.key != "Comment" {
                continue;
            }
            io.write_all(&[EXTENSION_INTRODUCER, COMMENT_LABEL])?;
            write_sub_blocks(io, entry.value.as_bytes())?;
        }
        Ok(())
    }
}

/// Pad a palette to a power-of-two entry count and return it with the
/// bit width of its indices.
fn padded_palette(palette: &Palette) -> Result<(Vec<u8>, u8)> {
    if palette.pixel_format != PixelFormat::Rgb24 {
        return Err(Error::UnsupportedPixelFormat(palette.pixel_format));
    }

    let count = palette.count.min(palette.data.len() / 3);
    if count == 0 || count > 256 {
        return Err(Error::invalid_argument(format!(
            "palette must hold 1..=256 entries, got {count}"
        )));
    }

    let entries = count.next_power_of_two().max(2);
    let mut padded = palette.data[..count * 3].to_vec();
    padded.resize(entries * 3, 0);

    Ok((padded, entries.trailing_zeros() as u8))
}

impl Encoder for GifEncoder {
    fn seek_next_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        if image.pixel_format() != PixelFormat::Indexed8 {
            return Err(Error::UnsupportedPixelFormat(image.pixel_format()));
        }
        if image.width() > u16::MAX as u32 || image.height() > u16::MAX as u32 {
            return Err(Error::IncorrectImageDimensions {
                width: image.width(),
                height: image.height(),
            });
        }

        let palette = image
            .palette()
            .ok_or_else(|| Error::invalid_argument("indexed image requires a palette"))?;
        let (padded, bits) = padded_palette(palette)?;

        let width = image.width() as u16;
        let height = image.height() as u16;

        let local_palette = match self.screen {
            None => {
                // First frame: signature, logical screen descriptor, and the
                // frame's palette as the global color table.
                io.write_all(SIGNATURE_89A)?;
                let mut descriptor = [0u8; 7];
                descriptor[0..2].copy_from_slice(&width.to_le_bytes());
                descriptor[2..4].copy_from_slice(&height.to_le_bytes());
                descriptor[4] = 0x80 | (bits - 1);
                io.write_all(&descriptor)?;
                io.write_all(&padded)?;

                if self.options.meta_info {
                    self.write_comments(io, image)?;
                }

                self.screen = Some((width, height));
                self.global_palette = Some(padded.clone());
                None
            }
            Some((screen_width, screen_height)) => {
                if width != screen_width || height != screen_height {
                    return Err(Error::invalid_argument(format!(
                        "frame size {width}x{height} differs from first frame \
                         {screen_width}x{screen_height}"
                    )));
                }
                if self.global_palette.as_deref() == Some(&padded[..]) {
                    None
                } else {
                    Some(padded.clone())
                }
            }
        };

        if image.delay_ms() > 0 {
            let delay_cs = (image.delay_ms() / 10).min(u16::MAX as u32) as u16;
            let mut extension = [0u8; 8];
            extension[0] = EXTENSION_INTRODUCER;
            extension[1] = GRAPHIC_CONTROL_LABEL;
            extension[2] = 4;
            extension[3] = (DisposalMethod::Keep as u8) << 2;
            extension[4..6].copy_from_slice(&delay_cs.to_le_bytes());
            io.write_all(&extension)?;
        }

        let mut descriptor = [0u8; 10];
        descriptor[0] = IMAGE_SEPARATOR;
        descriptor[5..7].copy_from_slice(&width.to_le_bytes());
        descriptor[7..9].copy_from_slice(&height.to_le_bytes());
        if local_palette.is_some() {
            descriptor[9] = 0x80 | (bits - 1);
        }
        io.write_all(&descriptor)?;

        if let Some(table) = local_palette {
            io.write_all(&table)?;
        }

        self.frame_code_size = Some(bits.max(2));
        Ok(())
    }

    fn write_frame(&mut self, io: &mut dyn IoStream, image: &Image) -> Result<()> {
        let min_code_size = self.frame_code_size.take().ok_or(Error::StateNull)?;

        io.write_all(&[min_code_size])?;

        let pixel_count = image.width() as usize * image.height() as usize;
        let mut compressed = Vec::with_capacity(pixel_count / 2);
        lzw_encode(&image.pixels()[..pixel_count], min_code_size, &mut compressed);
        write_sub_blocks(io, &compressed)
    }

    fn finish(&mut self, io: &mut dyn IoStream) -> Result<()> {
        if self.screen.is_some() {
            io.write_all(&[TRAILER])?;
        }
        io.flush()
    }
}

/// Write a payload as a chain of sub-blocks followed by a terminator.
fn write_sub_blocks(io: &mut dyn IoStream, data: &[u8]) -> Result<()> {
    for chunk in data.chunks(255) {
        io.write_all(&[chunk.len() as u8])?;
        io.write_all(chunk)?;
    }
    io.write_all(&[0])
}

struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    bits: u32,
    filled: u8,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            bits: 0,
            filled: 0,
        }
    }

    fn push(&mut self, code: u16, size: u8) {
        self.bits |= (code as u32) << self.filled;
        self.filled += size;
        while self.filled >= 8 {
            self.out.push(self.bits as u8);
            self.bits >>= 8;
            self.filled -= 8;
        }
    }

    fn flush(&mut self) {
        if self.filled > 0 {
            self.out.push(self.bits as u8);
            self.bits = 0;
            self.filled = 0;
        }
    }
}

/// Compress palette indices with GIF-flavored LZW: variable code sizes,
/// least significant bit first, dictionary reset when the table fills.
pub(crate) fn lzw_encode(data: &[u8], min_code_size: u8, out: &mut Vec<u8>) {
    let clear_code = 1u16 << min_code_size;
    let eoi_code = clear_code + 1;

    let mut writer = BitWriter::new(out);
    let mut dict: std::collections::HashMap<(u16, u8), u16> =
        std::collections::HashMap::new();
    let mut code_size = min_code_size + 1;
    let mut next_code = eoi_code + 1;

    writer.push(clear_code, code_size);

    let mut prefix: Option<u16> = None;
    for &symbol in data {
        let Some(current) = prefix else {
            prefix = Some(symbol as u16);
            continue;
        };

        if let Some(&combined) = dict.get(&(current, symbol)) {
            prefix = Some(combined);
            continue;
        }

        writer.push(current, code_size);

        if next_code < MAX_TABLE_SIZE as u16 {
            dict.insert((current, symbol), next_code);
            next_code += 1;
            // The decoder widens after defining the same entry; stay in
            // lockstep one code early.
            if next_code > 1 << code_size && code_size < super::MAX_CODE_SIZE {
                code_size += 1;
            }
        } else {
            writer.push(clear_code, code_size);
            dict.clear();
            code_size = min_code_size + 1;
            next_code = eoi_code + 1;
        }

        prefix = Some(symbol as u16);
    }

    if let Some(current) = prefix {
        writer.push(current, code_size);
    }
    writer.push(eoi_code, code_size);
    writer.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_lsb_order() {
        let mut out = Vec::new();
        let mut writer = BitWriter::new(&mut out);
        writer.push(0b101, 3);
        writer.push(0b11, 2);
        writer.flush();
        assert_eq!(out, vec![0b0001_1101]);
    }

    #[test]
    fn test_sub_block_chaining() {
        let mut sink = sail_core::MemWriter::new();
        let data = vec![7u8; 300];
        write_sub_blocks(&mut sink, &data).unwrap();

        let out = sink.into_inner();
        assert_eq!(out[0], 255);
        assert_eq!(out[256], 45);
        assert_eq!(*out.last().unwrap(), 0);
        assert_eq!(out.len(), 1 + 255 + 1 + 45 + 1);
    }

    #[test]
    fn test_padded_palette() {
        let palette = Palette::new(PixelFormat::Rgb24, vec![1, 2, 3, 4, 5, 6, 7, 8, 9], 3);
        let (padded, bits) = padded_palette(&palette).unwrap();
        assert_eq!(bits, 2);
        assert_eq!(padded.len(), 4 * 3);
        assert_eq!(&padded[..9], &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_padded_palette_rejects_non_rgb() {
        let palette = Palette::new(PixelFormat::Rgba32, vec![0; 8], 2);
        assert!(matches!(
            padded_palette(&palette),
            Err(Error::UnsupportedPixelFormat(_))
        ));
    }
}
