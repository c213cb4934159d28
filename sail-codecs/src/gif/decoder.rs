//! GIF frame-at-a-time decoder.

use tracing::debug;

use sail_core::{Error, Image, ImageHeader, IoStream, Palette, PixelFormat, Result};

use super::{
    collect_sub_blocks, skip_sub_blocks, DisposalMethod, ScreenDescriptor,
    APPLICATION_LABEL, COMMENT_LABEL, EXTENSION_INTRODUCER, GRAPHIC_CONTROL_LABEL,
    IMAGE_SEPARATOR, MAX_TABLE_SIZE, TRAILER,
};
use crate::options::ReadOptions;
use crate::traits::Decoder;

#[derive(Debug, Clone, Copy, Default)]
struct GraphicControl {
    disposal: DisposalMethod,
    delay_cs: u16,
    transparent: Option<u8>,
}

#[derive(Debug, Clone, Copy)]
struct FrameRect {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

struct PendingFrame {
    rect: FrameRect,
    interlaced: bool,
    local_palette: Option<Vec<u8>>,
    control: GraphicControl,
}

pub(crate) struct GifDecoder {
    options: ReadOptions,
    screen: ScreenDescriptor,
    global_palette: Option<Vec<u8>>,
    canvas: Vec<u8>,
    snapshot: Option<Vec<u8>>,
    prev: Option<(DisposalMethod, FrameRect)>,
    pending: Option<PendingFrame>,
    pending_header: Option<ImageHeader>,
    pending_comments: Vec<String>,
    control: Option<GraphicControl>,
    loop_count: Option<u16>,
    loop_reported: bool,
    done: bool,
}

impl GifDecoder {
    pub(crate) fn new(
        options: ReadOptions,
        screen: ScreenDescriptor,
        global_palette: Option<Vec<u8>>,
    ) -> Self {
        let canvas = vec![0u8; screen.width as usize * screen.height as usize * 4];

        Self {
            options,
            screen,
            global_palette,
            canvas,
            snapshot: None,
            prev: None,
            pending: None,
            pending_header: None,
            pending_comments: Vec::new(),
            control: None,
            loop_count: None,
            loop_reported: false,
            done: false,
        }
    }

    fn composited_output(&self) -> bool {
        self.options.output_pixel_format != PixelFormat::Indexed8
    }

    fn frame_header(&self, frame: &PendingFrame) -> ImageHeader {
        let mut header = if self.composited_output() {
            ImageHeader::new(
                self.screen.width as u32,
                self.screen.height as u32,
                PixelFormat::Rgba32,
            )
        } else {
            ImageHeader::new(
                frame.rect.width as u32,
                frame.rect.height as u32,
                PixelFormat::Indexed8,
            )
        };

        header.source_pixel_format = PixelFormat::Indexed8;
        header.delay_ms = frame.control.delay_cs as u32 * 10;
        header.interlaced = frame.interlaced;
        header
    }

    fn parse_image_descriptor(&mut self, io: &mut dyn IoStream) -> Result<PendingFrame> {
        let mut descriptor = [0u8; 9];
        io.read_exact(&mut descriptor)?;

        let rect = FrameRect {
            x: u16::from_le_bytes([descriptor[0], descriptor[1]]),
            y: u16::from_le_bytes([descriptor[2], descriptor[3]]),
            width: u16::from_le_bytes([descriptor[4], descriptor[5]]),
            height: u16::from_le_bytes([descriptor[6], descriptor[7]]),
        };
        let flags = descriptor[8];

        if rect.width == 0 || rect.height == 0 {
            return Err(Error::CorruptedImage("empty frame rectangle".into()));
        }
        if rect.x as u32 + rect.width as u32 > self.screen.width as u32
            || rect.y as u32 + rect.height as u32 > self.screen.height as u32
        {
            return Err(Error::CorruptedImage(
                "frame rectangle outside the canvas".into(),
            ));
        }

        let local_palette = if flags & 0x80 != 0 {
            let entries = 1usize << ((flags & 0x07) + 1);
            let mut table = vec![0u8; entries * 3];
            io.read_exact(&mut table)?;
            Some(table)
        } else {
            None
        };

        Ok(PendingFrame {
            rect,
            interlaced: flags & 0x40 != 0,
            local_palette,
            control: self.control.take().unwrap_or_default(),
        })
    }

    fn apply_previous_disposal(&mut self) {
        let Some((disposal, rect)) = self.prev.take() else {
            return;
        };

        match disposal {
            DisposalMethod::None | DisposalMethod::Keep => {}
            DisposalMethod::RestoreBackground => {
                let stride = self.screen.width as usize * 4;
                for y in rect.y..rect.y + rect.height {
                    let row = y as usize * stride + rect.x as usize * 4;
                    self.canvas[row..row + rect.width as usize * 4].fill(0);
                }
            }
            DisposalMethod::RestorePrevious => {
                if let Some(snapshot) = self.snapshot.take() {
                    self.canvas = snapshot;
                }
            }
        }
    }

    fn composite(&mut self, frame: &PendingFrame, indices: &[u8], palette: &[u8]) {
        self.apply_previous_disposal();

        if frame.control.disposal == DisposalMethod::RestorePrevious {
            self.snapshot = Some(self.canvas.clone());
        }

        let stride = self.screen.width as usize * 4;
        let entries = palette.len() / 3;

        for y in 0..frame.rect.height as usize {
            for x in 0..frame.rect.width as usize {
                let index = indices[y * frame.rect.width as usize + x];
                if frame.control.transparent == Some(index) {
                    continue;
                }

                let offset =
                    (frame.rect.y as usize + y) * stride + (frame.rect.x as usize + x) * 4;
                if (index as usize) < entries {
                    let entry = index as usize * 3;
                    self.canvas[offset] = palette[entry];
                    self.canvas[offset + 1] = palette[entry + 1];
                    self.canvas[offset + 2] = palette[entry + 2];
                    self.canvas[offset + 3] = 255;
                }
            }
        }

        self.prev = Some((frame.control.disposal, frame.rect));
    }
}

impl Decoder for GifDecoder {
    fn seek_next_frame(&mut self, io: &mut dyn IoStream) -> Result<ImageHeader> {
        if self.done {
            return Err(Error::NoMoreFrames);
        }
        if let Some(header) = &self.pending_header {
            return Ok(header.clone());
        }

        loop {
            let introducer = match io.read_byte() {
                Ok(byte) => byte,
                // Missing trailer; treat a clean cut as the end of the animation.
                Err(Error::ShortRead { .. }) => {
                    self.done = true;
                    return Err(Error::NoMoreFrames);
                }
                Err(err) => return Err(err),
            };

            match introducer {
                EXTENSION_INTRODUCER => {
                    let label = io.read_byte()?;
                    match label {
                        GRAPHIC_CONTROL_LABEL => {
                            let block = collect_sub_blocks(io)?;
                            if block.len() < 4 {
                                return Err(Error::CorruptedImage(
                                    "short graphic control extension".into(),
                                ));
                            }
                            self.control = Some(GraphicControl {
                                disposal: DisposalMethod::from_packed(block[0]),
                                delay_cs: u16::from_le_bytes([block[1], block[2]]),
                                transparent: (block[0] & 0x01 != 0).then_some(block[3]),
                            });
                        }
                        COMMENT_LABEL => {
                            let raw = collect_sub_blocks(io)?;
                            if self.options.meta_info {
                                self.pending_comments
                                    .push(String::from_utf8_lossy(&raw).into_owned());
                            }
                        }
                        APPLICATION_LABEL => {
                            let raw = collect_sub_blocks(io)?;
                            if raw.len() >= 14 && &raw[..11] == b"NETSCAPE2.0" && raw[11] == 1 {
                                self.loop_count =
                                    Some(u16::from_le_bytes([raw[12], raw[13]]));
                            }
                        }
                        other => {
                            debug!("skipping extension 0x{other:02X}");
                            skip_sub_blocks(io)?;
                        }
                    }
                }
                IMAGE_SEPARATOR => {
                    let frame = self.parse_image_descriptor(io)?;
                    let header = self.frame_header(&frame);
                    self.pending = Some(frame);
                    self.pending_header = Some(header.clone());
                    return Ok(header);
                }
                TRAILER => {
                    self.done = true;
                    return Err(Error::NoMoreFrames);
                }
                other => {
                    return Err(Error::CorruptedImage(format!(
                        "unknown block introducer 0x{other:02X}"
                    )));
                }
            }
        }
    }

    fn read_frame(&mut self, io: &mut dyn IoStream, image: &mut Image) -> Result<()> {
        let frame = self.pending.take().ok_or(Error::StateNull)?;
        self.pending_header = None;

        let min_code_size = io.read_byte()?;
        if !(2..=8).contains(&min_code_size) {
            return Err(Error::CorruptedImage(format!(
                "invalid LZW minimum code size {min_code_size}"
            )));
        }

        let compressed = collect_sub_blocks(io)?;
        let expected = frame.rect.width as usize * frame.rect.height as usize;
        let mut indices = lzw_decode(&compressed, min_code_size, expected)?;

        if frame.interlaced {
            indices = deinterlace(&indices, frame.rect.width as usize);
        }

        let palette = frame
            .local_palette
            .as_deref()
            .or(self.global_palette.as_deref())
            .ok_or_else(|| Error::CorruptedImage("no color table".into()))?
            .to_vec();

        if self.composited_output() {
            self.composite(&frame, &indices, &palette);
            image.pixels_mut().copy_from_slice(&self.canvas);
        } else {
            image.pixels_mut().copy_from_slice(&indices);
            let count = palette.len() / 3;
            image.set_palette(Palette::new(PixelFormat::Rgb24, palette, count));
        }

        if self.options.meta_info {
            if let (Some(count), false) = (self.loop_count, self.loop_reported) {
                image.push_meta("LoopCount", count.to_string());
                self.loop_reported = true;
            }
            for comment in self.pending_comments.drain(..) {
                image.push_meta("Comment", comment);
            }
        }

        Ok(())
    }

    fn finish(&mut self, _io: &mut dyn IoStream) -> Result<()> {
        Ok(())
    }
}

/// Read one LZW code, least significant bit first.
fn read_code(data: &[u8], bit_pos: usize, code_size: u8) -> u16 {
    let mut value = 0u16;
    for i in 0..code_size as usize {
        let bit = bit_pos + i;
        if data[bit / 8] >> (bit % 8) & 1 == 1 {
            value |= 1 << i;
        }
    }
    value
}

/// Decode a GIF LZW stream into `expected` palette indices.
///
/// Truncated streams yield zero-padded output rather than an error, which
/// matches how widely-deployed decoders treat short final frames.
fn lzw_decode(data: &[u8], min_code_size: u8, expected: usize) -> Result<Vec<u8>> {
    let clear_code = 1u16 << min_code_size;
    let eoi_code = clear_code + 1;

    let mut prefix = vec![0u16; MAX_TABLE_SIZE];
    let mut suffix = vec![0u8; MAX_TABLE_SIZE];
    for i in 0..clear_code {
        suffix[i as usize] = i as u8;
    }

    let mut next_code = eoi_code + 1;
    let mut code_size = min_code_size + 1;
    let mut prev_code: Option<u16> = None;
    let mut first_byte = 0u8;

    let mut output = Vec::with_capacity(expected);
    let mut stack = Vec::with_capacity(MAX_TABLE_SIZE);

    let total_bits = data.len() * 8;
    let mut bit_pos = 0usize;

    while output.len() < expected {
        if bit_pos + code_size as usize > total_bits {
            break;
        }
        let code = read_code(data, bit_pos, code_size);
        bit_pos += code_size as usize;

        if code == clear_code {
            next_code = eoi_code + 1;
            code_size = min_code_size + 1;
            prev_code = None;
            continue;
        }
        if code == eoi_code {
            break;
        }

        let mut current = code;
        if code >= next_code {
            // Only the just-about-to-be-defined code is legal here.
            let Some(prev) = prev_code else {
                return Err(Error::CorruptedImage("LZW code before any data".into()));
            };
            if code != next_code {
                return Err(Error::CorruptedImage(format!(
                    "LZW code {code} out of range"
                )));
            }
            stack.push(first_byte);
            current = prev;
        }

        while current >= clear_code {
            stack.push(suffix[current as usize]);
            current = prefix[current as usize];
        }
        first_byte = current as u8;
        stack.push(first_byte);

        while let Some(byte) = stack.pop() {
            output.push(byte);
        }

        if let Some(prev) = prev_code {
            if next_code < MAX_TABLE_SIZE as u16 {
                prefix[next_code as usize] = prev;
                suffix[next_code as usize] = first_byte;
                next_code += 1;

                if next_code == 1 << code_size && code_size < super::MAX_CODE_SIZE {
                    code_size += 1;
                }
            }
        }
        prev_code = Some(code);
    }

    output.resize(expected, 0);
    Ok(output)
}

/// Reorder interlaced rows into sequential order.
fn deinterlace(data: &[u8], width: usize) -> Vec<u8> {
    const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

    let height = data.len() / width;
    let mut output = vec![0u8; data.len()];
    let mut src_row = 0;

    for (start, step) in PASSES {
        let mut y = start;
        while y < height {
            output[y * width..(y + 1) * width]
                .copy_from_slice(&data[src_row * width..(src_row + 1) * width]);
            src_row += 1;
            y += step;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_code_lsb_first() {
        // 0b0000_0101: with 3-bit codes, first code is 0b101 = 5
        let data = [0x05u8];
        assert_eq!(read_code(&data, 0, 3), 5);
        assert_eq!(read_code(&data, 3, 3), 0);
    }

    #[test]
    fn test_lzw_round_trip_with_encoder() {
        let pixels = [0u8, 1, 1, 0, 2, 2, 1, 0, 0, 1, 2, 0];
        let mut encoded = Vec::new();
        super::super::encoder::lzw_encode(&pixels, 2, &mut encoded);

        let decoded = lzw_decode(&encoded, 2, pixels.len()).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn test_lzw_rejects_wild_code() {
        // 3-bit codes: clear=4, eoi=5; a first code of 7 is out of range.
        let data = [0b0111_1100u8];
        let result = lzw_decode(&data, 2, 8);
        assert!(matches!(result, Err(Error::CorruptedImage(_))));
    }

    #[test]
    fn test_deinterlace_restores_row_order() {
        let width = 2;
        let height = 8;
        // Interlaced row order for 8 rows: 0, 4, 2, 6, 1, 3, 5, 7
        let interlaced_order = [0u8, 4, 2, 6, 1, 3, 5, 7];
        let mut data = Vec::new();
        for row in interlaced_order {
            data.extend(std::iter::repeat(row).take(width));
        }

        let output = deinterlace(&data, width);
        for y in 0..height {
            assert_eq!(output[y * width], y as u8);
        }
    }
}
