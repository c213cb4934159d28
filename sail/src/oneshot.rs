//! One-shot convenience operations: probe, read, write.
//!
//! Each call composes start, one frame, and stop, with the first error
//! preserved and resources released on every path.

use std::path::Path;

use sail_codecs::WriteOptions;
use sail_core::{Error, FileStream, Image, ImageHeader, IoStream, MemReader, MemWriter, Result};
use sail_plugin::{CodecRecord, Registry};

use crate::input::ImageInput;
use crate::output::ImageOutput;

fn probe_stream<'r>(
    io: &mut dyn IoStream,
    registry: &'r Registry,
) -> Result<(ImageHeader, &'r CodecRecord)> {
    let record = registry
        .by_magic(io)?
        .ok_or_else(|| Error::PluginNotFound("stream content".into()))?;

    let codec = record.instance()?;
    let header = codec
        .probe(io)?
        .ok_or_else(|| Error::CorruptedImage("codec failed to parse the header".into()))?;

    Ok((header, record))
}

/// Probe a file: resolve the codec from the content and return the first
/// frame header without decoding pixels.
pub fn probe_path(path: impl AsRef<Path>) -> Result<(ImageHeader, &'static CodecRecord)> {
    let mut io = FileStream::open(path)?;
    probe_stream(&mut io, Registry::global())
}

/// Probe a memory buffer.
pub fn probe_mem(data: &[u8]) -> Result<(ImageHeader, &'static CodecRecord)> {
    let mut io = MemReader::new(data);
    probe_stream(&mut io, Registry::global())
}

/// Probe a caller-supplied stream. The stream position is restored.
pub fn probe_io(io: &mut dyn IoStream) -> Result<(ImageHeader, &'static CodecRecord)> {
    probe_stream(io, Registry::global())
}

fn finish_read(input: &mut ImageInput<'_>) -> Result<Image> {
    match input.next_frame() {
        Ok(image) => input.stop().map(|()| image),
        Err(error) => {
            let _ = input.stop();
            Err(error)
        }
    }
}

/// Decode the first frame of a file.
pub fn read_path(path: impl AsRef<Path>) -> Result<Image> {
    read_path_with(path, None)
}

/// Decode the first frame of a file with an explicit codec.
pub fn read_path_with(path: impl AsRef<Path>, codec: Option<&CodecRecord>) -> Result<Image> {
    let mut input = ImageInput::new();
    input.start_path_with(path, codec, None)?;
    finish_read(&mut input)
}

/// Decode the first frame of a memory buffer. The caller keeps ownership
/// of the buffer.
pub fn read_mem(data: &[u8]) -> Result<Image> {
    read_mem_with(data, None)
}

/// Decode the first frame of a memory buffer with an explicit codec.
pub fn read_mem_with(data: &[u8], codec: Option<&CodecRecord>) -> Result<Image> {
    let mut input = ImageInput::new();
    input.start_mem_with(data, codec, None)?;
    finish_read(&mut input)
}

/// Decode the first frame of a caller-supplied stream.
pub fn read_io(io: &mut dyn IoStream, codec: Option<&CodecRecord>) -> Result<Image> {
    let mut input = ImageInput::new();
    input.start_io_with(io, codec, None)?;
    finish_read(&mut input)
}

fn finish_write(output: &mut ImageOutput<'_>, image: &Image) -> Result<usize> {
    match output.next_frame(image) {
        Ok(()) => output.stop(),
        Err(error) => {
            let _ = output.stop();
            Err(error)
        }
    }
}

/// Encode an image to a file, resolving the codec from the path
/// extension. Returns the byte count written.
pub fn write_path(path: impl AsRef<Path>, image: &Image) -> Result<usize> {
    write_path_with(path, image, None, None)
}

/// Encode an image to a file with an explicit codec and/or options.
pub fn write_path_with(
    path: impl AsRef<Path>,
    image: &Image,
    codec: Option<&CodecRecord>,
    options: Option<WriteOptions>,
) -> Result<usize> {
    let mut output = ImageOutput::new();
    output.start_path_with(path, codec, options)?;
    finish_write(&mut output, image)
}

/// Encode an image into a fresh buffer.
pub fn write_mem(image: &Image, codec: &CodecRecord) -> Result<Vec<u8>> {
    write_mem_with(image, codec, None)
}

/// Encode an image into a fresh buffer with options.
pub fn write_mem_with(
    image: &Image,
    codec: &CodecRecord,
    options: Option<WriteOptions>,
) -> Result<Vec<u8>> {
    let mut output = ImageOutput::new();
    output.start_mem_with(codec, options)?;
    finish_write(&mut output, image)?;
    Ok(output.take_buffer().unwrap_or_default())
}

/// Encode an image into a caller-supplied fixed buffer. Returns the byte
/// count written; the buffer is never touched past that count.
pub fn write_mem_into(buf: &mut [u8], image: &Image, codec: &CodecRecord) -> Result<usize> {
    let mut sink = MemWriter::fixed(buf.len());

    let (frame_result, stop_result) = {
        let mut output = ImageOutput::new();
        output.start_io(&mut sink, codec)?;
        let frame_result = output.next_frame(image);
        let stop_result = output.stop();
        (frame_result, stop_result)
    };

    let bytes = sink.into_inner();
    let written = bytes.len().min(buf.len());
    buf[..written].copy_from_slice(&bytes[..written]);

    frame_result?;
    stop_result.map(|_| written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_core::PixelFormat;

    fn rgb_image() -> Image {
        let mut image = Image::new(4, 3, PixelFormat::Rgb24).unwrap();
        for (i, byte) in image.pixels_mut().iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        image
    }

    #[test]
    fn test_read_write_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.ppm");

        let original = rgb_image();
        let written = write_path(&path, &original).unwrap();
        assert_eq!(written, std::fs::metadata(&path).unwrap().len() as usize);

        let decoded = read_path(&path).unwrap();
        assert_eq!(decoded.pixels(), original.pixels());
    }

    #[test]
    fn test_probe_matches_read() {
        let registry = Registry::global();
        let codec = registry.by_name("pnm").unwrap();
        let encoded = write_mem(&rgb_image(), codec).unwrap();

        let (header, record) = probe_mem(&encoded).unwrap();
        assert_eq!(header.width, 4);
        assert_eq!(header.height, 3);
        assert_eq!(header.pixel_format, PixelFormat::Rgb24);
        assert!(record.metadata().description.contains("Portable"));
    }

    #[test]
    fn test_probe_unknown_content() {
        let err = probe_mem(b"not an image at all").unwrap_err();
        assert!(matches!(err, Error::PluginNotFound(_)));
    }

    #[test]
    fn test_write_mem_into_truncates_at_capacity() {
        let registry = Registry::global();
        let codec = registry.by_name("pnm").unwrap();

        let mut buf = [0xAAu8; 16];
        let err = write_mem_into(&mut buf, &rgb_image(), codec).unwrap_err();
        assert!(matches!(err, Error::ShortWrite { .. }));

        // The buffer holds only what was actually written.
        assert!(buf.starts_with(b"P6\n"));
    }

    #[test]
    fn test_write_path_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_path(dir.path().join("image.xyz"), &rgb_image()).unwrap_err();
        assert!(matches!(err, Error::PluginNotFound(_)));
    }
}
