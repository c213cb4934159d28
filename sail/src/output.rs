//! Encoding sessions.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use sail_codecs::{Codec, Encoder, WriteFeatures, WriteOptions};
use sail_core::{Error, FileStream, Image, IoStream, MemWriter, Result};
use sail_plugin::{CodecRecord, Registry};

enum OutputIo<'a> {
    /// Session-owned memory sink; its bytes are retrievable after stop.
    Memory(MemWriter),
    /// Session-owned stream, destroyed at stop.
    Owned(Box<dyn IoStream + 'a>),
    /// Caller-owned stream, handed back untouched at stop.
    Borrowed(&'a mut dyn IoStream),
}

impl OutputIo<'_> {
    fn stream(&mut self) -> &mut dyn IoStream {
        match self {
            OutputIo::Memory(io) => io,
            OutputIo::Owned(io) => io.as_mut(),
            OutputIo::Borrowed(io) => *io,
        }
    }
}

struct ActiveOutput<'a> {
    io: OutputIo<'a>,
    encoder: Box<dyn Encoder>,
    write_features: WriteFeatures,
    // The session keeps its own codec handle: a registry unload must not
    // drop the implementation while frames are still being encoded.
    _codec: Arc<dyn Codec>,
}

enum OutputState<'a> {
    Idle,
    Active(ActiveOutput<'a>),
    Failed {
        error: Error,
        active: ActiveOutput<'a>,
    },
}

/// An encoding session: start, push frames one at a time, then stop.
///
/// [`ImageOutput::stop`] reports the cumulative byte count written to the
/// destination; for memory sessions the encoded bytes are retrievable
/// with [`ImageOutput::take_buffer`] afterwards.
pub struct ImageOutput<'a> {
    registry: &'a Registry,
    state: OutputState<'a>,
    finished_buffer: Option<Vec<u8>>,
}

impl<'a> ImageOutput<'a> {
    /// Create a session using the process-wide registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::global(),
            state: OutputState::Idle,
            finished_buffer: None,
        }
    }

    /// Create a session over a specific registry.
    pub fn with_registry(registry: &'a Registry) -> Self {
        Self {
            registry,
            state: OutputState::Idle,
            finished_buffer: None,
        }
    }

    /// Start writing to a file, resolving the codec from the path
    /// extension.
    pub fn start_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.start_path_with(path, None, None)
    }

    /// Start writing to a file with an explicit codec and/or options.
    /// A codec hint wins over the path extension.
    pub fn start_path_with(
        &mut self,
        path: impl AsRef<Path>,
        codec: Option<&CodecRecord>,
        options: Option<WriteOptions>,
    ) -> Result<()> {
        self.ensure_idle()?;
        let path = path.as_ref();

        let record = match codec {
            Some(record) => record,
            None => self
                .registry
                .by_path(path)
                .ok_or_else(|| Error::PluginNotFound(path.display().to_string()))?,
        };

        let io: Box<dyn IoStream + 'a> = Box::new(FileStream::create(path)?);
        self.start_active(OutputIo::Owned(io), record, options)
    }

    /// Start writing to a growable memory buffer, retrievable with
    /// [`ImageOutput::take_buffer`] after stop.
    pub fn start_mem(&mut self, codec: &CodecRecord) -> Result<()> {
        self.start_mem_with(codec, None)
    }

    /// Start writing to a growable memory buffer with options.
    pub fn start_mem_with(
        &mut self,
        codec: &CodecRecord,
        options: Option<WriteOptions>,
    ) -> Result<()> {
        self.ensure_idle()?;
        self.start_active(OutputIo::Memory(MemWriter::new()), codec, options)
    }

    /// Start writing to a fixed-capacity memory buffer. Output beyond
    /// the capacity fails with `ShortWrite`; the bytes that fit are
    /// retrievable with [`ImageOutput::take_buffer`] after stop.
    pub fn start_mem_fixed(&mut self, capacity: usize, codec: &CodecRecord) -> Result<()> {
        self.ensure_idle()?;
        self.start_active(OutputIo::Memory(MemWriter::fixed(capacity)), codec, None)
    }

    /// Start writing to a caller-supplied stream, handed back untouched
    /// when the session stops.
    pub fn start_io(&mut self, io: &'a mut dyn IoStream, codec: &CodecRecord) -> Result<()> {
        self.start_io_with(io, codec, None)
    }

    /// Start writing to a caller-supplied stream with options.
    pub fn start_io_with(
        &mut self,
        io: &'a mut dyn IoStream,
        codec: &CodecRecord,
        options: Option<WriteOptions>,
    ) -> Result<()> {
        self.ensure_idle()?;
        self.start_active(OutputIo::Borrowed(io), codec, options)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            OutputState::Idle => Ok(()),
            _ => Err(Error::ConflictingOperation),
        }
    }

    fn start_active(
        &mut self,
        mut io: OutputIo<'a>,
        record: &CodecRecord,
        options: Option<WriteOptions>,
    ) -> Result<()> {
        let features = record.write_features();
        let options = options.unwrap_or_else(|| WriteOptions::from_features(features));
        options.validate(features)?;

        let codec = record.instance()?;
        let encoder = codec.write_init(io.stream(), &options)?;

        self.finished_buffer = None;
        self.state = OutputState::Active(ActiveOutput {
            io,
            encoder,
            write_features: features.clone(),
            _codec: codec,
        });
        Ok(())
    }

    /// Encode one frame. The image is validated against the codec's
    /// write features first; a validation failure rejects the frame
    /// without disturbing the session.
    pub fn next_frame(&mut self, image: &Image) -> Result<()> {
        let active = match &mut self.state {
            OutputState::Idle => return Err(Error::StateNull),
            OutputState::Failed { error, .. } => return Err(error.clone()),
            OutputState::Active(active) => active,
        };

        image.check()?;
        if !active
            .write_features
            .output_pixel_formats
            .contains(&image.pixel_format())
        {
            return Err(Error::UnsupportedPixelFormat(image.pixel_format()));
        }

        let result = active
            .encoder
            .seek_next_frame(active.io.stream(), image)
            .and_then(|()| active.encoder.write_frame(active.io.stream(), image));

        if let Err(error) = &result {
            let OutputState::Active(active) =
                std::mem::replace(&mut self.state, OutputState::Idle)
            else {
                unreachable!("state checked above");
            };
            self.state = OutputState::Failed {
                error: error.clone(),
                active,
            };
        }

        result
    }

    /// Stop the session, finalize the container, and return the
    /// cumulative byte count written. Idempotent when idle. After a
    /// failed `next_frame`, the original error is returned and any
    /// further teardown error is only logged.
    pub fn stop(&mut self) -> Result<usize> {
        match std::mem::replace(&mut self.state, OutputState::Idle) {
            OutputState::Idle => Ok(0),
            OutputState::Active(mut active) => {
                let finish = active.encoder.finish(active.io.stream());
                let written = self.salvage(active.io);
                finish.map(|()| written)
            }
            OutputState::Failed { error, mut active } => {
                if let Err(finish_error) = active.encoder.finish(active.io.stream()) {
                    warn!(
                        error = %finish_error,
                        "secondary error while stopping a failed session"
                    );
                }
                self.salvage(active.io);
                Err(error)
            }
        }
    }

    /// Count the written bytes and keep memory output reachable for
    /// [`ImageOutput::take_buffer`].
    fn salvage(&mut self, io: OutputIo<'_>) -> usize {
        match io {
            OutputIo::Memory(writer) => {
                let written = writer.written();
                self.finished_buffer = Some(writer.into_inner());
                written
            }
            OutputIo::Owned(mut stream) => stream.tell().unwrap_or(0) as usize,
            OutputIo::Borrowed(stream) => stream.tell().unwrap_or(0) as usize,
        }
    }

    /// The bytes of the last memory session, available once after stop.
    pub fn take_buffer(&mut self) -> Option<Vec<u8>> {
        self.finished_buffer.take()
    }
}

impl Default for ImageOutput<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ImageOutput<'_> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_core::PixelFormat;

    fn rgb_image() -> Image {
        let mut image = Image::new(2, 2, PixelFormat::Rgb24).unwrap();
        for (i, byte) in image.pixels_mut().iter_mut().enumerate() {
            *byte = i as u8;
        }
        image
    }

    #[test]
    fn test_mem_session_reports_written_count() {
        let registry = Registry::global();
        let record = registry.by_name("pnm").unwrap();

        let mut output = ImageOutput::new();
        output.start_mem(record).unwrap();
        output.next_frame(&rgb_image()).unwrap();

        let written = output.stop().unwrap();
        let buffer = output.take_buffer().unwrap();
        assert_eq!(written, buffer.len());
        assert!(buffer.starts_with(b"P6\n"));
    }

    #[test]
    fn test_start_requires_idle() {
        let registry = Registry::global();
        let record = registry.by_name("pnm").unwrap();

        let mut output = ImageOutput::new();
        output.start_mem(record).unwrap();
        assert_eq!(output.start_mem(record), Err(Error::ConflictingOperation));
        output.stop().unwrap();
    }

    #[test]
    fn test_wrong_pixel_format_rejected_without_failing_session() {
        let registry = Registry::global();
        let record = registry.by_name("bmp").unwrap();

        let mut output = ImageOutput::new();
        output.start_mem(record).unwrap();

        // BMP does not accept RGB24 input.
        let err = output.next_frame(&rgb_image()).unwrap_err();
        assert_eq!(err, Error::UnsupportedPixelFormat(PixelFormat::Rgb24));

        // The session is still usable with an accepted format.
        let mut bgr = Image::new(2, 2, PixelFormat::Bgr24).unwrap();
        bgr.pixels_mut().fill(9);
        output.next_frame(&bgr).unwrap();
        assert!(output.stop().unwrap() > 0);
    }

    #[test]
    fn test_fixed_sink_overflow_reports_short_write() {
        let registry = Registry::global();
        let record = registry.by_name("pnm").unwrap();

        let mut output = ImageOutput::new();
        output.start_mem_fixed(16, record).unwrap();

        let mut image = Image::new(10, 10, PixelFormat::Rgb24).unwrap();
        image.pixels_mut().fill(1);

        let err = output.next_frame(&image).unwrap_err();
        assert!(matches!(err, Error::ShortWrite { .. }));

        // First error wins at stop; the truncated bytes stay reachable.
        assert_eq!(output.stop().unwrap_err(), err);
        let buffer = output.take_buffer().unwrap();
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_stop_idempotent() {
        let mut output = ImageOutput::new();
        assert_eq!(output.stop().unwrap(), 0);
        assert_eq!(output.stop().unwrap(), 0);
    }
}
