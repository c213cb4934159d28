//! Decoding sessions.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use sail_codecs::{Codec, Decoder, ReadOptions};
use sail_core::{Error, FileStream, Image, IoStream, MemReader, Result};
use sail_plugin::{CodecRecord, Registry};

/// Stream owned by a session, or borrowed from the caller and returned
/// untouched at stop.
enum InputIo<'a> {
    Owned(Box<dyn IoStream + 'a>),
    Borrowed(&'a mut dyn IoStream),
}

impl InputIo<'_> {
    fn stream(&mut self) -> &mut dyn IoStream {
        match self {
            InputIo::Owned(io) => io.as_mut(),
            InputIo::Borrowed(io) => *io,
        }
    }
}

struct ActiveInput<'a> {
    io: InputIo<'a>,
    decoder: Box<dyn Decoder>,
    // The session keeps its own codec handle: a registry unload must not
    // drop the implementation while frames are still being decoded.
    _codec: Arc<dyn Codec>,
}

enum InputState<'a> {
    Idle,
    Active(ActiveInput<'a>),
    Failed {
        error: Error,
        active: ActiveInput<'a>,
    },
}

/// A decoding session: start, then pull frames one at a time, then stop.
///
/// ```no_run
/// use sail::ImageInput;
///
/// fn main() -> sail::Result<()> {
///     let mut input = ImageInput::new();
///     input.start_path("animation.gif")?;
///     loop {
///         match input.next_frame() {
///             Ok(frame) => println!("{}x{}", frame.width(), frame.height()),
///             Err(err) if err.is_no_more_frames() => break,
///             Err(err) => return Err(err),
///         }
///     }
///     input.stop()
/// }
/// ```
pub struct ImageInput<'a> {
    registry: &'a Registry,
    state: InputState<'a>,
}

impl<'a> ImageInput<'a> {
    /// Create a session using the process-wide registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::global(),
            state: InputState::Idle,
        }
    }

    /// Create a session over a specific registry.
    pub fn with_registry(registry: &'a Registry) -> Self {
        Self {
            registry,
            state: InputState::Idle,
        }
    }

    /// Start reading from a file, resolving the codec from the path
    /// extension or, failing that, from the file content.
    pub fn start_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.start_path_with(path, None, None)
    }

    /// Start reading from a file with an explicit codec and/or options.
    /// A codec hint wins over the path extension.
    pub fn start_path_with(
        &mut self,
        path: impl AsRef<Path>,
        codec: Option<&CodecRecord>,
        options: Option<ReadOptions>,
    ) -> Result<()> {
        self.ensure_idle()?;
        let path = path.as_ref();
        let registry = self.registry;

        let mut io: Box<dyn IoStream + 'a> = Box::new(FileStream::open(path)?);

        let record = match codec {
            Some(record) => record,
            None => match registry.by_path(path) {
                Some(record) => record,
                None => registry.by_magic(io.as_mut())?.ok_or_else(|| {
                    Error::PluginNotFound(path.display().to_string())
                })?,
            },
        };

        self.start_active(InputIo::Owned(io), record, options)
    }

    /// Start reading from a memory buffer. The caller keeps ownership of
    /// the buffer; it must outlive the session.
    pub fn start_mem(&mut self, data: &'a [u8]) -> Result<()> {
        self.start_mem_with(data, None, None)
    }

    /// Start reading from a memory buffer with an explicit codec and/or
    /// options.
    pub fn start_mem_with(
        &mut self,
        data: &'a [u8],
        codec: Option<&CodecRecord>,
        options: Option<ReadOptions>,
    ) -> Result<()> {
        self.ensure_idle()?;
        let registry = self.registry;

        let mut io: Box<dyn IoStream + 'a> = Box::new(MemReader::new(data));

        let record = match codec {
            Some(record) => record,
            None => registry
                .by_magic(io.as_mut())?
                .ok_or_else(|| Error::PluginNotFound("memory buffer".into()))?,
        };

        self.start_active(InputIo::Owned(io), record, options)
    }

    /// Start reading from a caller-supplied stream. The stream is
    /// borrowed and handed back untouched when the session stops.
    pub fn start_io(&mut self, io: &'a mut dyn IoStream) -> Result<()> {
        self.start_io_with(io, None, None)
    }

    /// Start reading from a caller-supplied stream with an explicit
    /// codec and/or options.
    pub fn start_io_with(
        &mut self,
        io: &'a mut dyn IoStream,
        codec: Option<&CodecRecord>,
        options: Option<ReadOptions>,
    ) -> Result<()> {
        self.ensure_idle()?;
        let registry = self.registry;

        let record = match codec {
            Some(record) => record,
            None => registry
                .by_magic(io)?
                .ok_or_else(|| Error::PluginNotFound("custom stream".into()))?,
        };

        self.start_active(InputIo::Borrowed(io), record, options)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            InputState::Idle => Ok(()),
            _ => Err(Error::ConflictingOperation),
        }
    }

    fn start_active(
        &mut self,
        mut io: InputIo<'a>,
        record: &CodecRecord,
        options: Option<ReadOptions>,
    ) -> Result<()> {
        let features = record.read_features();
        let options = options.unwrap_or_else(|| ReadOptions::from_features(features));
        options.validate(features)?;

        let codec = record.instance()?;
        let decoder = codec.read_init(io.stream(), &options)?;

        self.state = InputState::Active(ActiveInput {
            io,
            decoder,
            _codec: codec,
        });
        Ok(())
    }

    /// Decode the next frame. Returns [`Error::NoMoreFrames`] after the
    /// last frame without disturbing the session; any other error moves
    /// the session to the failed state, where only [`ImageInput::stop`]
    /// is useful.
    pub fn next_frame(&mut self) -> Result<Image> {
        let active = match &mut self.state {
            InputState::Idle => return Err(Error::StateNull),
            InputState::Failed { error, .. } => return Err(error.clone()),
            InputState::Active(active) => active,
        };

        let result = Self::decode_one(active);

        if let Err(error) = &result {
            if !error.is_no_more_frames() {
                let InputState::Active(active) =
                    std::mem::replace(&mut self.state, InputState::Idle)
                else {
                    unreachable!("state checked above");
                };
                self.state = InputState::Failed {
                    error: error.clone(),
                    active,
                };
            }
        }

        result
    }

    fn decode_one(active: &mut ActiveInput<'_>) -> Result<Image> {
        let header = active.decoder.seek_next_frame(active.io.stream())?;
        let mut image = Image::from_header(header)?;
        active.decoder.read_frame(active.io.stream(), &mut image)?;
        Ok(image)
    }

    /// Stop the session and release the codec state and the stream.
    /// Idempotent when idle. After a failed `next_frame`, the original
    /// error is returned and any further teardown error is only logged.
    pub fn stop(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, InputState::Idle) {
            InputState::Idle => Ok(()),
            InputState::Active(mut active) => active.decoder.finish(active.io.stream()),
            InputState::Failed { error, mut active } => {
                if let Err(finish_error) = active.decoder.finish(active.io.stream()) {
                    warn!(
                        error = %finish_error,
                        "secondary error while stopping a failed session"
                    );
                }
                Err(error)
            }
        }
    }
}

impl Default for ImageInput<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ImageInput<'_> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_core::PixelFormat;

    fn gray_pnm() -> Vec<u8> {
        let mut data = b"P5\n2 2\n255\n".to_vec();
        data.extend_from_slice(&[1, 2, 3, 4]);
        data
    }

    #[test]
    fn test_start_requires_idle() {
        let data = gray_pnm();
        let mut input = ImageInput::new();

        input.start_mem(&data).unwrap();
        assert_eq!(input.start_mem(&data), Err(Error::ConflictingOperation));

        input.stop().unwrap();
        input.start_mem(&data).unwrap();
        input.stop().unwrap();
    }

    #[test]
    fn test_next_frame_without_start() {
        let mut input = ImageInput::new();
        assert_eq!(input.next_frame().unwrap_err(), Error::StateNull);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut input = ImageInput::new();
        assert!(input.stop().is_ok());
        assert!(input.stop().is_ok());
    }

    #[test]
    fn test_mem_session_decodes_by_magic() {
        let data = gray_pnm();
        let mut input = ImageInput::new();
        input.start_mem(&data).unwrap();

        let frame = input.next_frame().unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.pixel_format(), PixelFormat::Grayscale8);
        assert_eq!(frame.pixels(), &[1, 2, 3, 4]);

        assert!(input.next_frame().unwrap_err().is_no_more_frames());
        // NoMoreFrames leaves the session usable.
        assert!(input.stop().is_ok());
    }

    #[test]
    fn test_failed_session_reports_first_error() {
        // Valid header, truncated raster.
        let data = b"P5\n4 4\n255\nxx".to_vec();
        let fresh = gray_pnm();
        let mut input = ImageInput::new();
        input.start_mem(&data).unwrap();

        let first = input.next_frame().unwrap_err();
        assert!(matches!(first, Error::ShortRead { .. }));

        // Subsequent calls and stop keep reporting the original error.
        assert_eq!(input.next_frame().unwrap_err(), first);
        assert_eq!(input.stop().unwrap_err(), first);

        // After stop, the session can start again.
        input.start_mem(&fresh).unwrap();
        input.stop().unwrap();
    }

    #[test]
    fn test_unvalidated_output_format_rejected() {
        let data = gray_pnm();
        let registry = Registry::global();
        let record = registry.by_name("pnm").unwrap();

        let options = ReadOptions::from_features(record.read_features())
            .with_output_pixel_format(PixelFormat::Yuv24);

        let mut input = ImageInput::new();
        let err = input
            .start_mem_with(&data, Some(record), Some(options))
            .unwrap_err();
        assert_eq!(err, Error::UnsupportedPixelFormat(PixelFormat::Yuv24));

        // The rejected start leaves the session idle.
        input.start_mem(&data).unwrap();
        input.stop().unwrap();
    }

    #[test]
    fn test_caller_stream_survives_session() {
        let data = gray_pnm();
        let mut stream = MemReader::new(&data);

        {
            let mut input = ImageInput::new();
            input.start_io(&mut stream).unwrap();
            input.next_frame().unwrap();
            input.stop().unwrap();
        }

        // The borrowed stream is still usable afterwards.
        assert!(stream.tell().unwrap() > 0);
    }
}
