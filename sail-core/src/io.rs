//! Uniform random-access byte streams over files, memory, and
//! caller-supplied implementations.
//!
//! Sessions own exactly one stream and hand it to the codec on every
//! call. Short reads at end-of-stream set the eof flag without erroring;
//! using a stream in the wrong direction fails with `InvalidIo`.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

pub use std::io::SeekFrom;

use crate::error::{Error, Result};

fn map_io_error(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::Interrupted => Error::InterruptedIo,
        std::io::ErrorKind::UnexpectedEof => Error::EndOfFile,
        _ => Error::InvalidIo(err.to_string()),
    }
}

/// Random-access byte source/sink used by codecs.
///
/// Callers may plug in their own implementation; an implementation that
/// returns [`Error::InterruptedIo`] aborts the running session, which is
/// the cancellation mechanism.
pub trait IoStream: Send {
    /// Current stream position.
    fn tell(&mut self) -> Result<u64>;

    /// Reposition the stream. Clears the eof flag.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Read up to `buf.len()` bytes, returning the number read. A short
    /// read at end-of-stream sets the eof flag and is not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write up to `buf.len()` bytes, returning the number written.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered writes.
    fn flush(&mut self) -> Result<()>;

    /// Whether a previous read hit end-of-stream.
    fn is_eof(&self) -> bool;

    /// Read exactly `buf.len()` bytes or fail with `ShortRead`.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::ShortRead {
                    wanted: buf.len(),
                    got: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Read a single byte or fail with `ShortRead`.
    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Write all of `buf` or fail with `ShortWrite`.
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(Error::ShortWrite {
                    wanted: buf.len(),
                    wrote: written,
                });
            }
            written += n;
        }
        Ok(())
    }

    /// Read from the current position to end-of-stream.
    fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = [0u8; 4096];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }
}

/// File-backed stream, opened read-only or create/truncate for writing.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    writable: bool,
    eof: bool,
}

impl FileStream {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::FileOpenError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            file,
            writable: false,
            eof: false,
        })
    }

    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::FileOpenError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            file,
            writable: true,
            eof: false,
        })
    }
}

impl IoStream for FileStream {
    fn tell(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(map_io_error)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.eof = false;
        self.file.seek(pos).map_err(map_io_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.writable {
            return Err(Error::InvalidIo("stream is write-only".into()));
        }
        let n = self.file.read(buf).map_err(map_io_error)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::InvalidIo("stream is read-only".into()));
        }
        self.file.write(buf).map_err(map_io_error)
    }

    fn flush(&mut self) -> Result<()> {
        if self.writable {
            self.file.flush().map_err(|e| Error::FileCloseError(e.to_string()))?;
        }
        Ok(())
    }

    fn is_eof(&self) -> bool {
        self.eof
    }
}

/// Read-only stream over a non-owning byte span.
pub struct MemReader<'a> {
    data: &'a [u8],
    pos: usize,
    eof: bool,
}

impl<'a> MemReader<'a> {
    /// Wrap a byte span. The caller keeps ownership of the storage.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            eof: false,
        }
    }

    /// Total length of the underlying span.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying span is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn resolve_seek(pos: SeekFrom, current: usize, end: usize) -> Result<usize> {
    let target = match pos {
        SeekFrom::Start(offset) => offset as i64,
        SeekFrom::Current(delta) => current as i64 + delta,
        SeekFrom::End(delta) => end as i64 + delta,
    };

    if target < 0 {
        return Err(Error::invalid_argument("seek before start of stream"));
    }
    Ok(target as usize)
}

impl IoStream for MemReader<'_> {
    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.data.len())?;
        self.eof = false;
        Ok(self.pos as u64)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if n < buf.len() {
            self.eof = true;
        }
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::InvalidIo("stream is read-only".into()))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_eof(&self) -> bool {
        self.eof
    }
}

/// Write stream over an owned buffer: growable by default, or capped at a
/// fixed capacity.
///
/// Writes beyond a fixed capacity store what fits and report the rest as
/// short; the buffer is never mutated past the written count.
pub struct MemWriter {
    buf: Vec<u8>,
    pos: usize,
    capacity: Option<usize>,
}

impl MemWriter {
    /// Create a growable memory sink.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            capacity: None,
        }
    }

    /// Create a fixed-capacity memory sink.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
            capacity: Some(capacity),
        }
    }

    /// Cumulative number of bytes stored in the buffer.
    pub fn written(&self) -> usize {
        self.buf.len()
    }

    /// Consume the sink and return the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for MemWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoStream for MemWriter {
    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.pos, self.buf.len())?;
        if let Some(capacity) = self.capacity {
            if target > capacity {
                return Err(Error::invalid_argument(
                    "seek beyond fixed buffer capacity",
                ));
            }
        }
        self.pos = target;
        Ok(self.pos as u64)
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::InvalidIo("stream is write-only".into()))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let writable = match self.capacity {
            Some(capacity) => capacity.saturating_sub(self.pos).min(buf.len()),
            None => buf.len(),
        };

        // A seek may have left a gap past the current end; fill it.
        if self.pos > self.buf.len() && writable > 0 {
            self.buf.resize(self.pos, 0);
        }

        let end = self.pos + writable;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(&buf[..writable]);
        self.pos = end;

        Ok(writable)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_eof(&self) -> bool {
        match self.capacity {
            Some(capacity) => self.pos >= capacity,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_reader_short_read_sets_eof() {
        let data = [1u8, 2, 3];
        let mut reader = MemReader::new(&data);

        let mut buf = [0u8; 8];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_mem_reader_seek_clears_eof() {
        let data = [1u8, 2, 3];
        let mut reader = MemReader::new(&data);
        let mut buf = [0u8; 8];
        reader.read(&mut buf).unwrap();
        assert!(reader.is_eof());

        reader.seek(SeekFrom::Start(0)).unwrap();
        assert!(!reader.is_eof());
        assert_eq!(reader.tell().unwrap(), 0);
    }

    #[test]
    fn test_mem_reader_rejects_write() {
        let data = [0u8; 4];
        let mut reader = MemReader::new(&data);
        assert!(matches!(reader.write(&[1]), Err(Error::InvalidIo(_))));
    }

    #[test]
    fn test_read_exact_reports_short_read() {
        let data = [1u8, 2];
        let mut reader = MemReader::new(&data);
        let mut buf = [0u8; 4];
        let err = reader.read_exact(&mut buf).unwrap_err();
        assert_eq!(err, Error::ShortRead { wanted: 4, got: 2 });
    }

    #[test]
    fn test_mem_writer_grows() {
        let mut writer = MemWriter::new();
        writer.write_all(&[1, 2, 3]).unwrap();
        writer.seek(SeekFrom::Start(10)).unwrap();
        writer.write_all(&[9]).unwrap();

        let buf = writer.into_inner();
        assert_eq!(buf.len(), 11);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(buf[10], 9);
    }

    #[test]
    fn test_mem_writer_overwrite_in_place() {
        let mut writer = MemWriter::new();
        writer.write_all(&[1, 2, 3, 4]).unwrap();
        writer.seek(SeekFrom::Start(1)).unwrap();
        writer.write_all(&[8, 8]).unwrap();
        assert_eq!(writer.into_inner(), vec![1, 8, 8, 4]);
    }

    #[test]
    fn test_fixed_writer_stops_at_capacity() {
        let mut writer = MemWriter::fixed(4);
        let n = writer.write(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(n, 4);
        assert!(writer.is_eof());

        let err = writer.write_all(&[7]).unwrap_err();
        assert_eq!(err, Error::ShortWrite { wanted: 1, wrote: 0 });
        assert_eq!(writer.written(), 4);
        assert_eq!(writer.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fixed_writer_rejects_seek_past_capacity() {
        let mut writer = MemWriter::fixed(4);
        assert!(writer.seek(SeekFrom::Start(4)).is_ok());
        assert!(writer.seek(SeekFrom::Start(5)).is_err());
    }

    #[test]
    fn test_file_stream_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.bin");

        let mut writer = FileStream::create(&path).unwrap();
        writer.write_all(&[10, 20, 30]).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut reader = FileStream::open(&path).unwrap();
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [10, 20, 30]);

        reader.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(reader.read_byte().unwrap(), 20);
    }

    #[test]
    fn test_file_stream_open_missing() {
        let err = FileStream::open("/definitely/not/here.bin").unwrap_err();
        assert!(matches!(err, Error::FileOpenError { .. }));
    }

    #[test]
    fn test_wrong_direction_is_invalid_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.bin");
        let mut writer = FileStream::create(&path).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(writer.read(&mut buf), Err(Error::InvalidIo(_))));
    }
}
