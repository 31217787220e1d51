use std::io::{Error, ErrorKind, Seek, SeekFrom, Write};

/// The archive's output stream, seekable or not.
///
/// Both wrappers report the current position from the start of the archive so that header
/// offsets and compressed sizes can be derived from it.
pub trait CommonWrapper<W>: Write {
    fn get_written_bytes_count(&mut self) -> std::io::Result<u64>;

    fn is_seekable(&self) -> bool;

    /// Moves to an absolute position. Fails on a non seekable sink.
    fn seek_to(&mut self, position: u64) -> std::io::Result<u64>;

    fn get_into(self: Box<Self>) -> W;
}

/// A forward-only sink that counts the bytes going through it.
#[derive(Debug)]
pub struct WriteWrapper<W: Write> {
    writer: W,
    written_bytes_count: u64,
}

impl<W: Write> WriteWrapper<W> {
    pub fn new(w: W) -> WriteWrapper<W> {
        Self {
            writer: w,
            written_bytes_count: 0,
        }
    }
}

impl<W: Write> Write for WriteWrapper<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let nb_byte_written = self.writer.write(buf)?;
        self.written_bytes_count += nb_byte_written as u64;
        Ok(nb_byte_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write> CommonWrapper<W> for WriteWrapper<W> {
    fn get_written_bytes_count(&mut self) -> std::io::Result<u64> {
        Ok(self.written_bytes_count)
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn seek_to(&mut self, _position: u64) -> std::io::Result<u64> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "the archive sink is not seekable",
        ))
    }

    fn get_into(self: Box<Self>) -> W {
        self.writer
    }
}

/// A seekable sink. The archive is expected to start at position 0.
#[derive(Debug)]
pub struct WriteSeekWrapper<WS: Write + Seek> {
    writer: WS,
    position: u64,
}

impl<W: Write + Seek> WriteSeekWrapper<W> {
    pub fn new(w: W) -> WriteSeekWrapper<W> {
        Self {
            writer: w,
            position: 0,
        }
    }
}

impl<W: Write + Seek> Write for WriteSeekWrapper<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let nb_byte_written = self.writer.write(buf)?;
        self.position += nb_byte_written as u64;
        Ok(nb_byte_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write + Seek> CommonWrapper<W> for WriteSeekWrapper<W> {
    fn get_written_bytes_count(&mut self) -> std::io::Result<u64> {
        Ok(self.position)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, position: u64) -> std::io::Result<u64> {
        self.position = self.writer.seek(SeekFrom::Start(position))?;
        Ok(self.position)
    }

    fn get_into(self: Box<Self>) -> W {
        self.writer
    }
}
