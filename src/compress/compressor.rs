use std::io::Write;

use flate2::write::DeflateEncoder;

use crate::compression::{CompressionMethod, Level};

/// Counts what reaches the archive sink so that each block's share of the output is known.
struct CountingWriter<'a, W: Write + ?Sized> {
    inner: &'a mut W,
    count: u64,
}

impl<'a, W: Write + ?Sized> Write for CountingWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

enum Encoder<'a, W: Write + ?Sized> {
    Store(CountingWriter<'a, W>),
    Deflate(DeflateEncoder<CountingWriter<'a, W>>),
}

/// Writes an entry's payload block by block, stored or deflated depending on the level.
///
/// Deflate output is sync-flushed at the end of every block so the number of compressed
/// bytes belonging to that block can be reported.
pub struct BlockCompressor<'a, W: Write + ?Sized> {
    encoder: Encoder<'a, W>,
}

impl<'a, W: Write + ?Sized> BlockCompressor<'a, W> {
    pub fn new(level: Level, writer: &'a mut W) -> Self {
        let counting_writer = CountingWriter {
            inner: writer,
            count: 0,
        };

        let encoder = match level.compression_method() {
            CompressionMethod::Store() => Encoder::Store(counting_writer),
            CompressionMethod::Deflate() => {
                Encoder::Deflate(DeflateEncoder::new(counting_writer, level.into()))
            }
        };

        Self { encoder }
    }

    /// Returns the compressed size of the block, `None` when storing.
    pub fn write_block(&mut self, buf: &[u8]) -> std::io::Result<Option<u64>> {
        match &mut self.encoder {
            Encoder::Store(writer) => {
                writer.write_all(buf)?;
                Ok(None)
            }
            Encoder::Deflate(encoder) => {
                let before = encoder.get_ref().count;
                encoder.write_all(buf)?;
                encoder.flush()?;
                Ok(Some(encoder.get_ref().count - before))
            }
        }
    }

    /// Bytes written to the sink so far.
    pub fn total_out(&self) -> u64 {
        match &self.encoder {
            Encoder::Store(writer) => writer.count,
            Encoder::Deflate(encoder) => encoder.get_ref().count,
        }
    }

    /// Ends the payload. Returns the bytes emitted by this final step (the closing deflate
    /// block), which belong to no block.
    pub fn flush(self) -> std::io::Result<u64> {
        match self.encoder {
            Encoder::Store(mut writer) => {
                writer.flush()?;
                Ok(0)
            }
            Encoder::Deflate(encoder) => {
                let before = encoder.get_ref().count;
                let mut writer = encoder.finish()?;
                writer.flush()?;
                Ok(writer.count - before)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Read;

    use flate2::read::DeflateDecoder;

    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 ^ (i / 7) as u8).collect()
    }

    #[test]
    fn store_passes_bytes_through() {
        let mut out = Vec::new();
        let mut compressor = BlockCompressor::new(Level::None, &mut out);
        assert_eq!(compressor.write_block(b"example").unwrap(), None);
        assert_eq!(compressor.write_block(b" two").unwrap(), None);
        assert_eq!(compressor.total_out(), 11);
        assert_eq!(compressor.flush().unwrap(), 0);
        assert_eq!(out, b"example two");
    }

    #[test]
    fn deflate_reports_per_block_sizes() {
        let data = sample(150_000);
        let mut out = Vec::new();
        let mut compressor = BlockCompressor::new(Level::Default, &mut out);

        let mut reported = 0;
        for block in data.chunks(65536) {
            let size = compressor.write_block(block).unwrap().unwrap();
            assert!(size > 0);
            reported += size;
        }
        assert_eq!(compressor.total_out(), reported);
        let trailing = compressor.flush().unwrap();

        assert_eq!(reported + trailing, out.len() as u64);

        let mut decoded = Vec::new();
        DeflateDecoder::new(out.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn deflate_empty_payload() {
        let mut out = Vec::new();
        let compressor = BlockCompressor::new(Level::Best, &mut out);
        let trailing = compressor.flush().unwrap();
        assert_eq!(trailing, out.len() as u64);

        let mut decoded = Vec::new();
        DeflateDecoder::new(out.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert!(decoded.is_empty());
    }
}
