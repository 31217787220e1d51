use std::str;

use crate::error::{ArchiveError, ArchiveResult};

/// Little-endian byte buffer in which records are assembled before being written out.
#[derive(Debug, Default)]
pub struct ArchiveDescriptor {
    buffer: Vec<u8>,
}

impl ArchiveDescriptor {
    pub fn new(capacity: usize) -> ArchiveDescriptor {
        ArchiveDescriptor {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u16(&mut self, val: u16) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u32(&mut self, val: u32) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u64(&mut self, val: u64) {
        self.buffer.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_bytes(&mut self, val: &[u8]) {
        self.buffer.extend_from_slice(val);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Cursor over an in-memory record. Every read is bounds checked.
pub struct ArchiveDescriptorReader<'a> {
    stream: &'a [u8],
    index: usize,
    record: &'static str,
}

macro_rules! read_type {
    ($self:expr, $typ:ty) => {{
        let bytes = $self.take(::std::mem::size_of::<$typ>())?;
        let mut read = [0u8; ::std::mem::size_of::<$typ>()];
        read.copy_from_slice(bytes);
        Ok(<$typ>::from_le_bytes(read))
    }};
}

impl<'a> ArchiveDescriptorReader<'a> {
    /// `record` names the structure being decoded, for error messages.
    pub fn new(stream: &'a [u8], record: &'static str) -> ArchiveDescriptorReader<'a> {
        ArchiveDescriptorReader {
            stream,
            index: 0,
            record,
        }
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.stream.len() - self.index
    }

    fn take(&mut self, len: usize) -> ArchiveResult<&'a [u8]> {
        let upper_bound = self
            .index
            .checked_add(len)
            .filter(|upper| *upper <= self.stream.len())
            .ok_or_else(|| ArchiveError::truncated(self.record))?;
        let value = &self.stream[self.index..upper_bound];
        self.index = upper_bound;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> ArchiveResult<u16> {
        read_type!(self, u16)
    }

    pub fn read_u32(&mut self) -> ArchiveResult<u32> {
        read_type!(self, u32)
    }

    pub fn read_u64(&mut self) -> ArchiveResult<u64> {
        read_type!(self, u64)
    }

    pub fn read_bytes(&mut self, len: usize) -> ArchiveResult<&'a [u8]> {
        self.take(len)
    }

    pub fn read_utf8_string(&mut self, len: usize) -> ArchiveResult<String> {
        let bytes = self.take(len)?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ArchiveError::InvalidUtf8Name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut desc = ArchiveDescriptor::new(32);
        desc.write_u16(0x1234);
        desc.write_u32(0xDEADBEEF);
        desc.write_u64(5_000_000_000);
        desc.write_bytes(b"abc");
        assert_eq!(desc.len(), 2 + 4 + 8 + 3);

        let bytes = desc.finish();
        let mut reader = ArchiveDescriptorReader::new(&bytes, "test record");
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_u64().unwrap(), 5_000_000_000);
        assert_eq!(reader.read_utf8_string(3).unwrap(), "abc");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_read_is_an_error() {
        let bytes = [1u8, 2, 3];
        let mut reader = ArchiveDescriptorReader::new(&bytes, "short record");
        assert!(reader.read_u16().is_ok());
        match reader.read_u32() {
            Err(ArchiveError::BadArchiveStructure(msg)) => assert!(msg.contains("short record")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
