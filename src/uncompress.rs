//! Reading back the directory of an archive.

use std::fmt::{Debug, Display};
use std::io::{Read, Seek, SeekFrom};

use crate::central_directory_end::{find_central_directory_end, CentralDirectoryEnd};
use crate::constants::FILE_HEADER_BASE_SIZE;
use crate::descriptor::ArchiveDescriptorReader;
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::{CentralDirectoryHeader, LocalFileHeader};

pub struct ArchiveReader<R>
where
    R: Read + Seek,
{
    reader: R,
    entries: Vec<CentralDirectoryHeader>,
    central_directory_end: CentralDirectoryEnd,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Locates the end of central directory and decodes every central directory header.
    pub fn new(mut reader: R) -> ArchiveResult<ArchiveReader<R>> {
        let (central_directory_end, position) = find_central_directory_end(&mut reader)?;
        tracing::debug!(
            "end of central directory at {}: {} entries",
            position,
            central_directory_end.total_number_of_entries_in_the_central_directory
        );

        let entries = Self::read_central_directory(&central_directory_end, position, &mut reader)?;

        Ok(ArchiveReader {
            reader,
            entries,
            central_directory_end,
        })
    }

    /// Reads the directory, which must end before the end of central directory record found
    /// at `end_position`.
    fn read_central_directory(
        central_directory_end: &CentralDirectoryEnd,
        end_position: u64,
        reader: &mut R,
    ) -> ArchiveResult<Vec<CentralDirectoryHeader>> {
        let start = central_directory_end.offset_of_start_of_central_directory;
        let size = central_directory_end.central_directory_size;
        match start.checked_add(size) {
            Some(end) if end <= end_position => {}
            _ => {
                return Err(ArchiveError::BadArchiveStructure(format!(
                    "central directory of {size} bytes at {start} overruns its end record at {end_position}"
                )))
            }
        }

        reader.seek(SeekFrom::Start(start))?;
        let mut central_directory_buffer: Vec<u8> = vec![0; size as usize];
        reader.read_exact(&mut central_directory_buffer)?;

        let mut indexer =
            ArchiveDescriptorReader::new(&central_directory_buffer, "central directory");
        let mut entries = Vec::new();
        for _ in 0..central_directory_end.total_number_of_entries_in_the_central_directory {
            entries.push(CentralDirectoryHeader::parse(&mut indexer)?);
        }

        if indexer.remaining() > 0 {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "{} unexpected bytes after the central directory entries",
                indexer.remaining()
            )));
        }

        Ok(entries)
    }

    pub fn entries(&self) -> &[CentralDirectoryHeader] {
        &self.entries
    }

    pub fn central_directory_end(&self) -> &CentralDirectoryEnd {
        &self.central_directory_end
    }

    /// Decodes the local file header of an entry listed in the central directory.
    pub fn read_local_header(
        &mut self,
        entry: &CentralDirectoryHeader,
    ) -> ArchiveResult<LocalFileHeader> {
        let offset = entry.entry.offset;
        let mut fixed = [0u8; FILE_HEADER_BASE_SIZE];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut fixed)?;

        // name and extra field lengths close the fixed part
        let mut indexer = ArchiveDescriptorReader::new(&fixed[26..], "local file header");
        let variable_length = indexer.read_u16()? as usize + indexer.read_u16()? as usize;

        let mut header = fixed.to_vec();
        header.resize(FILE_HEADER_BASE_SIZE + variable_length, 0);
        self.reader.read_exact(&mut header[FILE_HEADER_BASE_SIZE..])?;

        LocalFileHeader::parse(&header, offset)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Debug for ArchiveReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("entries", &self.entries)
            .field("central_directory_end", &self.central_directory_end)
            .finish()
    }
}

impl<R: Read + Seek> Display for ArchiveReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(archive_comment) = &self.central_directory_end.archive_comment {
            writeln!(
                f,
                "The zipfile comment is {} bytes long and contains the following text:",
                archive_comment.len()
            )?;
            writeln!(
                f,
                "======================== zipfile comment begins =========================="
            )?;
            writeln!(f, "{}", String::from_utf8_lossy(archive_comment))?;
            writeln!(
                f,
                "========================= zipfile comment ends ==========================="
            )?;
        } else {
            writeln!(f, "There is no zipfile comment.")?;
        }
        writeln!(f)?;
        writeln!(f, "End-of-central-directory record:")?;
        writeln!(f, "-------------------------------")?;
        writeln!(f)?;
        writeln!(f, "{:?}", self.central_directory_end)?;

        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Central directory entry #{}", i + 1)?;
            writeln!(f, "---------------------------")?;
            writeln!(f)?;
            write!(f, "{}", entry.entry)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::compress::archive::AppxArchive;
    use crate::compress::FileOptions;
    use crate::compression::{CompressionMethod, Level};
    use crate::constants::{
        END_OF_CENTRAL_DIRECTORY_SIZE, ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIZE,
        ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE,
    };
    use crate::error::ArchiveError;

    use super::ArchiveReader;

    /// One deflated entry, as written by another zip library.
    const FOREIGN_ARCHIVE: [u8; 172] = [
        0x50, 0x4b, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x21, 0x00, 0x00,
        0x82, 0xea, 0xc6, 0x24, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x13, 0x00, 0x00, 0x00,
        0x73, 0x68, 0x6f, 0x72, 0x74, 0x5f, 0x74, 0x65, 0x78, 0x74, 0x5f, 0x66, 0x69, 0x6c, 0x65,
        0x2e, 0x74, 0x78, 0x74, 0xed, 0xcd, 0xb9, 0x11, 0x00, 0x30, 0x08, 0x03, 0xb0, 0x3e, 0xd3,
        0xc4, 0xfc, 0xec, 0xbf, 0x18, 0x53, 0x70, 0x47, 0xe1, 0x4e, 0x9d, 0x20, 0x6a, 0x1e, 0x59,
        0xfd, 0xb1, 0xa6, 0x07, 0x26, 0x4c, 0x98, 0x5c, 0x4c, 0x06, 0x50, 0x4b, 0x01, 0x02, 0x2e,
        0x03, 0x14, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x21, 0x00, 0x00, 0x82, 0xea, 0xc6,
        0x24, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x13, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0xa4, 0x81, 0x00, 0x00, 0x00, 0x00, 0x73, 0x68, 0x6f, 0x72,
        0x74, 0x5f, 0x74, 0x65, 0x78, 0x74, 0x5f, 0x66, 0x69, 0x6c, 0x65, 0x2e, 0x74, 0x78, 0x74,
        0x50, 0x4b, 0x05, 0x06, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x41, 0x00, 0x00,
        0x00, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn reads_a_foreign_archive() -> Result<(), ArchiveError> {
        let mut archive = ArchiveReader::new(Cursor::new(FOREIGN_ARCHIVE.to_vec()))?;

        let end = archive.central_directory_end();
        assert_eq!(end.total_number_of_entries_in_the_central_directory, 1);
        assert_eq!(end.central_directory_size, 0x41);
        assert_eq!(end.offset_of_start_of_central_directory, 0x55);

        let central = archive.entries()[0].clone();
        assert_eq!(central.version_made_by, 0x032e);
        assert_eq!(central.external_file_attributes, 0x81a4_0000);
        assert_eq!(central.entry.file_name, "short_text_file.txt");
        assert_eq!(central.entry.compression_method, CompressionMethod::Deflate());
        assert_eq!(central.entry.crc32, 0xc6ea_8200);
        assert_eq!(central.entry.compressed_size, 36);
        assert_eq!(central.entry.uncompressed_size, 1024);

        let local = archive.read_local_header(&central)?;
        assert_eq!(local.file_name, central.entry.file_name);
        assert_eq!(local.compressed_size, 36);
        assert_eq!(local.size(), 30 + 19);

        let text = archive.to_string();
        assert!(text.contains("There is no zipfile comment."));
        assert!(text.contains("short_text_file.txt"));
        Ok(())
    }

    #[test]
    fn truncated_central_directory_is_rejected() {
        let mut bytes = FOREIGN_ARCHIVE.to_vec();
        // claim two entries
        bytes[158] = 2;
        bytes[160] = 2;
        assert!(matches!(
            ArchiveReader::new(Cursor::new(bytes)),
            Err(ArchiveError::BadArchiveStructure(_))
        ));
    }

    #[test]
    fn oversized_zip64_central_directory_is_rejected() -> Result<(), ArchiveError> {
        let mut archive = AppxArchive::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_level(Level::None)
            .declared_size(5_000_000_000);
        archive.add_file_with_options(
            &mut b"tiny".as_ref(),
            "big.bin",
            "application/octet-stream",
            &options,
        )?;
        let (_, sink) = archive.finish(&mut b"<Package/>".as_ref())?;
        let package = sink.into_inner();
        assert!(ArchiveReader::new(Cursor::new(package.as_slice())).is_ok());

        // central directory size field of the zip64 record
        let size_field = package.len()
            - END_OF_CENTRAL_DIRECTORY_SIZE
            - ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIZE
            - ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE
            + 40;
        for size in [u64::MAX / 2, u64::MAX] {
            let mut garbled = package.clone();
            garbled[size_field..size_field + 8].copy_from_slice(&size.to_le_bytes());
            assert!(matches!(
                ArchiveReader::new(Cursor::new(garbled)),
                Err(ArchiveError::BadArchiveStructure(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ArchiveReader::new(Cursor::new(vec![0x50u8; 64])).is_err());
    }
}
