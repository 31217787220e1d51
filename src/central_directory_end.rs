use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::constants::{
    CENTRAL_DIRECTORY_END_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIZE, VERSION_NEEDED_ZIP64,
    ZIP64_BYTES_THR, ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE, ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE,
    ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIZE, ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE,
    ZIP64_ENTRY_THR,
};
use crate::descriptor::{ArchiveDescriptor, ArchiveDescriptorReader};
use crate::error::{ArchiveError, ArchiveResult};

/// End of central directory, in its widest (zip64) form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEnd {
    pub number_of_this_disk: u32,
    pub number_of_the_disk_with_central_directory: u32,
    pub total_number_of_entries_on_this_disk: u64,
    pub total_number_of_entries_in_the_central_directory: u64,
    pub central_directory_size: u64,
    pub offset_of_start_of_central_directory: u64,
    pub archive_comment: Option<Vec<u8>>,
}

/// Points from the end of the archive back to the zip64 end of central directory record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub number_of_the_disk_with_zip64_end_of_central_directory: u32,
    pub relative_offset_of_zip64_end_of_central_directory: u64,
    pub total_number_of_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub fn new(relative_offset_of_zip64_end_of_central_directory: u64) -> Self {
        Self {
            number_of_the_disk_with_zip64_end_of_central_directory: 0,
            relative_offset_of_zip64_end_of_central_directory,
            total_number_of_disks: 1,
        }
    }

    pub fn write(&self, end_of_central_directory: &mut ArchiveDescriptor) {
        end_of_central_directory.write_u32(ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE);
        end_of_central_directory
            .write_u32(self.number_of_the_disk_with_zip64_end_of_central_directory);
        end_of_central_directory.write_u64(self.relative_offset_of_zip64_end_of_central_directory);
        end_of_central_directory.write_u32(self.total_number_of_disks);
    }

    pub fn parse(stream: &[u8]) -> ArchiveResult<Self> {
        let mut indexer =
            ArchiveDescriptorReader::new(stream, "zip64 end of central directory locator");

        let signature = indexer.read_u32()?;
        if signature != ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE {
            return Err(ArchiveError::BadArchiveStructure(
                "Zip64 end of central directory locator signature not found".to_owned(),
            ));
        }

        Ok(Self {
            number_of_the_disk_with_zip64_end_of_central_directory: indexer.read_u32()?,
            relative_offset_of_zip64_end_of_central_directory: indexer.read_u64()?,
            total_number_of_disks: indexer.read_u32()?,
        })
    }
}

impl CentralDirectoryEnd {
    pub fn zip_file_comment_length(&self) -> u16 {
        match &self.archive_comment {
            Some(comment) => comment.len() as u16,
            None => 0,
        }
    }

    /// Stores the package comment written after the classic record.
    ///
    /// Kept as raw UTF-8 bytes, cut at 0xFFFF bytes.
    pub fn set_archive_comment(&mut self, comment: &str) {
        let bytes = comment.as_bytes();
        let len = std::cmp::min(bytes.len(), u16::MAX as usize);
        self.archive_comment = Some(bytes[0..len].to_owned());
    }

    /// Accounts for one more central directory header of `size` bytes.
    pub fn add_entry(&mut self, size: u64) {
        self.total_number_of_entries_on_this_disk += 1;
        self.total_number_of_entries_in_the_central_directory += 1;
        self.central_directory_size += size;
    }

    // APPNOTE 4.4.1.4: once a value no longer fits the classic record, its field holds
    // the all-ones sentinel and the zip64 record carries the real value.
    pub fn needs_zip64_format_extensions(&self) -> bool {
        self.number_of_this_disk >= u16::MAX as u32
            || self.number_of_the_disk_with_central_directory >= u16::MAX as u32
            || self.total_number_of_entries_on_this_disk >= ZIP64_ENTRY_THR
            || self.total_number_of_entries_in_the_central_directory >= ZIP64_ENTRY_THR
            || self.central_directory_size >= ZIP64_BYTES_THR
            || self.offset_of_start_of_central_directory >= ZIP64_BYTES_THR
    }

    pub fn create_zip64_end_of_central_directory_record(
        &self,
        end_of_central_directory: &mut ArchiveDescriptor,
    ) {
        const SIZE_OF_THE_EOCD64_MINUS_12: u64 = ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE as u64 - 12;

        end_of_central_directory.write_u32(ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE);
        end_of_central_directory.write_u64(SIZE_OF_THE_EOCD64_MINUS_12);
        end_of_central_directory.write_u16(VERSION_NEEDED_ZIP64);
        end_of_central_directory.write_u16(VERSION_NEEDED_ZIP64);
        end_of_central_directory.write_u32(self.number_of_this_disk);
        end_of_central_directory.write_u32(self.number_of_the_disk_with_central_directory);
        end_of_central_directory.write_u64(self.total_number_of_entries_on_this_disk);
        end_of_central_directory.write_u64(self.total_number_of_entries_in_the_central_directory);
        end_of_central_directory.write_u64(self.central_directory_size);
        end_of_central_directory.write_u64(self.offset_of_start_of_central_directory);
    }

    /// The zip64 record is expected to start right after the central directory.
    pub fn create_end_of_central_directory_locator(
        &self,
        end_of_central_directory: &mut ArchiveDescriptor,
    ) {
        Zip64EndOfCentralDirectoryLocator::new(
            self.offset_of_start_of_central_directory + self.central_directory_size,
        )
        .write(end_of_central_directory);
    }

    /// Writes the classic record; values that do not fit are replaced by `0xFFFF`/`0xFFFFFFFF`.
    pub fn create_end_of_central_directory(
        &self,
        end_of_central_directory: &mut ArchiveDescriptor,
    ) {
        end_of_central_directory.write_u32(CENTRAL_DIRECTORY_END_SIGNATURE);
        end_of_central_directory.write_u16(self.number_of_this_disk.min(u16::MAX as u32) as u16);
        end_of_central_directory.write_u16(
            self.number_of_the_disk_with_central_directory
                .min(u16::MAX as u32) as u16,
        );
        end_of_central_directory.write_u16(
            self.total_number_of_entries_on_this_disk
                .min(u16::MAX as u64) as u16,
        );
        end_of_central_directory.write_u16(
            self.total_number_of_entries_in_the_central_directory
                .min(u16::MAX as u64) as u16,
        );
        end_of_central_directory.write_u32(self.central_directory_size.min(u32::MAX as u64) as u32);
        end_of_central_directory.write_u32(
            self.offset_of_start_of_central_directory
                .min(u32::MAX as u64) as u32,
        );

        if let Some(comment) = &self.archive_comment {
            end_of_central_directory.write_u16(comment.len() as u16);
            end_of_central_directory.write_bytes(comment);
        } else {
            end_of_central_directory.write_u16(0);
        };
    }

    /// Decodes a classic record (signature included).
    pub fn parse(stream: &[u8]) -> ArchiveResult<Self> {
        let mut indexer = ArchiveDescriptorReader::new(stream, "end of central directory");

        if indexer.read_u32()? != CENTRAL_DIRECTORY_END_SIGNATURE {
            return Err(ArchiveError::BadArchiveStructure(
                "End of central directory signature not found".to_owned(),
            ));
        }

        let number_of_this_disk = indexer.read_u16()? as u32;
        let number_of_the_disk_with_central_directory = indexer.read_u16()? as u32;
        let total_number_of_entries_on_this_disk = indexer.read_u16()? as u64;
        let total_number_of_entries_in_the_central_directory = indexer.read_u16()? as u64;
        let central_directory_size = indexer.read_u32()? as u64;
        let offset_of_start_of_central_directory = indexer.read_u32()? as u64;
        let comment_length = indexer.read_u16()? as usize;
        // a comment cut short by the end of the stream is kept as far as it goes
        let comment = indexer.read_bytes(comment_length.min(indexer.remaining()))?;

        Ok(Self {
            number_of_this_disk,
            number_of_the_disk_with_central_directory,
            total_number_of_entries_on_this_disk,
            total_number_of_entries_in_the_central_directory,
            central_directory_size,
            offset_of_start_of_central_directory,
            archive_comment: (!comment.is_empty()).then(|| comment.to_vec()),
        })
    }

    /// Overrides the record with the values of a zip64 end of central directory record.
    pub fn parse_zip64_record(&mut self, stream: &[u8]) -> ArchiveResult<()> {
        let mut indexer = ArchiveDescriptorReader::new(stream, "zip64 end of central directory");

        if indexer.read_u32()? != ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE {
            return Err(ArchiveError::BadArchiveStructure(
                "Zip64 end of central directory signature not found".to_owned(),
            ));
        }

        let _size_of_record = indexer.read_u64()?;
        let _version_made_by = indexer.read_u16()?;
        let _version_needed = indexer.read_u16()?;
        self.number_of_this_disk = indexer.read_u32()?;
        self.number_of_the_disk_with_central_directory = indexer.read_u32()?;
        self.total_number_of_entries_on_this_disk = indexer.read_u64()?;
        self.total_number_of_entries_in_the_central_directory = indexer.read_u64()?;
        self.central_directory_size = indexer.read_u64()?;
        self.offset_of_start_of_central_directory = indexer.read_u64()?;

        Ok(())
    }

    /// True when a field of the classic record holds a zip64 sentinel.
    pub fn has_zip64_sentinel(&self) -> bool {
        self.number_of_this_disk == u16::MAX as u32
            || self.number_of_the_disk_with_central_directory == u16::MAX as u32
            || self.total_number_of_entries_on_this_disk == u16::MAX as u64
            || self.total_number_of_entries_in_the_central_directory == u16::MAX as u64
            || self.central_directory_size == u32::MAX as u64
            || self.offset_of_start_of_central_directory == u32::MAX as u64
    }
}

/// Locates and decodes the end of central directory of an archive.
///
/// The classic record is searched backward from the end of the stream, so data appended
/// after it is tolerated. When a zip64 locator precedes it, the zip64 record is read and its
/// 64-bit values win. Returns the record and the position of the classic record.
pub fn find_central_directory_end<R: Read + Seek>(
    reader: &mut R,
) -> ArchiveResult<(CentralDirectoryEnd, u64)> {
    let file_length = reader.seek(SeekFrom::End(0))?;

    let mut position: u64 = match file_length.checked_sub(END_OF_CENTRAL_DIRECTORY_SIZE as u64) {
        Some(p) => p,
        None => {
            return Err(ArchiveError::BadArchiveStructure(
                "Archive too small".to_owned(),
            ))
        }
    };

    let search_lower_bound =
        file_length.saturating_sub(END_OF_CENTRAL_DIRECTORY_SIZE as u64 + u16::MAX as u64);

    let tail_length = (file_length - search_lower_bound) as usize;
    let mut tail = vec![0u8; tail_length];
    reader.seek(SeekFrom::Start(search_lower_bound))?;
    reader.read_exact(&mut tail)?;

    let signature = CENTRAL_DIRECTORY_END_SIGNATURE.to_le_bytes();
    loop {
        let index = (position - search_lower_bound) as usize;
        if tail[index..index + 4] == signature {
            break;
        }
        if position == search_lower_bound {
            return Err(ArchiveError::BadArchiveStructure(
                "End of central directory signature not found".to_owned(),
            ));
        }
        position -= 1;
    }

    let index = (position - search_lower_bound) as usize;
    let mut central_directory_end = CentralDirectoryEnd::parse(&tail[index..])?;
    tracing::trace!("end of central directory found at {}", position);

    let locator_position =
        position.checked_sub(ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIZE as u64);
    let locator = match locator_position {
        Some(locator_position) => {
            reader.seek(SeekFrom::Start(locator_position))?;
            if reader.read_u32::<LittleEndian>()? == ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE {
                let mut buffer = vec![0u8; ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIZE];
                reader.seek(SeekFrom::Start(locator_position))?;
                reader.read_exact(&mut buffer)?;
                Some(Zip64EndOfCentralDirectoryLocator::parse(&buffer)?)
            } else {
                None
            }
        }
        None => None,
    };

    match locator {
        Some(locator) => {
            let mut buffer = vec![0u8; ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE];
            reader.seek(SeekFrom::Start(
                locator.relative_offset_of_zip64_end_of_central_directory,
            ))?;
            reader.read_exact(&mut buffer)?;
            central_directory_end.parse_zip64_record(&buffer)?;
        }
        None if central_directory_end.offset_of_start_of_central_directory
            == u32::MAX as u64 =>
        {
            return Err(ArchiveError::BadArchiveStructure(
                "Zip64 end of central directory locator not found".to_owned(),
            ));
        }
        None => {}
    }

    Ok((central_directory_end, position))
}
