//! Local and central file headers, the zip64 extended information field and the data
//! descriptor.
//!
//! Both header shapes share the entry fields of [`LocalFileHeader`]; the central header adds
//! the version made by, comment, disk and attribute fields and the local header offset.
//! Sizes and the offset are kept 64 bits wide in memory. When an entry needs zip64 the
//! 32-bit wire fields carry `0xFFFFFFFF` and the true values travel in a zip64 extra field,
//! which this crate always writes with its 24 byte payload (uncompressed size, compressed
//! size, local header offset).

use core::fmt;

use crate::compression::CompressionMethod;
use crate::constants::{
    CENTRAL_DIRECTORY_ENTRY_BASE_SIZE, CENTRAL_DIRECTORY_ENTRY_SIGNATURE,
    DATA_DESCRIPTOR_SIGNATURE, EXTENDED_LOCAL_HEADER_FLAG, FILE_HEADER_BASE_SIZE,
    LOCAL_FILE_HEADER_SIGNATURE, UTF8_NAME_FLAG, VERSION_NEEDED, VERSION_NEEDED_ZIP64,
    ZIP64_BYTES_THR,
};
use crate::descriptor::{ArchiveDescriptor, ArchiveDescriptorReader};
use crate::error::{ArchiveError, ArchiveResult};
use crate::types::DateTimeCS;

/// The following is the layout of the ZIP64 extended information "extra" block.
///
/// If one of the size or offset fields in the Local or Central directory record is too small
/// to hold the required data, a ZIP64 extended information record is created. The order of
/// the fields is fixed: original size, compressed size, local header offset and, optionally,
/// the disk start number.
///
/// Note: all fields stored in Intel low-byte/high-byte order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInformation {
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub header_offset: u64,
    pub disk_start_number: Option<u32>,
}

impl Zip64ExtendedInformation {
    pub const HEADER_ID: u16 = 0x0001;
    const DATA_SIZE: u16 = 3 * 8;
    const DATA_SIZE_WITH_DISK: u16 = 3 * 8 + 4;

    pub fn data_size(&self) -> u16 {
        match self.disk_start_number {
            Some(_) => Self::DATA_SIZE_WITH_DISK,
            None => Self::DATA_SIZE,
        }
    }

    /// Decodes the payload (without the 4 byte id/length prefix).
    pub fn parse(data: &[u8]) -> ArchiveResult<Self> {
        let size = data.len() as u16;
        if data.len() != Self::DATA_SIZE as usize
            && data.len() != Self::DATA_SIZE_WITH_DISK as usize
        {
            return Err(ArchiveError::InvalidExtraField {
                header_id: Self::HEADER_ID,
                size,
            });
        }

        let mut indexer = ArchiveDescriptorReader::new(data, "zip64 extra field");
        let uncompressed_size = indexer.read_u64()?;
        let compressed_size = indexer.read_u64()?;
        let header_offset = indexer.read_u64()?;
        let disk_start_number = if size == Self::DATA_SIZE_WITH_DISK {
            Some(indexer.read_u32()?)
        } else {
            None
        };

        Ok(Self {
            uncompressed_size,
            compressed_size,
            header_offset,
            disk_start_number,
        })
    }

    pub fn write(&self, archive_descriptor: &mut ArchiveDescriptor) {
        archive_descriptor.write_u16(Self::HEADER_ID);
        archive_descriptor.write_u16(self.data_size());
        archive_descriptor.write_u64(self.uncompressed_size);
        archive_descriptor.write_u64(self.compressed_size);
        archive_descriptor.write_u64(self.header_offset);
        if let Some(disk) = self.disk_start_number {
            archive_descriptor.write_u32(disk);
        }
    }
}

/// A sub-record of a header's extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Zip64(Zip64ExtendedInformation),
    /// Any other sub-field, carried through untouched.
    Unknown { header_id: u16, data: Vec<u8> },
}

impl ExtraField {
    pub fn header_id(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => Zip64ExtendedInformation::HEADER_ID,
            ExtraField::Unknown { header_id, .. } => *header_id,
        }
    }

    /// Bytes taken on the wire, id and length prefix included.
    pub fn size(&self) -> usize {
        4 + match self {
            ExtraField::Zip64(zip64) => zip64.data_size() as usize,
            ExtraField::Unknown { data, .. } => data.len(),
        }
    }

    pub fn write(&self, archive_descriptor: &mut ArchiveDescriptor) {
        match self {
            ExtraField::Zip64(zip64) => zip64.write(archive_descriptor),
            ExtraField::Unknown { header_id, data } => {
                archive_descriptor.write_u16(*header_id);
                archive_descriptor.write_u16(data.len() as u16);
                archive_descriptor.write_bytes(data);
            }
        }
    }

    /// Splits a whole extra field area into its typed sub-fields.
    pub fn parse_all(extra_field_as_bytes: &[u8]) -> ArchiveResult<Vec<ExtraField>> {
        let mut indexer = ArchiveDescriptorReader::new(extra_field_as_bytes, "extra field");
        let mut extra_fields = Vec::new();

        while indexer.remaining() > 0 {
            let header_id = indexer.read_u16()?;
            let data_size = indexer.read_u16()?;
            let data = indexer.read_bytes(data_size as usize)?;

            let extra_field = match header_id {
                Zip64ExtendedInformation::HEADER_ID => {
                    ExtraField::Zip64(Zip64ExtendedInformation::parse(data)?)
                }
                _ => ExtraField::Unknown {
                    header_id,
                    data: data.to_vec(),
                },
            };
            extra_fields.push(extra_field);
        }

        Ok(extra_fields)
    }
}

fn extra_fields_size(extra_fields: &[ExtraField]) -> usize {
    extra_fields.iter().map(ExtraField::size).sum()
}

/// UTF-8 is flagged only when the encoding is longer than the character count, that is when
/// the text is not plain ASCII.
fn needs_utf8_flag(text: &str) -> bool {
    text.len() != text.chars().count()
}

fn narrow(value: u64, zip64: bool) -> u32 {
    if zip64 {
        u32::MAX
    } else {
        value as u32
    }
}

/// The entry fields shared by the local and central headers, as a local file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub general_purpose_flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_file_time: u16,
    pub last_mod_file_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_name: String,
    /// Position of this header from the start of the archive. Only serialized in the central
    /// header and the zip64 extra field.
    pub offset: u64,
    pub extra_fields: Vec<ExtraField>,
}

impl LocalFileHeader {
    /// Builds the header written before the entry's payload, with CRC and sizes still zero.
    ///
    /// `zip64` reserves a zip64 extra field up front so the header keeps its size when the
    /// final values are written back.
    pub fn new(
        file_name: &str,
        compression_method: CompressionMethod,
        last_modified: DateTimeCS,
        offset: u64,
        base_flags: u16,
        zip64: bool,
    ) -> Self {
        let (last_mod_file_date, last_mod_file_time) = last_modified.ms_dos();

        let mut general_purpose_flags = base_flags;
        if needs_utf8_flag(file_name) {
            general_purpose_flags |= UTF8_NAME_FLAG;
        }

        let mut header = Self {
            version_needed: VERSION_NEEDED,
            general_purpose_flags,
            compression_method,
            last_mod_file_time,
            last_mod_file_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: file_name.to_owned(),
            offset,
            extra_fields: Vec::new(),
        };

        if zip64 {
            header.set_zip64();
        }

        header
    }

    pub fn zip64_extra_field(&self) -> Option<&Zip64ExtendedInformation> {
        self.extra_fields.iter().find_map(|extra_field| match extra_field {
            ExtraField::Zip64(zip64) => Some(zip64),
            _ => None,
        })
    }

    fn zip64_extra_field_mut(&mut self) -> Option<&mut Zip64ExtendedInformation> {
        self.extra_fields
            .iter_mut()
            .find_map(|extra_field| match extra_field {
                ExtraField::Zip64(zip64) => Some(zip64),
                _ => None,
            })
    }

    pub fn is_zip64(&self) -> bool {
        self.zip64_extra_field().is_some()
    }

    /// True when one of the sizes or the offset does not fit the 32-bit fields.
    pub fn requires_zip64(&self) -> bool {
        self.uncompressed_size >= ZIP64_BYTES_THR
            || self.compressed_size >= ZIP64_BYTES_THR
            || self.offset >= ZIP64_BYTES_THR
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.general_purpose_flags & EXTENDED_LOCAL_HEADER_FLAG != 0
    }

    /// Attaches a zip64 extra field holding the current sizes and offset.
    pub fn set_zip64(&mut self) {
        self.version_needed = VERSION_NEEDED_ZIP64;
        if !self.is_zip64() {
            self.extra_fields.push(ExtraField::Zip64(Zip64ExtendedInformation {
                uncompressed_size: self.uncompressed_size,
                compressed_size: self.compressed_size,
                header_offset: self.offset,
                disk_start_number: None,
            }));
        }
    }

    /// Records the final CRC and sizes. For a zip64 entry the extra field is rewritten rather
    /// than the narrow fields.
    pub fn update(&mut self, crc32: u32, compressed_size: u64, uncompressed_size: u64) {
        self.crc32 = crc32;
        self.compressed_size = compressed_size;
        self.uncompressed_size = uncompressed_size;

        let offset = self.offset;
        if let Some(zip64) = self.zip64_extra_field_mut() {
            zip64.uncompressed_size = uncompressed_size;
            zip64.compressed_size = compressed_size;
            zip64.header_offset = offset;
        }
    }

    pub fn extra_field_length(&self) -> u16 {
        extra_fields_size(&self.extra_fields) as u16
    }

    /// Bytes the local header takes on the wire.
    pub fn size(&self) -> usize {
        FILE_HEADER_BASE_SIZE + self.file_name.len() + self.extra_field_length() as usize
    }

    pub fn write(&self, archive_descriptor: &mut ArchiveDescriptor) {
        let zip64 = self.is_zip64();

        archive_descriptor.write_u32(LOCAL_FILE_HEADER_SIGNATURE);
        archive_descriptor.write_u16(self.version_needed);
        archive_descriptor.write_u16(self.general_purpose_flags);
        archive_descriptor.write_u16(self.compression_method.zip_code());
        archive_descriptor.write_u16(self.last_mod_file_time);
        archive_descriptor.write_u16(self.last_mod_file_date);
        archive_descriptor.write_u32(self.crc32);
        archive_descriptor.write_u32(narrow(self.compressed_size, zip64));
        archive_descriptor.write_u32(narrow(self.uncompressed_size, zip64));
        archive_descriptor.write_u16(self.file_name.len() as u16);
        archive_descriptor.write_u16(self.extra_field_length());
        archive_descriptor.write_bytes(self.file_name.as_bytes());
        for extra_field in &self.extra_fields {
            extra_field.write(archive_descriptor);
        }
    }

    /// Decodes a local file header located at `offset` in the archive.
    pub fn parse(stream: &[u8], offset: u64) -> ArchiveResult<Self> {
        let mut indexer = ArchiveDescriptorReader::new(stream, "local file header");

        let signature = indexer.read_u32()?;
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "Local file header signature not found, got 0x{:08X}",
                signature
            )));
        }

        let version_needed = indexer.read_u16()?;
        let general_purpose_flags = indexer.read_u16()?;
        let compression_method = CompressionMethod::from_compression_method(indexer.read_u16()?)?;
        let last_mod_file_time = indexer.read_u16()?;
        let last_mod_file_date = indexer.read_u16()?;
        let crc32 = indexer.read_u32()?;
        let compressed_size = indexer.read_u32()?;
        let uncompressed_size = indexer.read_u32()?;
        let file_name_len = indexer.read_u16()?;
        let extra_field_length = indexer.read_u16()?;
        let file_name = indexer.read_utf8_string(file_name_len as usize)?;
        let extra_fields = ExtraField::parse_all(indexer.read_bytes(extra_field_length as usize)?)?;

        let mut header = Self {
            version_needed,
            general_purpose_flags,
            compression_method,
            last_mod_file_time,
            last_mod_file_date,
            crc32,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            file_name,
            offset,
            extra_fields,
        };
        header.apply_zip64_values(compressed_size, uncompressed_size, None);

        Ok(header)
    }

    /// Replaces sentinel narrow fields by the values of the zip64 extra field, if any.
    fn apply_zip64_values(
        &mut self,
        compressed_size: u32,
        uncompressed_size: u32,
        offset: Option<u32>,
    ) {
        if let Some(zip64) = self.zip64_extra_field().cloned() {
            if uncompressed_size == u32::MAX {
                self.uncompressed_size = zip64.uncompressed_size;
            }
            if compressed_size == u32::MAX {
                self.compressed_size = zip64.compressed_size;
            }
            if offset == Some(u32::MAX) {
                self.offset = zip64.header_offset;
            }
        }
    }

    pub fn last_modified(&self) -> DateTimeCS {
        DateTimeCS::from_msdos(self.last_mod_file_date, self.last_mod_file_time)
    }
}

impl fmt::Display for LocalFileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let padding = 48;

        writeln!(f, "{: <padding$}{}", "file name:", self.file_name)?;
        writeln!(
            f,
            "{: <padding$}{}",
            "offset of local header from start of archive:", self.offset
        )?;
        writeln!(
            f,
            "{: <padding$}{}.{}",
            "minimum software version required to extract:",
            self.version_needed / 10,
            self.version_needed % 10
        )?;
        writeln!(
            f,
            "{: <padding$}{:#018b}",
            "general purpose bit flag:", self.general_purpose_flags
        )?;
        writeln!(
            f,
            "{: <padding$}{}",
            "compression method:", self.compression_method
        )?;
        writeln!(
            f,
            "{: <padding$}{}",
            "file last modified on (DOS date/time):",
            self.last_modified()
        )?;
        writeln!(f, "{: <padding$}{:x}", "32-bit CRC value (hex):", self.crc32)?;
        writeln!(
            f,
            "{: <padding$}{} bytes",
            "compressed size:", self.compressed_size
        )?;
        writeln!(
            f,
            "{: <padding$}{} bytes",
            "uncompressed size:", self.uncompressed_size
        )
    }
}

/// A central directory record: the entry as finalized plus the fields only the central
/// directory carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub entry: LocalFileHeader,
    pub file_comment: String,
    pub disk_number_start: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
}

impl CentralDirectoryHeader {
    /// Derives the central record of a finalized local header.
    ///
    /// The zip64 extra field is rebuilt from the true sizes and offset whenever the local
    /// entry was zip64 or one of those values overflows 32 bits.
    pub fn from_local(local: &LocalFileHeader, version_made_by: u16) -> Self {
        let mut entry = local.clone();
        let zip64 = entry.is_zip64() || entry.requires_zip64();

        entry
            .extra_fields
            .retain(|extra_field| !matches!(extra_field, ExtraField::Zip64(_)));
        if zip64 {
            entry.set_zip64();
        }

        Self {
            version_made_by,
            entry,
            file_comment: String::new(),
            disk_number_start: 0,
            internal_file_attributes: 0,
            external_file_attributes: 0,
        }
    }

    pub fn is_zip64(&self) -> bool {
        self.entry.is_zip64()
    }

    fn general_purpose_flags(&self) -> u16 {
        if needs_utf8_flag(&self.file_comment) {
            self.entry.general_purpose_flags | UTF8_NAME_FLAG
        } else {
            self.entry.general_purpose_flags
        }
    }

    /// Bytes the central header takes on the wire.
    pub fn size(&self) -> usize {
        CENTRAL_DIRECTORY_ENTRY_BASE_SIZE
            + self.entry.file_name.len()
            + self.entry.extra_field_length() as usize
            + self.file_comment.len()
    }

    pub fn write(&self, archive_descriptor: &mut ArchiveDescriptor) {
        let entry = &self.entry;
        let zip64 = self.is_zip64();

        archive_descriptor.write_u32(CENTRAL_DIRECTORY_ENTRY_SIGNATURE);
        archive_descriptor.write_u16(self.version_made_by);
        archive_descriptor.write_u16(entry.version_needed);
        archive_descriptor.write_u16(self.general_purpose_flags());
        archive_descriptor.write_u16(entry.compression_method.zip_code());
        archive_descriptor.write_u16(entry.last_mod_file_time);
        archive_descriptor.write_u16(entry.last_mod_file_date);
        archive_descriptor.write_u32(entry.crc32);
        archive_descriptor.write_u32(narrow(entry.compressed_size, zip64));
        archive_descriptor.write_u32(narrow(entry.uncompressed_size, zip64));
        archive_descriptor.write_u16(entry.file_name.len() as u16);
        archive_descriptor.write_u16(entry.extra_field_length());
        archive_descriptor.write_u16(self.file_comment.len() as u16);
        archive_descriptor.write_u16(self.disk_number_start);
        archive_descriptor.write_u16(self.internal_file_attributes);
        archive_descriptor.write_u32(self.external_file_attributes);
        archive_descriptor.write_u32(narrow(entry.offset, zip64));
        archive_descriptor.write_bytes(entry.file_name.as_bytes());
        for extra_field in &entry.extra_fields {
            extra_field.write(archive_descriptor);
        }
        archive_descriptor.write_bytes(self.file_comment.as_bytes());
    }

    /// Decodes the next central header from `indexer`.
    pub fn parse(indexer: &mut ArchiveDescriptorReader) -> ArchiveResult<Self> {
        let signature = indexer.read_u32()?;
        if signature != CENTRAL_DIRECTORY_ENTRY_SIGNATURE {
            return Err(ArchiveError::BadArchiveStructure(format!(
                "Central directory signature not found, got 0x{:08X}",
                signature
            )));
        }

        let version_made_by = indexer.read_u16()?;
        let version_needed = indexer.read_u16()?;
        let general_purpose_flags = indexer.read_u16()?;
        let compression_method = CompressionMethod::from_compression_method(indexer.read_u16()?)?;
        let last_mod_file_time = indexer.read_u16()?;
        let last_mod_file_date = indexer.read_u16()?;
        let crc32 = indexer.read_u32()?;
        let compressed_size = indexer.read_u32()?;
        let uncompressed_size = indexer.read_u32()?;
        let file_name_len = indexer.read_u16()?;
        let extra_field_length = indexer.read_u16()?;
        let file_comment_length = indexer.read_u16()?;
        let disk_number_start = indexer.read_u16()?;
        let internal_file_attributes = indexer.read_u16()?;
        let external_file_attributes = indexer.read_u32()?;
        let offset = indexer.read_u32()?;
        let file_name = indexer.read_utf8_string(file_name_len as usize)?;
        let extra_fields = ExtraField::parse_all(indexer.read_bytes(extra_field_length as usize)?)?;
        let file_comment = indexer.read_utf8_string(file_comment_length as usize)?;

        let mut entry = LocalFileHeader {
            version_needed,
            general_purpose_flags,
            compression_method,
            last_mod_file_time,
            last_mod_file_date,
            crc32,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            file_name,
            offset: offset as u64,
            extra_fields,
        };
        entry.apply_zip64_values(compressed_size, uncompressed_size, Some(offset));

        Ok(Self {
            version_made_by,
            entry,
            file_comment,
            disk_number_start,
            internal_file_attributes,
            external_file_attributes,
        })
    }
}

/// Writes the record following a streamed entry's payload. Sizes are 64 bits wide when the
/// entry needs zip64.
pub fn write_data_descriptor(
    archive_descriptor: &mut ArchiveDescriptor,
    entry: &LocalFileHeader,
    zip64: bool,
) {
    archive_descriptor.write_u32(DATA_DESCRIPTOR_SIGNATURE);
    archive_descriptor.write_u32(entry.crc32);
    if zip64 {
        archive_descriptor.write_u64(entry.compressed_size);
        archive_descriptor.write_u64(entry.uncompressed_size);
    } else {
        archive_descriptor.write_u32(entry.compressed_size as u32);
        archive_descriptor.write_u32(entry.uncompressed_size as u32);
    }
}
