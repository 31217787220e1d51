use std::io::{ErrorKind, Read, Seek, Write};

use super::common::ArchiveState;
use super::compressor::BlockCompressor;
use super::write_wrapper::{CommonWrapper, WriteSeekWrapper, WriteWrapper};
use super::FileOptions;

use crate::block_map::{BlockMap, BlockMapFileBuilder};
use crate::compression::Level;
use crate::constants::{
    APPX_BLOCK_MAP_CONTENT_TYPE, APPX_BLOCK_MAP_NAME, APPX_MANIFEST_CONTENT_TYPE,
    APPX_MANIFEST_NAME, BLOCK_SIZE, CONTENT_TYPES_NAME, EXTENDED_LOCAL_HEADER_FLAG,
    FILE_HEADER_FLAGS_OFFSET, VERSION_NEEDED, VERSION_NEEDED_ZIP64, ZIP64_BYTES_THR,
};
use crate::content_types::ContentTypeRegistry;
use crate::crc::Crc32;
use crate::descriptor::ArchiveDescriptor;
use crate::error::{ArchiveError, ArchiveResult};
use crate::header::{write_data_descriptor, CentralDirectoryHeader, LocalFileHeader};
use crate::types::FileDateTime;

/// Fills `buffer` unless the reader runs dry first. Returns the number of bytes read.
fn read_block<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Closes an entry whose local header, already on the sink without a zip64 extra field, cannot
/// hold its final sizes: the header's flags get the data descriptor bit, then a zip64 data
/// descriptor is appended at `archive_size`.
fn close_with_zip64_data_descriptor<W>(
    sink: &mut (dyn CommonWrapper<W> + '_),
    file_header: &mut LocalFileHeader,
    archive_size: u64,
) -> ArchiveResult<()> {
    file_header.general_purpose_flags |= EXTENDED_LOCAL_HEADER_FLAG;
    sink.seek_to(file_header.offset + FILE_HEADER_FLAGS_OFFSET)?;
    let flags = file_header.general_purpose_flags.to_le_bytes();
    sink.write_all(&flags)?;
    sink.seek_to(archive_size)?;

    let mut file_descriptor = ArchiveDescriptor::new(24);
    write_data_descriptor(&mut file_descriptor, file_header, true);
    sink.write_all(file_descriptor.buffer())?;
    Ok(())
}

/// An APPX package under construction.
///
/// Create a package using either:
/// * [`new_streamable`](Self::new_streamable()), for any [`Write`], or
/// * [`new`](Self::new()), for a [`Write`] + [`Seek`] sink. Local headers are then rewritten
///   in place and no data descriptors are needed.
///
/// Then, add the package's files one by one with [`add_file`](Self::add_file()). The
/// [`finish`](Self::finish()) function adds the manifest, the block map and the content types,
/// then closes the Zip container. It consumes the archive, nothing can be added afterwards.
///
/// ```
/// use appxflow::compress::archive::AppxArchive;
/// use appxflow::compression::Level;
/// use std::io::Cursor;
///
/// let mut archive = AppxArchive::new(Cursor::new(Vec::new()));
/// archive
///     .add_file(&mut b"hello".as_ref(), "/assets/hello.txt", "text/plain", Level::Default)
///     .unwrap();
///
/// let manifest = br#"<Package xmlns="http://schemas.microsoft.com/appx/manifest/foundation/windows10" />"#;
/// let (size, sink) = archive.finish(&mut manifest.as_ref()).unwrap();
/// assert_eq!(size, sink.into_inner().len() as u64);
/// ```
pub struct AppxArchive<'a, W: Write> {
    sink: Box<dyn CommonWrapper<W> + 'a>,
    data: ArchiveState,
}

impl<'a, W: Write + 'a> AppxArchive<'a, W> {
    /// Create a new package, using the underlying [`Write`] to write files' header and
    /// payload. Every entry is followed by a data descriptor.
    pub fn new_streamable(sink: W) -> Self {
        Self {
            sink: Box::new(WriteWrapper::new(sink)),
            data: ArchiveState::default(),
        }
    }

    /// Get archive current total bytes written.
    pub fn get_archive_size(&mut self) -> ArchiveResult<u64> {
        Ok(self.sink.get_written_bytes_count()?)
    }

    /// True once an entry needed zip64. The central directory will then be closed by zip64
    /// records.
    pub fn is_zip64(&self) -> bool {
        self.data.zip64
    }

    /// Entries written so far, in archive order.
    pub fn entries(&self) -> &[CentralDirectoryHeader] {
        &self.data.central_directory
    }

    pub fn block_map(&self) -> &BlockMap {
        &self.data.block_map
    }

    pub fn content_types(&self) -> &ContentTypeRegistry {
        &self.data.content_types
    }

    /// Set the package comment, written in the end of central directory record.
    pub fn set_archive_comment(&mut self, comment: &str) {
        self.data.set_archive_comment(comment);
    }

    /// Timestamp of the entries `finish` creates. Defaults to `FileDateTime::Zero`.
    pub fn set_last_modified_time(&mut self, last_modified_time: FileDateTime) {
        self.data.last_modified_time = last_modified_time;
    }

    /// Add a file to the package.
    ///
    /// # Arguments
    /// * `payload` - The file's content
    /// * `part_name` - The file's path inside the package, `/` separated. A leading `/` is
    ///   dropped.
    /// * `content_type` - The file's MIME type, recorded in `[Content_Types].xml`
    /// * `level` - `Level::None` stores the file, any other level deflates it
    pub fn add_file<R: Read + ?Sized>(
        &mut self,
        payload: &mut R,
        part_name: &str,
        content_type: &str,
        level: Level,
    ) -> ArchiveResult<()> {
        let options = FileOptions::default().compression_level(level);
        self.add_file_with_options(payload, part_name, content_type, &options)
    }

    /// Same as [`add_file`](Self::add_file()) with every entry option.
    pub fn add_file_with_options<R: Read + ?Sized>(
        &mut self,
        payload: &mut R,
        part_name: &str,
        content_type: &str,
        options: &FileOptions,
    ) -> ArchiveResult<()> {
        self.append(payload, part_name, Some(content_type), options, true)
    }

    fn append<R: Read + ?Sized>(
        &mut self,
        payload: &mut R,
        part_name: &str,
        content_type: Option<&str>,
        options: &FileOptions,
        in_block_map: bool,
    ) -> ArchiveResult<()> {
        let file_name = part_name.strip_prefix('/').unwrap_or(part_name);
        if file_name.len() > u16::MAX as usize {
            return Err(ArchiveError::NameTooLong(file_name.len()));
        }
        if let Some(content_type) = content_type {
            self.data.content_types.register(file_name, content_type);
        }

        let seekable = self.sink.is_seekable();
        let file_header_offset = self.sink.get_written_bytes_count()?;
        let announced_zip64 = file_header_offset >= ZIP64_BYTES_THR
            || matches!(options.declared_size, Some(size) if size >= ZIP64_BYTES_THR);
        let base_flags = if seekable {
            0
        } else {
            EXTENDED_LOCAL_HEADER_FLAG
        };

        let mut file_header = LocalFileHeader::new(
            file_name,
            options.compression_level.compression_method(),
            options.last_modified_time.date_time(),
            file_header_offset,
            base_flags,
            announced_zip64,
        );

        let mut file_descriptor = ArchiveDescriptor::new(file_header.size());
        file_header.write(&mut file_descriptor);
        self.sink.write_all(file_descriptor.buffer())?;

        let file_begin = self.sink.get_written_bytes_count()?;
        let mut block_map_file = BlockMapFileBuilder::new(file_name, file_header.size() as u64);
        let mut crc = Crc32::new();
        let mut uncompressed_size = 0u64;
        let mut buffer = vec![0u8; BLOCK_SIZE];

        let mut compressor = BlockCompressor::new(options.compression_level, &mut self.sink);
        loop {
            let read = read_block(payload, &mut buffer)?;
            if read == 0 {
                break;
            }
            let block = &buffer[..read];
            crc.update(block);
            let compressed_size = compressor.write_block(block)?;
            block_map_file.push_block(block, compressed_size);
            tracing::trace!(
                "{} block {}: {} bytes in, {:?} bytes out",
                file_name,
                uncompressed_size / BLOCK_SIZE as u64,
                read,
                compressed_size
            );
            uncompressed_size += read as u64;
            if read < BLOCK_SIZE {
                break;
            }
        }
        block_map_file.add_to_last_block(compressor.flush()?);

        let archive_size = self.sink.get_written_bytes_count()?;
        file_header.update(crc.value(), archive_size - file_begin, uncompressed_size);

        let zip64 = file_header.is_zip64() || file_header.requires_zip64();
        file_descriptor.clear();

        if !seekable {
            write_data_descriptor(&mut file_descriptor, &file_header, zip64);
            self.sink.write_all(file_descriptor.buffer())?;
        } else if file_header.is_zip64() || !zip64 {
            // same length as the placeholder, only CRC and sizes differ
            file_header.write(&mut file_descriptor);
            self.sink.seek_to(file_header_offset)?;
            self.sink.write_all(file_descriptor.buffer())?;
            self.sink.seek_to(archive_size)?;
        } else {
            tracing::warn!(
                "{} outgrew 32 bits without a declared size, closing it with a zip64 data descriptor",
                file_name
            );
            close_with_zip64_data_descriptor(self.sink.as_mut(), &mut file_header, archive_size)?;
        }

        tracing::debug!(
            "added {} at {}: {} bytes, {} compressed, crc {:08x}, zip64 {}",
            file_name,
            file_header_offset,
            uncompressed_size,
            file_header.compressed_size,
            file_header.crc32,
            zip64
        );

        let version_made_by = if zip64 {
            VERSION_NEEDED_ZIP64
        } else {
            VERSION_NEEDED
        };
        self.data
            .add_entry(CentralDirectoryHeader::from_local(&file_header, version_made_by));

        if in_block_map {
            self.data
                .block_map
                .push(block_map_file.finish(uncompressed_size));
        }

        Ok(())
    }

    /// Add the manifest, the block map and the content types, then write the central
    /// directory.
    ///
    /// The block map lists the files in case-insensitive name order, the manifest last. It
    /// describes neither itself nor `[Content_Types].xml`.
    ///
    /// Returns the archive size (bytes) and the [Write] object passed at creation.
    pub fn finish<R: Read + ?Sized>(mut self, manifest: &mut R) -> ArchiveResult<(u64, W)> {
        let options = FileOptions::default().last_modified_time(self.data.last_modified_time);

        self.data.block_map.sort_by_name();
        self.append(
            manifest,
            APPX_MANIFEST_NAME,
            Some(APPX_MANIFEST_CONTENT_TYPE),
            &options,
            true,
        )?;

        let block_map = self.data.block_map.to_xml();
        self.append(
            &mut block_map.as_slice(),
            APPX_BLOCK_MAP_NAME,
            Some(APPX_BLOCK_MAP_CONTENT_TYPE),
            &options,
            false,
        )?;

        // the content types file is not a part, it does not list itself
        let content_types = self.data.content_types.to_xml();
        self.append(
            &mut content_types.as_slice(),
            CONTENT_TYPES_NAME,
            None,
            &options,
            false,
        )?;

        let central_directory_offset = self.sink.get_written_bytes_count()?;
        let zip64 = self.data.zip64;
        let mut central_directory_end = std::mem::take(&mut self.data.central_directory_end);
        central_directory_end.offset_of_start_of_central_directory = central_directory_offset;

        let mut central_directory_header = ArchiveDescriptor::new(500);
        for file_info in self.data.central_directory.iter_mut() {
            if zip64 {
                file_info.version_made_by = VERSION_NEEDED_ZIP64;
            }
            file_info.write(&mut central_directory_header);
            self.sink.write_all(central_directory_header.buffer())?;
            central_directory_end.add_entry(file_info.size() as u64);
            central_directory_header.clear();
        }

        let mut end_of_central_directory = ArchiveDescriptor::new(200);
        if zip64 || central_directory_end.needs_zip64_format_extensions() {
            tracing::debug!(
                "zip64 end of central directory at {}",
                central_directory_offset + central_directory_end.central_directory_size
            );
            central_directory_end
                .create_zip64_end_of_central_directory_record(&mut end_of_central_directory);
            central_directory_end
                .create_end_of_central_directory_locator(&mut end_of_central_directory);
        }
        central_directory_end.create_end_of_central_directory(&mut end_of_central_directory);
        self.sink.write_all(end_of_central_directory.buffer())?;
        self.sink.flush()?;

        let archive_size = self.sink.get_written_bytes_count()?;
        tracing::debug!(
            "package closed: {} entries, central directory of {} bytes at {}, {} bytes total",
            central_directory_end.total_number_of_entries_in_the_central_directory,
            central_directory_end.central_directory_size,
            central_directory_offset,
            archive_size
        );

        Ok((archive_size, self.sink.get_into()))
    }
}

impl<'a, W: Write + Seek + 'a> AppxArchive<'a, W> {
    /// Create a new package (non streamable), using the underlying [`Write`] + [`Seek`] to
    /// write files' header and payload.
    ///
    /// _Note:_ a non streamable package saves the data descriptor of every file.
    pub fn new(sink: W) -> Self {
        Self {
            sink: Box::new(WriteSeekWrapper::new(sink)),
            data: ArchiveState::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::central_directory_end::find_central_directory_end;
    use crate::compression::CompressionMethod;
    use crate::constants::{
        DATA_DESCRIPTOR_SIGNATURE, FILE_HEADER_BASE_SIZE, FILE_HEADER_CRC_OFFSET,
    };
    use crate::types::DateTimeCS;

    /// Hands out at most `chunk` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl<'a> Read for Trickle<'a> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = self.chunk.min(buf.len()).min(self.data.len());
            buf[..len].copy_from_slice(&self.data[..len]);
            self.data = &self.data[len..];
            Ok(len)
        }
    }

    #[test]
    fn read_block_fills_the_buffer() {
        let data = vec![7u8; 100];
        let mut reader = Trickle {
            data: &data,
            chunk: 7,
        };
        let mut buffer = [0u8; 64];
        assert_eq!(read_block(&mut reader, &mut buffer).unwrap(), 64);
        assert_eq!(read_block(&mut reader, &mut buffer).unwrap(), 36);
        assert_eq!(read_block(&mut reader, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn blocks_follow_64k_windows_even_for_short_reads() {
        let data = vec![1u8; BLOCK_SIZE + 10];
        let mut archive = AppxArchive::new(Cursor::new(Vec::new()));
        let mut reader = Trickle {
            data: &data,
            chunk: 1000,
        };
        archive
            .add_file(&mut reader, "data.bin", "application/octet-stream", Level::None)
            .unwrap();

        let file = &archive.block_map().files()[0];
        assert_eq!(file.size, data.len() as u64);
        assert_eq!(file.blocks.len(), 2);
        assert!(file.blocks.iter().all(|block| block.compressed_size.is_none()));
    }

    #[test]
    fn seekable_header_is_rewritten_in_place() {
        let mut archive = AppxArchive::new(Cursor::new(Vec::new()));
        archive
            .add_file(&mut b"hello".as_ref(), "/hello.txt", "text/plain", Level::None)
            .unwrap();

        let entry = &archive.entries()[0].entry;
        assert_eq!(entry.file_name, "hello.txt");
        assert!(!entry.has_data_descriptor());
        assert_eq!(entry.compressed_size, 5);

        let size = archive.get_archive_size().unwrap();
        assert_eq!(size, (FILE_HEADER_BASE_SIZE + "hello.txt".len() + 5) as u64);

        let (_, sink) = archive.finish(&mut b"<Package/>".as_ref()).unwrap();
        let bytes = sink.into_inner();
        let crc_offset = FILE_HEADER_CRC_OFFSET as usize;
        assert_eq!(
            &bytes[crc_offset..crc_offset + 4],
            &crate::crc::crc32(b"hello").to_le_bytes()
        );
        assert_eq!(&bytes[crc_offset + 4..crc_offset + 8], &5u32.to_le_bytes());
    }

    #[test]
    fn streamable_entries_carry_data_descriptors() {
        let mut archive = AppxArchive::new_streamable(Vec::new());
        archive
            .add_file(&mut b"hello".as_ref(), "hello.txt", "text/plain", Level::None)
            .unwrap();

        let entry = &archive.entries()[0].entry;
        assert!(entry.has_data_descriptor());
        // header, payload, 16 byte descriptor
        assert_eq!(
            archive.get_archive_size().unwrap(),
            (FILE_HEADER_BASE_SIZE + "hello.txt".len() + 5 + 16) as u64
        );
    }

    #[test]
    fn declared_large_size_announces_zip64() {
        let mut archive = AppxArchive::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_level(Level::None)
            .declared_size(5_000_000_000);
        archive
            .add_file_with_options(
                &mut b"tiny".as_ref(),
                "big.bin",
                "application/octet-stream",
                &options,
            )
            .unwrap();

        assert!(archive.is_zip64());
        let central = &archive.entries()[0];
        assert!(central.is_zip64());
        assert_eq!(central.version_made_by, VERSION_NEEDED_ZIP64);
        assert_eq!(central.entry.version_needed, VERSION_NEEDED_ZIP64);
    }

    #[test]
    fn finish_adds_the_three_package_files() {
        let mut archive = AppxArchive::new_streamable(Vec::new());
        archive
            .add_file(&mut b"b".as_ref(), "B.txt", "text/plain", Level::Default)
            .unwrap();
        archive
            .add_file(&mut b"a".as_ref(), "a.txt", "text/plain", Level::Default)
            .unwrap();

        let (size, sink) = archive.finish(&mut b"<Package/>".as_ref()).unwrap();
        assert_eq!(size, sink.len() as u64);

        let (end, _) = find_central_directory_end(&mut Cursor::new(sink)).unwrap();
        assert_eq!(end.total_number_of_entries_in_the_central_directory, 5);
        assert_eq!(end.archive_comment, None);
    }

    #[test]
    fn overlong_name_is_rejected_before_writing() {
        let mut archive = AppxArchive::new_streamable(Vec::new());
        let name = "n".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            archive.add_file(&mut b"x".as_ref(), &name, "text/plain", Level::None),
            Err(ArchiveError::NameTooLong(len)) if len == u16::MAX as usize + 1
        ));
        assert_eq!(archive.get_archive_size().unwrap(), 0);
        assert!(archive.entries().is_empty());
        assert!(archive.content_types().records().next().is_none());

        // the leading slash is not part of the entry name
        let longest = format!("/{}", "n".repeat(u16::MAX as usize));
        archive
            .add_file(&mut b"x".as_ref(), &longest, "text/plain", Level::None)
            .unwrap();
        assert_eq!(archive.entries()[0].entry.file_name.len(), u16::MAX as usize);
    }

    #[test]
    fn unannounced_zip64_entry_is_closed_by_a_wide_data_descriptor() {
        let mut sink: Box<dyn CommonWrapper<Cursor<Vec<u8>>>> =
            Box::new(WriteSeekWrapper::new(Cursor::new(Vec::new())));
        sink.write_all(b"prefix").unwrap();

        let mut header = LocalFileHeader::new(
            "big.bin",
            CompressionMethod::Store(),
            DateTimeCS::default(),
            6,
            0,
            false,
        );
        let mut placeholder = ArchiveDescriptor::new(header.size());
        header.write(&mut placeholder);
        sink.write_all(placeholder.buffer()).unwrap();
        sink.write_all(b"payload").unwrap();
        let archive_size = sink.get_written_bytes_count().unwrap();

        header.update(0x1234_5678, 5_000_000_000, 6_000_000_000);
        close_with_zip64_data_descriptor(sink.as_mut(), &mut header, archive_size)
            .unwrap();
        assert!(header.has_data_descriptor());
        assert!(!header.is_zip64());
        assert_eq!(sink.get_written_bytes_count().unwrap(), archive_size + 24);

        let bytes = sink.get_into().into_inner();
        let flags = u16::from_le_bytes([bytes[6 + 6], bytes[6 + 7]]);
        assert_eq!(flags & EXTENDED_LOCAL_HEADER_FLAG, EXTENDED_LOCAL_HEADER_FLAG);
        // header length unchanged, payload untouched
        assert_eq!(&bytes[6 + header.size()..archive_size as usize], b"payload");

        let descriptor = &bytes[archive_size as usize..];
        assert_eq!(descriptor.len(), 24);
        assert_eq!(&descriptor[0..4], &DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
        assert_eq!(&descriptor[4..8], &0x1234_5678u32.to_le_bytes());
        assert_eq!(&descriptor[8..16], &5_000_000_000u64.to_le_bytes());
        assert_eq!(&descriptor[16..24], &6_000_000_000u64.to_le_bytes());
    }
}
