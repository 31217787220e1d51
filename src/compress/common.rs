use crate::block_map::BlockMap;
use crate::central_directory_end::CentralDirectoryEnd;
use crate::content_types::ContentTypeRegistry;
use crate::header::CentralDirectoryHeader;
use crate::types::FileDateTime;

/// Everything the archive accumulates between the first entry and `finish`.
#[derive(Debug, Default)]
pub(crate) struct ArchiveState {
    /// Finalized entries in the order they were written.
    pub central_directory: Vec<CentralDirectoryHeader>,
    pub block_map: BlockMap,
    pub content_types: ContentTypeRegistry,
    pub central_directory_end: CentralDirectoryEnd,
    /// Set once the first entry needs zip64, never cleared.
    pub zip64: bool,
    /// Timestamp given to the manifest, block map and content types entries.
    pub last_modified_time: FileDateTime,
}

impl ArchiveState {
    pub fn add_entry(&mut self, central_directory_header: CentralDirectoryHeader) {
        if central_directory_header.is_zip64() && !self.zip64 {
            tracing::debug!(
                "{} needs zip64, switching the archive to zip64",
                central_directory_header.entry.file_name
            );
            self.zip64 = true;
        }
        self.central_directory.push(central_directory_header);
    }

    pub fn set_archive_comment(&mut self, comment: &str) {
        self.central_directory_end.set_archive_comment(comment);
    }
}
