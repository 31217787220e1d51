//! Writing a package.
//!
//! <!--
//! How entry sizes reach the archive.
//!
//! <table>
//! <tr><th>Sink</th><th>Local file header</th><th>After the payload</th></tr>
//! <tr><th>Seekable</th>
//! <td>Placeholders, rewritten in place once CRC and sizes are known.
//! ZIP64 extra field if the offset or the declared size needs it.</td>
//! <td>Nothing, unless an undeclared entry outgrew 32 bits: then the header's
//! flags are patched and a ZIP64 data descriptor follows.</td>
//! </tr>
//! <tr><th>Streamable</th>
//! <td>Bit 3 set, CRC and sizes zero.</td>
//! <td>Data descriptor, ZIP64 form when the entry needs it.</td>
//! </tr>
//! </table>
//! -->

pub mod archive;
mod common;
pub mod compressor;
pub mod write_wrapper;

use crate::{compression::Level, types::FileDateTime};

/// Metadata for a file to be packaged
#[derive(Clone, Debug, Default)]
pub struct FileOptions {
    /// The compression level; `Level::None` stores the file.
    pub compression_level: Level,

    /// The file modified time.
    pub last_modified_time: FileDateTime,

    /// The announced uncompressed size, if known.
    pub declared_size: Option<u64>,
}

impl FileOptions {
    /// Set the compression level for the new file
    ///
    /// The default is `Level::Default`, a deflate entry.
    pub fn compression_level(mut self, level: Level) -> FileOptions {
        self.compression_level = level;
        self
    }

    /// Set the last modified time
    ///
    /// The default is `FileDateTime::Zero`.
    pub fn last_modified_time(mut self, mod_time: FileDateTime) -> FileOptions {
        self.last_modified_time = mod_time;
        self
    }

    /// Announce the uncompressed size of the file.
    ///
    /// A size of 4 GiB or more makes the local file header carry a ZIP64 extra field from the
    /// start. Without it, an entry that turns out larger still gets ZIP64 records, through a
    /// data descriptor.
    pub fn declared_size(mut self, size: u64) -> FileOptions {
        self.declared_size = Some(size);
        self
    }
}
