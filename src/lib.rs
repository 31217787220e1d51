//! A library for building APPX packages in one pass, on a seekable file or on a forward-only
//! stream such as stdout or a socket.
//!
//! An APPX package is a ZIP container with three extra parts:
//!
//! Part | Content
//! -----|------
//! `AppxManifest.xml` | The package manifest, supplied by the caller
//! `AppxBlockMap.xml` | SHA-256 of every 64 KiB block of every file, with its compressed size
//! `[Content_Types].xml` | The MIME type of every part, by extension or by part name
//!
//! Files are added with [`add_file`](compress::archive::AppxArchive::add_file()) and the
//! package is closed by [`finish`](compress::archive::AppxArchive::finish()), which writes the
//! three parts above, then the central directory. Entries, offsets and the central directory
//! switch to ZIP64 records on their own when a value outgrows 32 bits.
//!
//! The container follows
//! [PKWARE's APPNOTE.TXT v6.3.10](https://pkware.cachefly.net/webdocs/casestudies/APPNOTE.TXT)
//!
//! ## Example
//!
//!```rust
//! use appxflow::{
//!     compress::archive::AppxArchive, compress::FileOptions, compression::Level,
//!     error::ArchiveError, types::FileDateTime,
//! };
//! use std::io::Cursor;
//!
//! fn main() -> Result<(), ArchiveError> {
//!     let mut archive = AppxArchive::new(Cursor::new(Vec::new()));
//!     archive.set_last_modified_time(FileDateTime::Now);
//!
//!     archive.add_file(&mut b"hello\n".as_ref(), "/readme.txt", "text/plain", Level::Default)?;
//!
//!     let options = FileOptions::default()
//!         .compression_level(Level::None)
//!         .last_modified_time(FileDateTime::Now);
//!     archive.add_file_with_options(
//!         &mut [0x89u8, 0x50, 0x4e, 0x47].as_ref(),
//!         "/images/logo.png",
//!         "image/png",
//!         &options,
//!     )?;
//!
//!     let manifest = b"<Package/>";
//!     let (size, _cursor) = archive.finish(&mut manifest.as_ref())?;
//!     assert!(size > 0);
//!
//!     Ok(())
//! }
//!```

pub mod block_map;
pub mod central_directory_end;
pub mod compress;
pub mod compression;
pub mod constants;
pub mod content_types;
pub mod crc;
pub mod descriptor;
pub mod error;
pub mod header;
pub mod types;
pub mod uncompress;
mod xml;
