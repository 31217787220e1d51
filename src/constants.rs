use std::mem::size_of;

pub const FILE_HEADER_BASE_SIZE: usize = 7 * size_of::<u16>() + 4 * size_of::<u32>();
pub const CENTRAL_DIRECTORY_ENTRY_BASE_SIZE: usize = 11 * size_of::<u16>() + 6 * size_of::<u32>();
pub const END_OF_CENTRAL_DIRECTORY_SIZE: usize = 5 * size_of::<u16>() + 3 * size_of::<u32>();
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIZE: usize =
    2 * size_of::<u16>() + 3 * size_of::<u32>() + 5 * size_of::<u64>();
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIZE: usize =
    3 * size_of::<u32>() + size_of::<u64>();

/// Offset of the CRC-32 field inside a local file header.
pub const FILE_HEADER_CRC_OFFSET: u64 = 14;
/// Offset of the general purpose flags inside a local file header.
pub const FILE_HEADER_FLAGS_OFFSET: u64 = 6;

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const CENTRAL_DIRECTORY_ENTRY_SIGNATURE: u32 = 0x02014b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub const CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06054b50;
pub const ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE: u32 = 0x07064b50;

pub const EXTENDED_LOCAL_HEADER_FLAG: u16 = 1 << 3;
pub const UTF8_NAME_FLAG: u16 = 1 << 11;

pub const VERSION_NEEDED: u16 = 20;
pub const VERSION_NEEDED_ZIP64: u16 = 45;

pub const ZIP64_BYTES_THR: u64 = u32::MAX as u64;
pub const ZIP64_ENTRY_THR: u64 = u16::MAX as u64;

/// Window over which the block map hashes (and compresses) entry payloads.
pub const BLOCK_SIZE: usize = 64 * 1024;

pub const APPX_MANIFEST_NAME: &str = "AppxManifest.xml";
pub const APPX_MANIFEST_CONTENT_TYPE: &str = "application/vnd.ms-appx.manifest+xml";
pub const APPX_BLOCK_MAP_NAME: &str = "AppxBlockMap.xml";
pub const APPX_BLOCK_MAP_CONTENT_TYPE: &str = "application/vnd.ms-appx.blockmap+xml";
pub const CONTENT_TYPES_NAME: &str = "[Content_Types].xml";

pub const BLOCK_MAP_NAMESPACE: &str = "http://schemas.microsoft.com/appx/2010/blockmap";
pub const BLOCK_MAP_HASH_METHOD: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";
