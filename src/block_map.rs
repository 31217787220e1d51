//! The package integrity map (`AppxBlockMap.xml`).
//!
//! Every packaged file is described by the SHA-256 of each 64 KiB block of its uncompressed
//! payload and, when the entry is deflated, by the number of compressed bytes produced for
//! that block. File names use `\` as separator, unlike the `/` separated part names of the
//! Zip entries they describe.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::constants::{BLOCK_MAP_HASH_METHOD, BLOCK_MAP_NAMESPACE};
use crate::xml::XmlWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub hash: [u8; 32],
    /// `None` when the entry is stored.
    pub compressed_size: Option<u64>,
}

impl Block {
    pub fn encoded_hash(&self) -> String {
        STANDARD.encode(self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMapFile {
    pub name: String,
    pub size: u64,
    pub lfh_size: u64,
    pub blocks: Vec<Block>,
}

/// Collects the blocks of an entry while its payload streams through.
#[derive(Debug)]
pub struct BlockMapFileBuilder {
    name: String,
    lfh_size: u64,
    blocks: Vec<Block>,
}

impl BlockMapFileBuilder {
    pub fn new(part_name: &str, lfh_size: u64) -> Self {
        Self {
            name: part_name.replace('/', "\\"),
            lfh_size,
            blocks: Vec::new(),
        }
    }

    /// Hashes one uncompressed block.
    pub fn push_block(&mut self, data: &[u8], compressed_size: Option<u64>) {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(data));
        self.blocks.push(Block {
            hash,
            compressed_size,
        });
    }

    /// Attributes bytes emitted after the last block (the end of a deflate stream) to it.
    pub fn add_to_last_block(&mut self, extra: u64) {
        if let Some(Block {
            compressed_size: Some(size),
            ..
        }) = self.blocks.last_mut()
        {
            *size += extra;
        }
    }

    pub fn finish(self, size: u64) -> BlockMapFile {
        BlockMapFile {
            name: self.name,
            size,
            lfh_size: self.lfh_size,
            blocks: self.blocks,
        }
    }
}

#[derive(Debug, Default)]
pub struct BlockMap {
    files: Vec<BlockMapFile>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: BlockMapFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[BlockMapFile] {
        &self.files
    }

    /// Case-insensitive, stable.
    pub fn sort_by_name(&mut self) {
        self.files.sort_by_cached_key(|file| file.name.to_lowercase());
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut writer = XmlWriter::new();
        writer.open(
            "BlockMap",
            &[
                ("xmlns", BLOCK_MAP_NAMESPACE),
                ("HashMethod", BLOCK_MAP_HASH_METHOD),
            ],
        );

        for file in &self.files {
            let size = file.size.to_string();
            let lfh_size = file.lfh_size.to_string();
            let attributes = [
                ("Name", file.name.as_str()),
                ("Size", size.as_str()),
                ("LfhSize", lfh_size.as_str()),
            ];

            if file.blocks.is_empty() {
                writer.empty("File", &attributes);
                continue;
            }

            writer.open("File", &attributes);
            for block in &file.blocks {
                let hash = block.encoded_hash();
                match block.compressed_size {
                    Some(compressed_size) => {
                        let compressed_size = compressed_size.to_string();
                        writer.empty(
                            "Block",
                            &[("Hash", hash.as_str()), ("Size", compressed_size.as_str())],
                        );
                    }
                    None => writer.empty("Block", &[("Hash", hash.as_str())]),
                }
            }
            writer.close("File");
        }

        writer.close("BlockMap");
        writer.finish()
    }
}
