#![allow(dead_code)]

use std::{
    fs::{create_dir_all, remove_file, File},
    io::{Cursor, Read},
    path::{Path, PathBuf},
};

pub const OUT_DIR: &str = "/tmp/appxflow";

pub fn out_path(file_name: &str) -> PathBuf {
    Path::new(OUT_DIR).join(file_name)
}

pub fn create_new_clean_file(file_name: &str) -> File {
    let out_dir = Path::new(OUT_DIR);
    if !out_dir.exists() {
        create_dir_all(out_dir).unwrap_or_else(|error| {
            panic!("creating dir {:?} failed, because {:?}", OUT_DIR, error);
        })
    }

    let out_path = out_dir.join(file_name);

    if out_path.exists() {
        remove_file(&out_path).unwrap_or_else(|error| {
            panic!("deleting file {:?} failed, because {:?}", &out_path, error);
        });
    }
    File::create(&out_path).unwrap_or_else(|error| {
        panic!("creating file {:?} failed, because {:?}", &out_path, error);
    })
}

/// Deterministic, mildly compressible bytes.
pub fn sample_data(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i % 251) as u8 ^ (i / 1024) as u8)
        .collect()
}

/// Produces `len` bytes of `sample_data`-like content without holding them in memory.
pub struct MockReader {
    len: usize,
    position: usize,
}

impl MockReader {
    pub fn new(len: usize) -> Self {
        Self { len, position: 0 }
    }
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let count = buf.len().min(self.len - self.position);
        for (i, byte) in buf[..count].iter_mut().enumerate() {
            let index = self.position + i;
            *byte = (index % 251) as u8 ^ (index / 1024) as u8;
        }
        self.position += count;
        Ok(count)
    }
}

/// Opens a finished package with the `zip` crate and returns the content of one entry.
pub fn read_entry(package: &[u8], name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    let mut file = zip.by_name(name).unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    content
}

pub fn read_entry_text(package: &[u8], name: &str) -> String {
    String::from_utf8(read_entry(package, name)).unwrap()
}
