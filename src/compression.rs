use std::fmt::Display;

use flate2::Compression;

use crate::error::ArchiveError;

pub const STORE: u16 = 0;
pub const DEFLATE: u16 = 8;

/// Zip compression method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store(),
    Deflate(),
}

impl CompressionMethod {
    pub fn zip_code(&self) -> u16 {
        match self {
            CompressionMethod::Store() => STORE,
            CompressionMethod::Deflate() => DEFLATE,
        }
    }

    pub fn from_compression_method(compression_method: u16) -> Result<Self, ArchiveError> {
        match compression_method {
            STORE => Ok(CompressionMethod::Store()),
            DEFLATE => Ok(CompressionMethod::Deflate()),
            _ => Err(ArchiveError::UnsupportedCompressionMethodCode(
                compression_method,
            )),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CompressionMethod::Store() => "store",
            CompressionMethod::Deflate() => "deflate",
        }
    }
}

impl Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Compression policy of an entry.
///
/// `Level::None` stores the payload as is, every other level deflates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    None,
    Fastest,
    #[default]
    Default,
    Best,
    /// An explicit deflate level, clamped to 1..=9.
    Precise(u32),
}

impl Level {
    pub fn compression_method(&self) -> CompressionMethod {
        match self {
            Level::None => CompressionMethod::Store(),
            _ => CompressionMethod::Deflate(),
        }
    }
}

impl From<Level> for Compression {
    fn from(level: Level) -> Self {
        match level {
            Level::Fastest => Compression::fast(),
            Level::Best => Compression::best(),
            Level::Default => Compression::default(),
            Level::Precise(val) => Compression::new(val.clamp(1, 9)),
            Level::None => Compression::none(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_selects_method() {
        assert_eq!(Level::None.compression_method(), CompressionMethod::Store());
        assert_eq!(Level::Best.compression_method(), CompressionMethod::Deflate());
        assert_eq!(
            Level::Precise(3).compression_method(),
            CompressionMethod::Deflate()
        );
    }

    #[test]
    fn zip_codes() {
        assert_eq!(CompressionMethod::Store().zip_code(), 0);
        assert_eq!(CompressionMethod::Deflate().zip_code(), 8);
        assert!(matches!(
            CompressionMethod::from_compression_method(12),
            Err(ArchiveError::UnsupportedCompressionMethodCode(12))
        ));
    }

    #[test]
    fn precise_level_is_clamped() {
        assert_eq!(Compression::from(Level::Precise(42)).level(), 9);
        assert_eq!(Compression::from(Level::Precise(0)).level(), 1);
    }
}
