use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive error {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad archive structure : {0}")]
    BadArchiveStructure(String),

    /// A zip64 extended information field whose payload is neither 24 nor 28 bytes.
    #[error("Invalid extra field 0x{header_id:04X} with {size} data bytes")]
    InvalidExtraField { header_id: u16, size: u16 },

    #[error("The entry name is not valid UTF-8")]
    InvalidUtf8Name,

    #[error("The entry name is {0} bytes long, a Zip header holds at most 65535")]
    NameTooLong(usize),

    #[error("The compression method code '{0}' is not supported")]
    UnsupportedCompressionMethodCode(u16),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

impl ArchiveError {
    pub(crate) fn truncated(record: &str) -> Self {
        ArchiveError::BadArchiveStructure(format!("{record} is truncated"))
    }
}
