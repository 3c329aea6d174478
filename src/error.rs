use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structural or integrity violation found while decoding a cache file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad entry magic: {0:#018x}")]
    BadEntryMagic(u64),
    #[error("magic number mismatch in eof record: {0:#018x}")]
    BadEofMagic(u64),
    #[error("magic number mismatch in index metadata: {0:#018x}")]
    BadIndexMagic(u64),
    #[error("truncated {what}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("cache key is not valid utf-8: {0}")]
    InvalidKey(#[from] std::str::Utf8Error),
    #[error("invalid stream size: expected {expected} bytes, found {actual}")]
    InvalidStreamSize { expected: usize, actual: usize },
    #[error("invalid payload size: header says {declared} bytes, found {actual}")]
    InvalidPayloadSize { declared: usize, actual: usize },
    #[error("crc32 mismatch in {region}: stored {stored:08x}, computed {computed:08x}")]
    Crc32Mismatch {
        region: &'static str,
        stored: u32,
        computed: u32,
    },
    #[error("sha256 mismatch in {region}")]
    Sha256Mismatch { region: &'static str },
    #[error("unsupported file version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Errors surfaced by file-level operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("unknown key: {0:016x}")]
    UnknownKey(u64),
    #[error("{}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    /// True for the kinds a caller can treat as a cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. } | CacheError::UnknownKey(_))
    }

    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            CacheError::Format { source, .. } => Some(source),
            _ => None,
        }
    }

    pub(crate) fn io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            CacheError::NotFound { path: path.to_path_buf() }
        } else {
            CacheError::Io { path: path.to_path_buf(), source: err }
        }
    }

    pub(crate) fn format(path: &Path, source: FormatError) -> Self {
        CacheError::Format { path: path.to_path_buf(), source }
    }
}
