//! Entry file decoder.
//!
//! ```text
//! [EntryHeader 24][key][stream 1][digest?][EofRecord][stream 0][digest?][EofRecord]
//! ```
//! Single-stream files carry only the trailing `[stream 0][digest?][EofRecord]` group.
//! All integers are little-endian.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;
use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::error::{CacheError, FormatError};
use crate::window::ByteWindow;

pub const ENTRY_MAGIC: u64 = 0xfcfb_6d1b_a772_5c30;
pub const EOF_MAGIC: u64 = 0xf4fa_6f45_970d_41d8;

pub const FLAG_HAS_CRC32: u32 = 0x01;
pub const FLAG_HAS_SHA256: u32 = 0x02;

pub const SHA256_LEN: usize = 32;

#[repr(C)]
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct EntryHeader {
    pub magic: U64<LittleEndian>,
    pub version: U32<LittleEndian>,
    pub key_length: U32<LittleEndian>,
    pub key_hash: U32<LittleEndian>,
    pub padding: U32<LittleEndian>,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct EofRecord {
    pub magic: U64<LittleEndian>,
    pub flags: U32<LittleEndian>,
    pub crc32: U32<LittleEndian>,
    pub stream_size: U32<LittleEndian>,
    pub padding: U32<LittleEndian>,
}

impl EofRecord {
    pub fn has_crc32(&self) -> bool {
        self.flags.get() & FLAG_HAS_CRC32 != 0
    }

    pub fn has_sha256(&self) -> bool {
        self.flags.get() & FLAG_HAS_SHA256 != 0
    }

    pub fn stream_size(&self) -> usize {
        self.stream_size.get() as usize
    }
}

/// EOF record plus the digest that precedes it when flagged.
struct StreamTrailer<'a> {
    eof: EofRecord,
    sha256: Option<&'a [u8]>,
}

impl<'a> StreamTrailer<'a> {
    fn read_back(window: &mut ByteWindow<'a>) -> Result<Self, FormatError> {
        let eof: EofRecord = window.read_back("eof record")?;
        if eof.magic.get() != EOF_MAGIC {
            return Err(FormatError::BadEofMagic(eof.magic.get()));
        }
        let sha256 = if eof.has_sha256() {
            Some(window.take_back(SHA256_LEN, "sha256 digest")?)
        } else {
            None
        };
        Ok(StreamTrailer { eof, sha256 })
    }

    fn verify(&self, data: &[u8], region: &'static str) -> Result<(), FormatError> {
        if self.eof.has_crc32() {
            let computed = crc32fast::hash(data);
            let stored = self.eof.crc32.get();
            if computed != stored {
                return Err(FormatError::Crc32Mismatch { region, stored, computed });
            }
        }
        if let Some(expected) = self.sha256 {
            if Sha256::digest(data).as_slice() != expected {
                return Err(FormatError::Sha256Mismatch { region });
            }
        }
        Ok(())
    }
}

/// A fully validated cache entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Stream 0, the trailing stream of the file.
    pub payload: Vec<u8>,
    /// Stream 1 when the file holds two streams.
    pub stream1: Option<Vec<u8>>,
    pub version: u32,
    /// Key hash stored in the header. Not checked against the key.
    pub key_hash: u32,
    pub file: Option<PathBuf>,
}

impl CacheEntry {
    /// Decode a single entry file, with or without an index next to it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CacheError::io(path, e))?;
        let len = file.metadata().map_err(|e| CacheError::io(path, e))?.len();
        let mut entry = if len == 0 {
            decode_entry(&[])
        } else {
            // SAFETY: read-only map of a file we do not write; the cache directory
            // is assumed not to be mutated while it is being decoded.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| CacheError::io(path, e))?;
            decode_entry(&mmap)
        }
        .map_err(|e| CacheError::format(path, e))?;
        entry.file = Some(path.to_path_buf());
        Ok(entry)
    }

    /// The key parsed as a URL, when it is one.
    pub fn url(&self) -> Option<Url> {
        Url::parse(&self.key).ok()
    }
}

/// Decode the bytes of one entry file. Either the whole entry validates or an error
/// is returned; nothing partial is handed out.
pub fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, FormatError> {
    let mut window = ByteWindow::new(bytes);

    let header: EntryHeader = window.read_front("entry header")?;
    if header.magic.get() != ENTRY_MAGIC {
        return Err(FormatError::BadEntryMagic(header.magic.get()));
    }
    let key_bytes = window.take_front(header.key_length.get() as usize, "cache key")?;
    let key = std::str::from_utf8(key_bytes)?.to_owned();

    let trailing = StreamTrailer::read_back(&mut window)?;

    // There is no stream count on disk. A file holds two streams exactly when the
    // bytes left after the trailing EOF record do not match its stream size; in that
    // case the trailing stream is cut off and one more EOF record is read in front of
    // it. That second record must account for everything left. No third attempt.
    let (stream0, stream1) = if window.len() == trailing.eof.stream_size() {
        (window.as_slice(), None)
    } else {
        let expected = trailing.eof.stream_size();
        let available = window.len();
        let stream0 = window
            .take_back(expected, "stream 0")
            .map_err(|_| FormatError::InvalidStreamSize { expected, actual: available })?;
        let earlier = StreamTrailer::read_back(&mut window)?;
        if window.len() != earlier.eof.stream_size() {
            return Err(FormatError::InvalidStreamSize {
                expected: earlier.eof.stream_size(),
                actual: window.len(),
            });
        }
        (stream0, Some((window.as_slice(), earlier)))
    };

    trailing.verify(stream0, "stream 0")?;
    if let Some((data, earlier)) = &stream1 {
        earlier.verify(data, "stream 1")?;
    }

    debug!(
        key = %key,
        payload = stream0.len(),
        streams = if stream1.is_some() { 2 } else { 1 },
        "decoded cache entry"
    );

    Ok(CacheEntry {
        key,
        payload: stream0.to_vec(),
        stream1: stream1.map(|(data, _)| data.to_vec()),
        version: header.version.get(),
        key_hash: header.key_hash.get(),
        file: None,
    })
}
