//! Index file decoder.
//!
//! # Format
//!
//! ```text
//! [payload_size u32][crc32 u32]                      envelope, covers everything after it
//! [magic u64][version u32][entry_count u64][cache_size u64][eviction_reason u32, v7+]
//! entry_count x [hash u64][16 bytes not decoded]
//! ```

use std::fs::File;
use std::path::Path;

use fxhash::FxHashSet;
use memmap2::Mmap;
use serde::Serialize;
use tracing::{debug, warn};
use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::error::{CacheError, FormatError};
use crate::window::ByteWindow;

pub const INDEX_MAGIC: u64 = 0x656e_7465_7220_796f;

/// Newest index version this decoder knows about.
pub const SUPPORTED_INDEX_VERSION: u32 = 9;

/// First version whose metadata carries an eviction reason.
pub const EVICTION_REASON_VERSION: u32 = 7;

/// Width of one hash table record. Only the leading hash is decoded.
pub const INDEX_RECORD_SIZE: usize = 24;

#[repr(C)]
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct Envelope {
    pub payload_size: U32<LittleEndian>,
    pub crc32: U32<LittleEndian>,
}

/// Metadata fields shared by every index version.
#[repr(C)]
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct MetadataPrefix {
    pub magic: U64<LittleEndian>,
    pub version: U32<LittleEndian>,
    pub entry_count: U64<LittleEndian>,
    pub cache_size: U64<LittleEndian>,
}

/// Shape of the metadata block, picked by version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MetadataLayout {
    /// 28 bytes.
    Base,
    /// 32 bytes, eviction reason appended.
    WithEvictionReason,
}

impl MetadataLayout {
    pub fn for_version(version: u32) -> Self {
        if version >= EVICTION_REASON_VERSION {
            MetadataLayout::WithEvictionReason
        } else {
            MetadataLayout::Base
        }
    }

    pub fn size(self) -> usize {
        match self {
            MetadataLayout::Base => std::mem::size_of::<MetadataPrefix>(),
            MetadataLayout::WithEvictionReason => std::mem::size_of::<MetadataPrefix>() + 4,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, FromZeroes, Unaligned)]
struct HashRecord {
    hash: U64<LittleEndian>,
    // last-used time, entry size and in-memory flags; not decoded
    _rest: [u8; 16],
}

const _: () = assert!(std::mem::size_of::<HashRecord>() == INDEX_RECORD_SIZE);

#[derive(Clone, Debug, Serialize)]
pub struct IndexRecord {
    pub version: u32,
    pub entry_count: u64,
    pub cache_size_bytes: u64,
    pub eviction_reason: Option<u32>,
    #[serde(skip)]
    pub entry_hashes: FxHashSet<u64>,
}

impl IndexRecord {
    pub fn open<P: AsRef<Path>>(path: P, strict: bool) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CacheError::io(path, e))?;
        let len = file.metadata().map_err(|e| CacheError::io(path, e))?.len();
        if len == 0 {
            return decode_index(&[], strict).map_err(|e| CacheError::format(path, e));
        }
        // SAFETY: read-only map; the index is not rewritten while we hold it.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| CacheError::io(path, e))?;
        decode_index(&mmap, strict).map_err(|e| CacheError::format(path, e))
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.entry_hashes.contains(&hash)
    }
}

pub fn decode_index(bytes: &[u8], strict: bool) -> Result<IndexRecord, FormatError> {
    let mut window = ByteWindow::new(bytes);

    let envelope: Envelope = window.read_front("index envelope")?;
    let declared = envelope.payload_size.get() as usize;
    if window.len() != declared {
        return Err(FormatError::InvalidPayloadSize { declared, actual: window.len() });
    }
    let computed = crc32fast::hash(window.as_slice());
    if computed != envelope.crc32.get() {
        return Err(FormatError::Crc32Mismatch {
            region: "index payload",
            stored: envelope.crc32.get(),
            computed,
        });
    }

    let meta: MetadataPrefix = window.read_front("index metadata")?;
    if meta.magic.get() != INDEX_MAGIC {
        return Err(FormatError::BadIndexMagic(meta.magic.get()));
    }
    let version = meta.version.get();
    let eviction_reason = match MetadataLayout::for_version(version) {
        MetadataLayout::Base => None,
        MetadataLayout::WithEvictionReason => {
            let reason: U32<LittleEndian> = window.read_front("eviction reason")?;
            Some(reason.get())
        }
    };

    if version > SUPPORTED_INDEX_VERSION {
        if strict {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_INDEX_VERSION,
            });
        }
        warn!(version, supported = SUPPORTED_INDEX_VERSION, "index version newer than supported, parsing anyway");
    }

    let entry_count = meta.entry_count.get();
    let table_len = entry_count
        .checked_mul(INDEX_RECORD_SIZE as u64)
        .filter(|&n| n <= window.len() as u64)
        .ok_or(FormatError::Truncated {
            what: "index hash table",
            needed: usize::try_from(entry_count.saturating_mul(INDEX_RECORD_SIZE as u64)).unwrap_or(usize::MAX),
            available: window.len(),
        })?;

    let mut entry_hashes = FxHashSet::with_capacity_and_hasher(entry_count as usize, Default::default());
    for _ in 0..entry_count {
        let record: HashRecord = window.read_front("index record")?;
        entry_hashes.insert(record.hash.get());
    }

    debug!(
        version,
        entry_count,
        unique = entry_hashes.len(),
        table_len,
        trailing = window.len(),
        "decoded cache index"
    );

    Ok(IndexRecord {
        version,
        entry_count,
        cache_size_bytes: meta.cache_size.get(),
        eviction_reason,
        entry_hashes,
    })
}
