//! Read-only view over a cache directory.

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::hasher;
use crate::index::IndexRecord;

pub const INDEX_DIR: &str = "index-dir";
pub const INDEX_FILE: &str = "the-real-index";

/// Either a cache key or an addressing hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Key(&'a str),
    Hash(u64),
}

impl Lookup<'_> {
    pub fn hash(&self) -> u64 {
        match *self {
            Lookup::Key(key) => hasher::hash(key),
            Lookup::Hash(hash) => hash,
        }
    }
}

impl<'a> From<&'a str> for Lookup<'a> {
    fn from(key: &'a str) -> Self {
        Lookup::Key(key)
    }
}

impl<'a> From<&'a String> for Lookup<'a> {
    fn from(key: &'a String) -> Self {
        Lookup::Key(key)
    }
}

impl From<u64> for Lookup<'_> {
    fn from(hash: u64) -> Self {
        Lookup::Hash(hash)
    }
}

/// Entry file name for a hash.
///
/// Rendered with `{:08x}`: at least eight hex digits, zero padded, followed by the
/// stream-0 file suffix. Kept exactly as the directories this reads were named.
pub fn entry_file_name(hash: u64) -> String {
    format!("{:08x}_0", hash)
}

#[derive(Debug)]
pub struct CacheView {
    dir: PathBuf,
    index: IndexRecord,
}

impl CacheView {
    /// Load `<dir>/index-dir/the-real-index` without version gating.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, CacheError> {
        Self::load_with(dir, false)
    }

    /// Load the index; with `strict`, refuse versions newer than the decoder supports.
    pub fn load_with<P: AsRef<Path>>(dir: P, strict: bool) -> Result<Self, CacheError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CacheError::NotFound { path: dir.to_path_buf() });
        }
        let index_path = dir.join(INDEX_DIR).join(INDEX_FILE);
        if !index_path.is_file() {
            return Err(CacheError::NotFound { path: index_path });
        }
        let index = IndexRecord::open(&index_path, strict)?;
        debug!(dir = %dir.display(), entries = index.entry_hashes.len(), version = index.version, "loaded cache index");
        Ok(CacheView { dir: dir.to_path_buf(), index })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &IndexRecord {
        &self.index
    }

    pub fn version(&self) -> u32 {
        self.index.version
    }

    pub fn len(&self) -> usize {
        self.index.entry_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.entry_hashes.is_empty()
    }

    pub fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.index.entry_hashes.iter().copied()
    }

    pub fn contains<'a>(&self, lookup: impl Into<Lookup<'a>>) -> bool {
        self.index.contains(lookup.into().hash())
    }

    pub fn entry_path(&self, hash: u64) -> PathBuf {
        self.dir.join(entry_file_name(hash))
    }

    /// Decode the entry for a key or hash. Unknown hashes fail before any file is opened.
    pub fn get<'a>(&self, lookup: impl Into<Lookup<'a>>) -> Result<CacheEntry, CacheError> {
        let hash = lookup.into().hash();
        if !self.index.contains(hash) {
            return Err(CacheError::UnknownKey(hash));
        }
        CacheEntry::open(self.entry_path(hash))
    }

    /// Paths of every entry the index claims, existing or not.
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.hashes().map(move |hash| self.entry_path(hash))
    }

    /// Entries decoded one at a time as the iterator is consumed. A failing item
    /// does not end the iteration.
    pub fn entries(&self) -> impl Iterator<Item = (u64, Result<CacheEntry, CacheError>)> + '_ {
        self.hashes().map(move |hash| (hash, CacheEntry::open(self.entry_path(hash))))
    }

    /// Decode every entry on `workers` threads (0 = one per cpu). Results come back
    /// in completion order, one per known hash.
    pub fn par_entries(&self, workers: usize) -> Vec<(u64, Result<CacheEntry, CacheError>)> {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        let (job_tx, job_rx) = unbounded::<(u64, PathBuf)>();
        let (result_tx, result_rx) = unbounded();

        for hash in self.hashes() {
            // receiver is alive until the end of this function
            let _ = job_tx.send((hash, self.entry_path(hash)));
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok((hash, path)) = job_rx.recv() {
                        let result = CacheEntry::open(&path);
                        if let Err(e) = &result {
                            warn!(hash = %format!("{:016x}", hash), error = %e, "entry decode failed");
                        }
                        if result_tx.send((hash, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        result_rx.into_iter().collect()
    }
}
