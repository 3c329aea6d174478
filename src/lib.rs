//! simple_cache_reader: read-only decoder for browser "simple" disk cache directories.
//!
//! # Usage
//! Open a cache directory with [`CacheView::load`], then look entries up by key or
//! by hash. Single exported entry files decode with [`CacheEntry::open`].

pub mod error;
pub mod window;
pub mod hasher;
pub mod entry;
pub mod index;
pub mod cache_view;

pub use cache_view::{CacheView, Lookup};
pub use entry::{decode_entry, CacheEntry};
pub use error::{CacheError, FormatError};
pub use hasher::hash;
pub use index::{decode_index, IndexRecord, SUPPORTED_INDEX_VERSION};
