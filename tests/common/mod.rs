// Byte-level builders for synthetic cache files. Written against the on-disk layout
// directly so the decoder is never used to produce its own fixtures.
#![allow(dead_code)]

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const ENTRY_MAGIC: u64 = 0xfcfb6d1ba7725c30;
pub const EOF_MAGIC: u64 = 0xf4fa6f45970d41d8;
pub const INDEX_MAGIC: u64 = 0x656e74657220796f;

pub const FLAG_CRC32: u32 = 0x01;
pub const FLAG_SHA256: u32 = 0x02;

pub fn entry_header(key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + key.len());
    out.extend_from_slice(&ENTRY_MAGIC.to_le_bytes());
    out.extend_from_slice(&5u32.to_le_bytes());
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(&0xdead_beefu32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(key.as_bytes());
    out
}

pub fn eof_record(flags: u32, crc: u32, size: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&EOF_MAGIC.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out
}

/// `[data][sha256?][eof]` with checksums filled in according to `flags`.
pub fn stream_block(data: &[u8], flags: u32) -> Vec<u8> {
    let mut out = data.to_vec();
    if flags & FLAG_SHA256 != 0 {
        out.extend_from_slice(&Sha256::digest(data));
    }
    let crc = if flags & FLAG_CRC32 != 0 { crc32fast::hash(data) } else { 0 };
    out.extend(eof_record(flags, crc, data.len() as u32));
    out
}

/// Entry file with the given stream blocks in file order (stream 1 first, if any).
pub fn entry_file(key: &str, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = entry_header(key);
    for block in blocks {
        out.extend_from_slice(block);
    }
    out
}

pub fn single_stream_entry(key: &str, payload: &[u8], flags: u32) -> Vec<u8> {
    entry_file(key, &[stream_block(payload, flags)])
}

/// Index payload (no envelope) with one 24-byte record per hash.
pub fn index_payload(version: u32, entry_count: u64, cache_size: u64, hashes: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&INDEX_MAGIC.to_le_bytes());
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&cache_size.to_le_bytes());
    if version >= 7 {
        out.extend_from_slice(&3u32.to_le_bytes());
    }
    for hash in hashes {
        out.extend_from_slice(&hash.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]);
    }
    out
}

pub fn wrap_envelope(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn index_file(version: u32, hashes: &[u64]) -> Vec<u8> {
    wrap_envelope(&index_payload(version, hashes.len() as u64, 4096, hashes))
}

/// Lay out a cache directory: index plus one entry file per (key, payload).
pub fn write_cache_dir(root: &Path, entries: &[(&str, &[u8])]) -> Vec<u64> {
    let hashes: Vec<u64> = entries.iter().map(|(k, _)| simple_cache_reader::hash(k)).collect();
    write_index(root, &index_file(9, &hashes));
    for ((key, payload), hash) in entries.iter().zip(&hashes) {
        let path = root.join(simple_cache_reader::cache_view::entry_file_name(*hash));
        fs::write(path, single_stream_entry(key, payload, FLAG_CRC32)).unwrap();
    }
    hashes
}

pub fn write_index(root: &Path, bytes: &[u8]) {
    let index_dir = root.join("index-dir");
    fs::create_dir_all(&index_dir).unwrap();
    fs::write(index_dir.join("the-real-index"), bytes).unwrap();
}
