//! Cache Explorer: inspect a browser simple-cache directory or a single entry file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use simple_cache_reader::{hash, CacheEntry, CacheView, Lookup};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show index metadata
    Summary {
        dir: PathBuf,
        /// Refuse index versions newer than supported
        #[arg(long)]
        strict: bool,
    },
    /// List every entry the index knows about
    List {
        dir: PathBuf,
        #[arg(long)]
        strict: bool,
        /// Decode entries on this many threads (0 = one per cpu)
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },
    /// Decode one entry by key or 0x-prefixed hash
    Get {
        dir: PathBuf,
        key: String,
        /// Write the payload to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Decode a standalone entry file
    Entry {
        file: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the addressing hash of a key
    Hash { key: String },
}

#[derive(Serialize)]
struct EntryReport {
    hash: String,
    path: Option<String>,
    key: Option<String>,
    payload_len: Option<usize>,
    stream1_len: Option<usize>,
    error: Option<String>,
}

impl EntryReport {
    fn new(hash: Option<u64>, result: &Result<CacheEntry, simple_cache_reader::CacheError>, path: Option<&Path>) -> Self {
        let (key, payload_len, stream1_len, error) = match result {
            Ok(e) => (Some(e.key.clone()), Some(e.payload.len()), e.stream1.as_ref().map(Vec::len), None),
            Err(err) => (None, None, None, Some(err.to_string())),
        };
        EntryReport {
            hash: hash.map(|h| format!("{:016x}", h)).unwrap_or_default(),
            path: path.map(|p| p.display().to_string()),
            key,
            payload_len,
            stream1_len,
            error,
        }
    }

    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
        } else if let Some(err) = &self.error {
            println!("{} [error] {}", self.hash, err);
        } else {
            println!(
                "{} {} ({} bytes{})",
                self.hash,
                self.key.as_deref().unwrap_or(""),
                self.payload_len.unwrap_or(0),
                self.stream1_len.map(|n| format!(", stream 1: {} bytes", n)).unwrap_or_default()
            );
        }
        Ok(())
    }
}

fn parse_lookup(raw: &str) -> Result<Lookup<'_>> {
    match raw.strip_prefix("0x") {
        Some(hex_digits) => {
            let hash = u64::from_str_radix(hex_digits, 16).with_context(|| format!("invalid hash {}", raw))?;
            Ok(Lookup::Hash(hash))
        }
        None => Ok(Lookup::Key(raw)),
    }
}

fn write_payload(entry: &CacheEntry, out: Option<&Path>) -> Result<()> {
    if let Some(out) = out {
        fs::write(out, &entry.payload).with_context(|| format!("writing {}", out.display()))?;
        info!("wrote {} bytes to {}", entry.payload.len(), out.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();

    match args.command {
        Command::Summary { dir, strict } => {
            let view = CacheView::load_with(&dir, strict)?;
            let index = view.index();
            if args.json {
                println!("{}", serde_json::to_string_pretty(index)?);
            } else {
                println!("directory:       {}", view.directory().display());
                println!("version:         {}", index.version);
                println!("entry count:     {}", index.entry_count);
                println!("unique hashes:   {}", view.len());
                println!("cache size:      {} bytes", index.cache_size_bytes);
                if let Some(reason) = index.eviction_reason {
                    println!("eviction reason: {}", reason);
                }
            }
        }
        Command::List { dir, strict, threads } => {
            let view = CacheView::load_with(&dir, strict)?;
            if threads == 1 {
                for (h, result) in view.entries() {
                    EntryReport::new(Some(h), &result, Some(view.entry_path(h).as_path())).print(args.json)?;
                }
            } else {
                for (h, result) in view.par_entries(threads) {
                    EntryReport::new(Some(h), &result, Some(view.entry_path(h).as_path())).print(args.json)?;
                }
            }
        }
        Command::Get { dir, key, out } => {
            let view = CacheView::load(&dir)?;
            let lookup = parse_lookup(&key)?;
            let h = lookup.hash();
            let result = view.get(lookup);
            EntryReport::new(Some(h), &result, Some(view.entry_path(h).as_path())).print(args.json)?;
            write_payload(&result?, out.as_deref())?;
        }
        Command::Entry { file, out } => {
            let result = CacheEntry::open(&file);
            let key_hash = result.as_ref().ok().map(|e| hash(&e.key));
            EntryReport::new(key_hash, &result, Some(file.as_path())).print(args.json)?;
            let entry = result?;
            if !args.json {
                let head = &entry.payload[..entry.payload.len().min(16)];
                println!("payload head: {}", hex::encode(head));
            }
            write_payload(&entry, out.as_deref())?;
        }
        Command::Hash { key } => {
            let h = hash(&key);
            if args.json {
                println!("{}", serde_json::json!({ "key": key, "hash": format!("{:016x}", h), "file": simple_cache_reader::cache_view::entry_file_name(h) }));
            } else {
                println!("{:016x} {}", h, simple_cache_reader::cache_view::entry_file_name(h));
            }
        }
    }
    Ok(())
}
