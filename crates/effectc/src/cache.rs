//! Stores for compiled descriptors keyed by file identity and content digest.
//!
//! A cache never fails a compile. Unreadable, corrupt or stale entries are
//! reported as misses and failed writes are logged.
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::descriptor::EffectDescriptor;

/// Bumped whenever the descriptor layout changes so older entries miss.
pub const CACHE_FORMAT_VERSION: u32 = 1;

pub trait EffectCache: Send + Sync {
    /// Returns the stored descriptor when `identity` was last saved with
    /// `digest`.
    fn load(&self, identity: &str, digest: &str) -> Option<EffectDescriptor>;

    fn save(&self, identity: &str, digest: &str, descriptor: &EffectDescriptor);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, EffectDescriptor)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EffectCache for MemoryCache {
    fn load(&self, identity: &str, digest: &str) -> Option<EffectDescriptor> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(identity)
            .filter(|(stored, _)| stored == digest)
            .map(|(_, descriptor)| descriptor.clone())
    }

    fn save(&self, identity: &str, digest: &str, descriptor: &EffectDescriptor) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(identity.to_string(), (digest.to_string(), descriptor.clone()));
            }
            Err(_) => warn!(identity, "memory cache lock poisoned; entry dropped"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    format: u32,
    identity: String,
    digest: String,
    descriptor: EffectDescriptor,
}

/// One JSON document per effect identity under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the entry for `identity`. The readable stem is lossy, so
    /// a hash of the full identity keeps distinct files apart.
    pub fn entry_path(&self, identity: &str) -> PathBuf {
        let stem = sanitize_stem(identity).unwrap_or_else(|| "effect".to_string());
        self.root
            .join(format!("{stem}-{:016x}.json", xxh3_64(identity.as_bytes())))
    }

    /// Deletes every cache entry and returns how many were removed.
    pub fn clear(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn read_entry(&self, path: &Path) -> Result<CacheEntry, String> {
        let text = fs::read_to_string(path).map_err(|err| err.to_string())?;
        serde_json::from_str(&text).map_err(|err| err.to_string())
    }

    fn write_entry(&self, path: &Path, entry: &CacheEntry) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_vec(entry).map_err(io::Error::other)?;
        let staging = path.with_extension("json.partial");
        fs::write(&staging, json)?;
        fs::rename(&staging, path)
    }
}

impl EffectCache for DirectoryCache {
    fn load(&self, identity: &str, digest: &str) -> Option<EffectDescriptor> {
        let path = self.entry_path(identity);
        if !path.exists() {
            return None;
        }
        match self.read_entry(&path) {
            Ok(entry)
                if entry.format == CACHE_FORMAT_VERSION
                    && entry.identity == identity
                    && entry.digest == digest =>
            {
                Some(entry.descriptor)
            }
            Ok(entry) => {
                debug!(
                    path = %path.display(),
                    format = entry.format,
                    "cache entry is stale"
                );
                None
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "cache entry unreadable");
                None
            }
        }
    }

    fn save(&self, identity: &str, digest: &str, descriptor: &EffectDescriptor) {
        let path = self.entry_path(identity);
        let entry = CacheEntry {
            format: CACHE_FORMAT_VERSION,
            identity: identity.to_string(),
            digest: digest.to_string(),
            descriptor: descriptor.clone(),
        };
        if let Err(err) = self.write_entry(&path, &entry) {
            warn!(path = %path.display(), error = %err, "failed to write effect cache entry");
        }
    }
}

fn sanitize_stem(input: &str) -> Option<String> {
    let name = Path::new(input)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(input);

    let mut result = String::new();
    let mut prev_underscore = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
            prev_underscore = false;
        } else if !result.is_empty() && !prev_underscore {
            result.push('_');
            prev_underscore = true;
        }
    }
    while result.ends_with('_') {
        result.pop();
    }
    (!result.is_empty()).then_some(result)
}
