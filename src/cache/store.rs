//! Cache store - Read/write the flat JSON tag cache
//!
//! The file is a single object mapping LoRA file names to ordered tag lists.
//! It is always read and written whole.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::error::{LoraTagsError, Result};
use crate::core::render::{Render, RenderConfig, Renderer};

/// Serializes load-merge-save cycles within this process
static WRITE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// In-memory view of the tag cache file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCache {
    entries: BTreeMap<String, Vec<String>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cache file, failing on missing or malformed content
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| LoraTagsError::CacheRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let entries: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| LoraTagsError::CacheRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self { entries })
    }

    /// Read the cache file, treating any read failure as an empty cache
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(cache) => cache,
            Err(e) => {
                debug!("{}; starting from an empty tag cache", e);
                Self::new()
            }
        }
    }

    /// Write the whole map, pretty-printed with four-space indentation
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.entries.serialize(&mut ser)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| LoraTagsError::CacheWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(path, buf).map_err(|source| LoraTagsError::CacheWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Store one entry on disk, re-reading the file under the process-wide
    /// lock so concurrent writers in this process keep each other's entries
    pub fn persist_entry(path: &Path, name: &str, tags: &[String]) -> Result<Self> {
        let _guard = WRITE_LOCK.lock();
        let mut cache = Self::load(path);
        if cache.contains(name) {
            debug!("Replacing cache entry for {}", name);
        }
        cache.insert(name, tags.to_vec());
        cache.save(path)?;
        Ok(cache)
    }

    pub fn get(&self, name: &str) -> Option<&Vec<String>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, tags: Vec<String>) {
        self.entries.insert(name.into(), tags);
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<String>> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache contents as printed by `cache show`
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CacheView {
    pub entries: BTreeMap<String, Vec<String>>,
}

impl Render for CacheView {
    fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|(name, tags)| format!("{}: {}", name, tags.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run the cache show command
pub fn run_cache_show(
    config: &Config,
    name: Option<&str>,
    render: RenderConfig,
) -> anyhow::Result<()> {
    let cache = TagCache::load(&config.cache_file);
    if cache.is_empty() {
        info!("Tag cache {:?} has no entries", config.cache_file);
    } else {
        debug!("Tag cache {:?} has {} entries", config.cache_file, cache.len());
    }
    let entries = match name {
        Some(name) => {
            let tags = cache
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("No cache entry for {}", name))?;
            BTreeMap::from([(name.to_string(), tags)])
        }
        None => cache.entries().clone(),
    };

    Renderer::with_config(render).print(&CacheView { entries });
    Ok(())
}
