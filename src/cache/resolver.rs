//! Tag resolution policy
//!
//! Serves tags from the cache file when it has an entry, otherwise hashes the
//! LoRA file and asks the lookup service. Whatever the service answers, the
//! result is stored, so a failed or empty lookup is not repeated until the
//! caller forces it.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::backends::civitai::TagLookup;
use crate::backends::folders::FileStore;
use crate::cache::store::TagCache;
use crate::config::Config;
use crate::core::error::{LoraTagsError, Result};
use crate::core::model::{LoraTags, TagOrigin, LORA_CATEGORY};
use crate::core::paths::DEFAULT_CACHE_FILE;
use crate::core::render::{Render, RenderConfig, Renderer};
use crate::core::util::sha256_file;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Location of the JSON tag cache
    pub cache_path: PathBuf,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

pub struct TagCacheResolver<S, L> {
    config: ResolverConfig,
    store: S,
    lookup: L,
}

impl<S: FileStore, L: TagLookup> TagCacheResolver<S, L> {
    pub fn new(config: ResolverConfig, store: S, lookup: L) -> Self {
        Self {
            config,
            store,
            lookup,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.config.cache_path
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Cached tags for an identifier, without any lookup
    pub fn cached(&self, name: &str) -> Option<Vec<String>> {
        TagCache::load(self.cache_path()).get(name).cloned()
    }

    /// Resolve the trigger words for an identifier
    pub fn resolve(&self, name: &str, force_fetch: bool) -> Vec<String> {
        self.resolve_detailed(name, force_fetch).tags
    }

    /// Resolve the trigger words and report where they came from
    pub fn resolve_detailed(&self, name: &str, force_fetch: bool) -> LoraTags {
        let cache = TagCache::load(self.cache_path());
        if !force_fetch {
            if let Some(tags) = cache.get(name) {
                debug!("Cache hit for {} ({} tags)", name, tags.len());
                return LoraTags::new(name, tags.clone(), TagOrigin::Cache);
            }
        }

        let (path, hash) = match self.hash_of(name) {
            Ok(found) => found,
            Err(e) => {
                warn!("{}", e);
                return LoraTags::new(name, Vec::new(), TagOrigin::Missing);
            }
        };
        debug!("{:?} has sha256 {}", path, hash);

        let (tags, origin) = match self.lookup.trained_words(&hash) {
            Ok(Some(words)) if !words.is_empty() => {
                info!("Found {} trigger words for {}", words.len(), name);
                (words, TagOrigin::Remote)
            }
            Ok(_) => {
                info!("No trigger words listed for {}", name);
                (Vec::new(), TagOrigin::NegativeCache)
            }
            Err(e) if e.is_remote() => {
                warn!("Lookup for {} failed, caching empty result: {}", name, e);
                (Vec::new(), TagOrigin::Unavailable)
            }
            Err(e) => {
                error!("Lookup for {} failed, caching empty result: {}", name, e);
                (Vec::new(), TagOrigin::Unavailable)
            }
        };

        if let Err(e) = TagCache::persist_entry(self.cache_path(), name, &tags) {
            error!("{}", e);
        }

        LoraTags::new(name, tags, origin)
    }

    /// Locate an identifier's file and compute its content hash
    pub fn hash_of(&self, name: &str) -> Result<(PathBuf, String)> {
        let path = self
            .store
            .resolve_path(LORA_CATEGORY, name)
            .filter(|p| p.exists())
            .ok_or_else(|| LoraTagsError::NotFound(name.to_string()))?;

        info!("Calculating hash for {:?}", path);
        let hash = sha256_file(&path)?;
        Ok((path, hash))
    }
}

#[derive(Debug, Serialize)]
pub struct HashOutput {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
}

impl Render for HashOutput {
    fn to_text(&self) -> String {
        format!("{}  {}", self.sha256, self.name)
    }
}

/// Run the hash command
pub fn run_hash(config: &Config, name: &str, render: RenderConfig) -> anyhow::Result<()> {
    let resolver = config.resolver()?;
    let (path, sha256) = resolver.hash_of(name)?;

    let output = HashOutput {
        name: name.to_string(),
        path,
        sha256,
    };
    Renderer::with_config(render).print(&output);
    Ok(())
}
