//! Runtime configuration
//!
//! Collected from CLI flags (each also readable from the environment) and
//! passed explicitly to whatever needs it.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::backends::civitai::{CivitaiClient, DEFAULT_API_BASE};
use crate::backends::folders::ModelFolders;
use crate::cache::resolver::{ResolverConfig, TagCacheResolver};
use crate::core::model::LORA_CATEGORY;
use crate::core::paths::DEFAULT_CACHE_FILE;

/// Default folder backing the "loras" category
pub const DEFAULT_LORAS_DIR: &str = "./models/loras";

#[derive(Debug, Clone)]
pub struct Config {
    /// Folders searched for LoRA files, in priority order
    pub loras_dirs: Vec<PathBuf>,
    pub cache_file: PathBuf,
    pub api_base: String,
    /// Request timeout; the HTTP client default applies when unset
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loras_dirs: vec![PathBuf::from(DEFAULT_LORAS_DIR)],
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: None,
        }
    }
}

impl Config {
    pub fn folders(&self) -> ModelFolders {
        ModelFolders::with_folders(LORA_CATEGORY, &self.loras_dirs)
    }

    pub fn resolver(&self) -> Result<TagCacheResolver<ModelFolders, CivitaiClient>> {
        let client = CivitaiClient::new(&self.api_base, self.timeout)
            .context("Failed to build HTTP client")?;
        Ok(TagCacheResolver::new(
            ResolverConfig {
                cache_path: self.cache_file.clone(),
            },
            self.folders(),
            client,
        ))
    }
}
