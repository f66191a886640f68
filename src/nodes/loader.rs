//! LoraLoaderTagsQuery node
//!
//! Loads a LoRA for application by the host and, along the way, looks up its
//! trigger words and appends them to an optional prompt.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::backends::civitai::TagLookup;
use crate::backends::folders::FileStore;
use crate::backends::weights::WeightsSlot;
use crate::cache::resolver::TagCacheResolver;
use crate::config::Config;
use crate::core::error::LoraTagsError;
use crate::core::model::{TagOrigin, LORA_CATEGORY};
use crate::core::render::{Render, RenderConfig, Renderer};
use crate::core::util::join_tags;
use crate::nodes::TAGS_LOG_TARGET;

pub const STRENGTH_MIN: f32 = -10.0;
pub const STRENGTH_MAX: f32 = 10.0;
pub const STRENGTH_STEP: f32 = 0.1;

/// Inputs of the loader node
#[derive(Debug, Clone)]
pub struct LoaderRequest {
    pub lora_name: String,
    pub strength_model: f32,
    pub strength_clip: f32,
    pub query_tags: bool,
    pub tags_out: bool,
    pub print_tags: bool,
    pub bypass: bool,
    pub force_fetch: bool,
    pub opt_prompt: Option<String>,
}

impl Default for LoaderRequest {
    fn default() -> Self {
        Self {
            lora_name: String::new(),
            strength_model: 1.0,
            strength_clip: 1.0,
            query_tags: true,
            tags_out: true,
            print_tags: false,
            bypass: false,
            force_fetch: false,
            opt_prompt: None,
        }
    }
}

impl LoaderRequest {
    /// Bypassed requests pass the prompt through and load nothing
    pub fn is_bypassed(&self) -> bool {
        self.bypass || (self.strength_model == 0.0 && self.strength_clip == 0.0)
    }
}

/// What the host is asked to apply
#[derive(Debug, Clone, Serialize)]
pub struct AppliedLora {
    pub name: String,
    pub path: PathBuf,
    pub strength_model: f32,
    pub strength_clip: f32,
    pub size: usize,
    pub tensors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoaderOutput {
    /// The node's STRING output
    pub prompt: String,
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<AppliedLora>,
}

impl Render for LoaderOutput {
    fn to_text(&self) -> String {
        self.prompt.clone()
    }
}

/// Loader node state: the last weights it loaded
#[derive(Debug, Default)]
pub struct LoraLoaderTagsQuery {
    slot: WeightsSlot,
}

impl LoraLoaderTagsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_lora<S: FileStore, L: TagLookup>(
        &mut self,
        resolver: &TagCacheResolver<S, L>,
        request: &LoaderRequest,
    ) -> Result<LoaderOutput> {
        if request.is_bypassed() {
            return Ok(LoaderOutput {
                prompt: request.opt_prompt.clone().unwrap_or_default(),
                tags: String::new(),
                applied: None,
            });
        }

        let name = request.lora_name.as_str();
        let mut tags = match resolver.cached(name) {
            Some(cached) => {
                let joined = join_tags(&cached);
                if request.print_tags {
                    info!(target: TAGS_LOG_TARGET, "trainedWords: {}", joined);
                }
                joined
            }
            None => String::new(),
        };

        if (request.query_tags && tags.is_empty()) || request.force_fetch {
            let fetched = resolver.resolve_detailed(name, true);
            match fetched.origin {
                TagOrigin::Remote | TagOrigin::NegativeCache => {
                    tags = join_tags(&fetched.tags);
                    if request.print_tags {
                        info!(target: TAGS_LOG_TARGET, "trainedWords: {}", tags);
                    }
                }
                // No answer from the service: this call keeps the cached tags
                TagOrigin::Unavailable | TagOrigin::Missing | TagOrigin::Cache => {}
            }
        }

        let path = resolver
            .store()
            .resolve_path(LORA_CATEGORY, name)
            .ok_or_else(|| LoraTagsError::NotFound(name.to_string()))?;
        let weights = self
            .slot
            .get_or_load(&path)
            .with_context(|| format!("Failed to load LoRA weights for {}", name))?;

        let prompt = match &request.opt_prompt {
            Some(prompt) if request.tags_out => format!("{}, {}", prompt, tags),
            Some(prompt) => prompt.clone(),
            None => tags.clone(),
        };

        Ok(LoaderOutput {
            prompt,
            tags,
            applied: Some(AppliedLora {
                name: name.to_string(),
                path,
                strength_model: request.strength_model,
                strength_clip: request.strength_clip,
                size: weights.size(),
                tensors: weights.tensor_count(),
            }),
        })
    }
}

/// Run the load command
pub fn run_load(config: &Config, request: &LoaderRequest, render: RenderConfig) -> Result<()> {
    let resolver = config.resolver()?;
    let mut node = LoraLoaderTagsQuery::new();
    let output = node.load_lora(&resolver, request)?;
    Renderer::with_config(render).print(&output);
    Ok(())
}
