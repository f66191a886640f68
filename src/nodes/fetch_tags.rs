//! Fetch Lora Tags node
//!
//! Expands a selection (one LoRA, every `<lora:NAME>` in a prompt, or a LoRA
//! stack) into identifiers, resolves each one's trigger words and renders them
//! into a single prompt-ready string.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::backends::civitai::TagLookup;
use crate::backends::folders::FileStore;
use crate::cache::resolver::TagCacheResolver;
use crate::config::Config;
use crate::core::model::{LoraStack, LoraTags, SelectionMode};
use crate::core::paths::ensure_extension;
use crate::core::render::{Render, RenderConfig, Renderer};
use crate::core::util::join_tags;
use crate::nodes::TAGS_LOG_TARGET;

/// Inline LoRA reference in prompt text: `<lora:NAME>`
pub static LORA_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<lora:([^>]+)>").expect("Invalid LORA_REF_RE regex"));

/// Every `<lora:NAME>` reference in order of appearance, duplicates kept
pub fn extract_lora_references(prompt_text: &str) -> Vec<String> {
    LORA_REF_RE
        .captures_iter(prompt_text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Identifiers selected by the given mode, before extension normalization
pub fn expand_identifiers(
    mode: SelectionMode,
    lora_name: &str,
    prompt_text: &str,
    lora_stack: &LoraStack,
) -> Vec<String> {
    match mode {
        SelectionMode::SelectedLora => vec![lora_name.to_string()],
        SelectionMode::TextPrompt => extract_lora_references(prompt_text),
        SelectionMode::LoraStack => lora_stack
            .iter()
            .map(|entry| entry.name().to_string())
            .collect(),
    }
}

/// Render resolved tags; LoRAs without tags contribute nothing
pub fn format_tags(results: &[LoraTags], use_header_format: bool) -> String {
    let mut lines: Vec<String> = Vec::new();

    for result in results.iter().filter(|r| !r.tags.is_empty()) {
        if use_header_format {
            lines.push(format!("{}:", result.name));
            lines.extend(result.tags.iter().cloned());
        } else {
            lines.push(join_tags(&result.tags));
        }
    }

    lines.join("\n")
}

/// Inputs of the fetch node
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub selection_mode: SelectionMode,
    pub lora_name: String,
    pub print_tags: bool,
    pub force_fetch: bool,
    pub use_header_format: bool,
    pub prompt_text: String,
    pub lora_stack: LoraStack,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutput {
    /// The node's single STRING output
    pub output: String,
    pub loras: Vec<LoraTags>,
}

impl Render for FetchOutput {
    fn to_text(&self) -> String {
        self.output.clone()
    }
}

/// Run the fetch node against a resolver
pub fn fetch_trigger_tags<S: FileStore, L: TagLookup>(
    resolver: &TagCacheResolver<S, L>,
    request: &FetchRequest,
) -> FetchOutput {
    let identifiers = expand_identifiers(
        request.selection_mode,
        &request.lora_name,
        &request.prompt_text,
        &request.lora_stack,
    );

    let loras: Vec<LoraTags> = identifiers
        .iter()
        .map(|name| {
            let name = ensure_extension(name);
            let result = resolver.resolve_detailed(&name, request.force_fetch);
            if request.print_tags && !result.tags.is_empty() {
                info!(
                    target: TAGS_LOG_TARGET,
                    "Tags for {}: {}",
                    result.name,
                    join_tags(&result.tags)
                );
            }
            result
        })
        .collect();

    FetchOutput {
        output: format_tags(&loras, request.use_header_format),
        loras,
    }
}

/// Run the fetch command
pub fn run_fetch(config: &Config, request: &FetchRequest, render: RenderConfig) -> Result<()> {
    let resolver = config.resolver()?;
    let output = fetch_trigger_tags(&resolver, request);
    Renderer::with_config(render).print(&output);
    Ok(())
}
