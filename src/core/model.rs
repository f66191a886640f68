//! Shared data model
//!
//! Types that flow between the resolver, the nodes and the renderer.

use serde::{Deserialize, Serialize};

/// File-store category holding LoRA files
pub const LORA_CATEGORY: &str = "loras";

/// Sentinel the host uses for an unset LoRA slot
pub const NONE_SENTINEL: &str = "None";

/// One entry of a LoRA stack: (identifier, model strength, clip strength)
///
/// Serializes as a JSON array so stacks round-trip with the host's LORA_STACK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraStackEntry(pub String, pub f32, pub f32);

impl LoraStackEntry {
    pub fn new(name: impl Into<String>, model_strength: f32, clip_strength: f32) -> Self {
        Self(name.into(), model_strength, clip_strength)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub fn model_strength(&self) -> f32 {
        self.1
    }

    #[cfg(test)]
    pub fn clip_strength(&self) -> f32 {
        self.2
    }
}

/// Ordered list of LoRAs to apply together
pub type LoraStack = Vec<LoraStackEntry>;

/// How the fetch node picks which LoRAs to look up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    #[default]
    #[serde(rename = "From Selected Lora")]
    SelectedLora,
    #[serde(rename = "From Text Prompt")]
    TextPrompt,
    #[serde(rename = "From Lora Stack")]
    LoraStack,
}

impl SelectionMode {
    pub const ALL: [SelectionMode; 3] = [
        SelectionMode::SelectedLora,
        SelectionMode::TextPrompt,
        SelectionMode::LoraStack,
    ];

    /// Label shown in the host's dropdown
    pub fn label(&self) -> &'static str {
        match self {
            SelectionMode::SelectedLora => "From Selected Lora",
            SelectionMode::TextPrompt => "From Text Prompt",
            SelectionMode::LoraStack => "From Lora Stack",
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "selected" | "from selected lora" => Ok(SelectionMode::SelectedLora),
            "prompt" | "from text prompt" => Ok(SelectionMode::TextPrompt),
            "stack" | "from lora stack" => Ok(SelectionMode::LoraStack),
            _ => Err(format!("Unknown selection mode: {}", s)),
        }
    }
}

/// Where a resolved tag list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOrigin {
    /// Served from the cache file without a lookup
    Cache,
    /// Fetched from the lookup service and stored
    Remote,
    /// The service answered without trigger words; stored as empty
    NegativeCache,
    /// The service could not be reached or refused; stored as empty
    Unavailable,
    /// No source file; nothing looked up or stored
    Missing,
}

/// Tags resolved for one LoRA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraTags {
    pub name: String,
    pub tags: Vec<String>,
    pub origin: TagOrigin,
}

impl LoraTags {
    pub fn new(name: impl Into<String>, tags: Vec<String>, origin: TagOrigin) -> Self {
        Self {
            name: name.into(),
            tags,
            origin,
        }
    }
}
