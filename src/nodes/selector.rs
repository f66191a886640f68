//! Lora Selector node
//!
//! Five LoRA slots in, the same five names plus a stack out.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::core::model::{LoraStack, LoraStackEntry, NONE_SENTINEL};
use crate::core::render::{Render, RenderConfig, Renderer};

/// Number of selection slots on the node
pub const SLOT_COUNT: usize = 5;

/// Default strengths given to selected LoRAs
pub const DEFAULT_MODEL_STRENGTH: f32 = 1.0;
pub const DEFAULT_CLIP_STRENGTH: f32 = 0.0;

/// Build a stack from the set slots, in slot order
pub fn assemble_stack<T: AsRef<str>>(slots: &[T]) -> LoraStack {
    slots
        .iter()
        .map(|slot| slot.as_ref())
        .filter(|name| *name != NONE_SENTINEL)
        .map(|name| LoraStackEntry::new(name, DEFAULT_MODEL_STRENGTH, DEFAULT_CLIP_STRENGTH))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectorOutput {
    /// The five slot values, passed through unchanged
    pub names: Vec<String>,
    pub lora_stack: LoraStack,
}

impl Render for SelectorOutput {
    fn to_text(&self) -> String {
        serde_json::to_string(&self.lora_stack).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Run the selector; omitted slots are unset
pub fn return_lora_selections(names: &[String]) -> SelectorOutput {
    let names: Vec<String> = (0..SLOT_COUNT)
        .map(|i| {
            names
                .get(i)
                .cloned()
                .unwrap_or_else(|| NONE_SENTINEL.to_string())
        })
        .collect();
    let lora_stack = assemble_stack(&names);

    SelectorOutput { names, lora_stack }
}

/// Run the select command
pub fn run_select(names: &[String], render: RenderConfig) -> Result<()> {
    if names.len() > SLOT_COUNT {
        bail!(
            "At most {} LoRAs can be selected, got {}",
            SLOT_COUNT,
            names.len()
        );
    }

    let output = return_lora_selections(names);
    Renderer::with_config(render).print(&output);
    Ok(())
}
