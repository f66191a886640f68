//! Nodes module - The graph nodes exposed to the host
//!
//! Provides:
//! - fetch_tags: Resolve trigger words for one or many LoRAs
//! - selector: Pick up to five LoRAs and build a stack
//! - loader: Load a LoRA and splice its trigger words into a prompt
//!
//! Also describes every node's typed input and output slots so the host can
//! register them and type-check connections.

pub mod fetch_tags;
pub mod loader;
pub mod selector;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;

use crate::backends::folders::FileStore;
use crate::config::Config;
use crate::core::model::{SelectionMode, LORA_CATEGORY, NONE_SENTINEL};
use crate::core::render::{Render, RenderConfig, Renderer};

/// Category every node is listed under
pub const NODE_CATEGORY: &str = "loaders";

/// Log target for tags printed on request; stays enabled under `--quiet`
pub const TAGS_LOG_TARGET: &str = "loratags::tags";

/// Type of an input or output slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SlotType {
    #[serde(rename = "MODEL")]
    Model,
    #[serde(rename = "CLIP")]
    Clip,
    #[serde(rename = "STRING")]
    String {
        default: String,
        multiline: bool,
        force_input: bool,
    },
    #[serde(rename = "BOOLEAN")]
    Boolean { default: bool },
    #[serde(rename = "FLOAT")]
    Float {
        default: f32,
        min: f32,
        max: f32,
        step: f32,
    },
    #[serde(rename = "COMBO")]
    Choice {
        options: Vec<String>,
        default: Option<String>,
    },
    #[serde(rename = "LORA_STACK")]
    LoraStack,
    /// Matches any other slot type
    #[serde(rename = "*")]
    Any,
}

impl SlotType {
    pub fn type_name(&self) -> &'static str {
        match self {
            SlotType::Model => "MODEL",
            SlotType::Clip => "CLIP",
            SlotType::String { .. } => "STRING",
            SlotType::Boolean { .. } => "BOOLEAN",
            SlotType::Float { .. } => "FLOAT",
            SlotType::Choice { .. } => "COMBO",
            SlotType::LoraStack => "LORA_STACK",
            SlotType::Any => "*",
        }
    }

    /// Whether an output of type `self` may feed an input of type `input`
    pub fn accepts(&self, input: &SlotType) -> bool {
        matches!(self, SlotType::Any)
            || matches!(input, SlotType::Any)
            || self.type_name() == input.type_name()
    }

    fn string() -> Self {
        SlotType::String {
            default: String::new(),
            multiline: false,
            force_input: false,
        }
    }

    fn boolean(default: bool) -> Self {
        SlotType::Boolean { default }
    }

    fn strength() -> Self {
        SlotType::Float {
            default: 1.0,
            min: loader::STRENGTH_MIN,
            max: loader::STRENGTH_MAX,
            step: loader::STRENGTH_STEP,
        }
    }

    fn choice(options: Vec<String>, default: Option<&str>) -> Self {
        SlotType::Choice {
            options,
            default: default.map(|d| d.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub name: String,
    #[serde(flatten)]
    pub ty: SlotType,
}

impl Slot {
    fn new(name: &str, ty: SlotType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// Registration entry for one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeSpec {
    /// Key in the host's class mapping
    pub key: &'static str,
    pub category: &'static str,
    pub function: &'static str,
    pub required: Vec<Slot>,
    pub optional: Vec<Slot>,
    pub outputs: Vec<Slot>,
}

impl NodeSpec {
    pub fn input(&self, name: &str) -> Option<&Slot> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|slot| slot.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Slot> {
        self.outputs.iter().find(|slot| slot.name == name)
    }
}

/// Whether `from.output` may be wired into `to.input`
pub fn can_connect(from: &NodeSpec, output: &str, to: &NodeSpec, input: &str) -> bool {
    match (from.output(output), to.input(input)) {
        (Some(out), Some(inp)) => out.ty.accepts(&inp.ty),
        _ => false,
    }
}

fn loader_spec(loras: &[String]) -> NodeSpec {
    NodeSpec {
        key: "LoraLoaderTagsQuery",
        category: NODE_CATEGORY,
        function: "load_lora",
        required: vec![
            Slot::new("model", SlotType::Model),
            Slot::new("clip", SlotType::Clip),
            Slot::new("lora_name", SlotType::choice(loras.to_vec(), None)),
            Slot::new("strength_model", SlotType::strength()),
            Slot::new("strength_clip", SlotType::strength()),
            Slot::new("query_tags", SlotType::boolean(true)),
            Slot::new("tags_out", SlotType::boolean(true)),
            Slot::new("print_tags", SlotType::boolean(false)),
            Slot::new("bypass", SlotType::boolean(false)),
            Slot::new("force_fetch", SlotType::boolean(false)),
        ],
        optional: vec![Slot::new(
            "opt_prompt",
            SlotType::String {
                default: String::new(),
                multiline: false,
                force_input: true,
            },
        )],
        outputs: vec![
            Slot::new("MODEL", SlotType::Model),
            Slot::new("CLIP", SlotType::Clip),
            Slot::new("STRING", SlotType::string()),
        ],
    }
}

fn fetch_spec(loras: &[String]) -> NodeSpec {
    let modes = SelectionMode::ALL
        .iter()
        .map(|m| m.label().to_string())
        .collect();

    NodeSpec {
        key: "Fetch Lora Tags",
        category: NODE_CATEGORY,
        function: "fetch_trigger_tags",
        required: vec![
            Slot::new(
                "selection_mode",
                SlotType::choice(modes, Some(SelectionMode::SelectedLora.label())),
            ),
            Slot::new("lora_name", SlotType::choice(loras.to_vec(), None)),
            Slot::new("print_tags", SlotType::boolean(false)),
            Slot::new("force_fetch", SlotType::boolean(false)),
            Slot::new("use_header_format", SlotType::boolean(false)),
        ],
        optional: vec![
            Slot::new("lora_stack", SlotType::LoraStack),
            Slot::new(
                "prompt_text",
                SlotType::String {
                    default: String::new(),
                    multiline: false,
                    force_input: true,
                },
            ),
        ],
        outputs: vec![Slot::new("STRING", SlotType::string())],
    }
}

fn selector_spec(loras: &[String]) -> NodeSpec {
    let mut options = vec![NONE_SENTINEL.to_string()];
    options.extend(loras.iter().cloned());

    let slot_names: Vec<String> = (1..=selector::SLOT_COUNT)
        .map(|i| format!("lora_name_{}", i))
        .collect();
    let slots: Vec<Slot> = slot_names
        .iter()
        .map(|name| Slot::new(name, SlotType::choice(options.clone(), Some(NONE_SENTINEL))))
        .collect();
    let (required, optional) = slots.split_at(1);

    let mut outputs: Vec<Slot> = slot_names
        .iter()
        .map(|name| Slot::new(name, SlotType::Any))
        .collect();
    outputs.push(Slot::new("lora_stack", SlotType::LoraStack));

    NodeSpec {
        key: "Lora Selector",
        category: NODE_CATEGORY,
        function: "return_lora_selections",
        required: required.to_vec(),
        optional: optional.to_vec(),
        outputs,
    }
}

/// Specs for every node, with LoRA choices taken from the file store
pub fn registry<S: FileStore>(store: &S) -> Vec<NodeSpec> {
    let loras = store.list_known(LORA_CATEGORY);
    vec![
        loader_spec(&loras),
        fetch_spec(&loras),
        selector_spec(&loras),
    ]
}

#[derive(Debug, Serialize)]
pub struct NodeRegistry {
    pub nodes: Vec<NodeSpec>,
}

impl Render for NodeRegistry {
    fn to_text(&self) -> String {
        self.nodes
            .iter()
            .map(|node| {
                let inputs: Vec<String> = node
                    .required
                    .iter()
                    .chain(node.optional.iter())
                    .map(|s| format!("{}:{}", s.name, s.ty.type_name()))
                    .collect();
                let outputs: Vec<&str> = node.outputs.iter().map(|s| s.ty.type_name()).collect();
                format!(
                    "{} [{}] ({}) -> ({})",
                    node.key,
                    node.category,
                    inputs.join(", "),
                    outputs.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run the nodes command
pub fn run_nodes(config: &Config, render: RenderConfig) -> Result<()> {
    let registry = NodeRegistry {
        nodes: registry(&config.folders()),
    };
    Renderer::with_config(render).print(&registry);
    Ok(())
}

/// Outcome of checking one wire between two node slots
#[derive(Debug, Serialize)]
pub struct ConnectionCheck {
    pub from: String,
    pub to: String,
    pub from_type: &'static str,
    pub to_type: &'static str,
    pub compatible: bool,
}

impl Render for ConnectionCheck {
    fn to_text(&self) -> String {
        format!(
            "{} ({}) -> {} ({}): {}",
            self.from,
            self.from_type,
            self.to,
            self.to_type,
            if self.compatible {
                "compatible"
            } else {
                "incompatible"
            }
        )
    }
}

/// Split `Node Key.slot` into its node key and slot name
fn split_endpoint(endpoint: &str) -> Result<(&str, &str)> {
    endpoint
        .rsplit_once('.')
        .filter(|(node, slot)| !node.is_empty() && !slot.is_empty())
        .ok_or_else(|| anyhow!("Expected NODE.SLOT, got {:?}", endpoint))
}

fn find_node<'a>(nodes: &'a [NodeSpec], key: &str) -> Result<&'a NodeSpec> {
    nodes
        .iter()
        .find(|node| node.key == key)
        .ok_or_else(|| anyhow!("Unknown node {:?}", key))
}

/// Check whether output `from` (`Node Key.slot`) may feed input `to`
pub fn check_connection(nodes: &[NodeSpec], from: &str, to: &str) -> Result<ConnectionCheck> {
    let (from_key, output) = split_endpoint(from)?;
    let (to_key, input) = split_endpoint(to)?;
    let from_node = find_node(nodes, from_key)?;
    let to_node = find_node(nodes, to_key)?;

    let from_slot = from_node
        .output(output)
        .ok_or_else(|| anyhow!("{} has no output {:?}", from_key, output))?;
    let to_slot = to_node
        .input(input)
        .ok_or_else(|| anyhow!("{} has no input {:?}", to_key, input))?;

    Ok(ConnectionCheck {
        from: from.to_string(),
        to: to.to_string(),
        from_type: from_slot.ty.type_name(),
        to_type: to_slot.ty.type_name(),
        compatible: can_connect(from_node, output, to_node, input),
    })
}

/// Run the connect command; incompatible wires fail the command
pub fn run_connect(config: &Config, from: &str, to: &str, render: RenderConfig) -> Result<()> {
    let nodes = registry(&config.folders());
    let check = check_connection(&nodes, from, to)?;
    Renderer::with_config(render).print(&check);

    if !check.compatible {
        bail!("{} cannot feed {}", from, to);
    }
    Ok(())
}
