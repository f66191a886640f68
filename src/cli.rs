//! CLI module - Command-line interface definitions and handlers
//!
//! Each node is exposed as a subcommand so the same behavior the host sees can
//! be driven from a shell.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, DEFAULT_LORAS_DIR};
use crate::core::model::{LoraStack, SelectionMode};
use crate::core::paths::DEFAULT_CACHE_FILE;
use crate::core::render::{OutputFormat, RenderConfig};
use crate::nodes::fetch_tags::FetchRequest;
use crate::nodes::loader::LoaderRequest;

/// loratags - LoRA selection, trigger-word lookup and tag caching.
#[derive(Parser, Debug)]
#[command(name = "loratags")]
#[command(
    author,
    version,
    about,
    long_about = r#"loratags looks up the trigger words of LoRA files by content hash,
caches them in a flat JSON file and splices them into prompts.

Each subcommand runs one of the graph nodes:
- fetch: Fetch Lora Tags
- select: Lora Selector
- load: LoraLoaderTagsQuery

Examples:
    loratags list
    loratags fetch --lora anime.safetensors
    loratags fetch --mode prompt --prompt "a <lora:anime> portrait" --header
    loratags select anime.safetensors None style.safetensors
    loratags load --lora anime.safetensors --prompt "a portrait"
"#
)]
pub struct Cli {
    /// Folder holding LoRA files (repeatable; earlier folders win).
    #[arg(
        long = "loras-dir",
        global = true,
        env = "LORATAGS_LORAS_DIR",
        value_name = "DIR",
        value_delimiter = ',',
        default_value = DEFAULT_LORAS_DIR
    )]
    pub loras_dirs: Vec<PathBuf>,

    /// Path of the JSON tag cache.
    #[arg(
        long,
        global = true,
        env = "LORATAGS_CACHE_FILE",
        value_name = "FILE",
        default_value = DEFAULT_CACHE_FILE
    )]
    pub cache_file: PathBuf,

    /// Base URL of the model-version lookup service.
    #[arg(
        long,
        global = true,
        env = "LORATAGS_API_BASE",
        value_name = "URL",
        default_value = crate::backends::civitai::DEFAULT_API_BASE
    )]
    pub api_base: String,

    /// Request timeout in seconds (HTTP client default when omitted).
    #[arg(long, global = true, env = "LORATAGS_TIMEOUT_SECS", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Output format (text/json).
    #[arg(long, global = true, default_value = "text", value_name = "FORMAT")]
    pub format: String,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Quiet mode (warnings and errors only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug diagnostics).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List known LoRA files.
    #[command(long_about = "List every model file under the LoRA folders, sorted\n\
case-insensitively, one per line.\n\n\
Examples:\n\
  loratags list\n\
  loratags list --with-none\n")]
    List {
        /// Prepend the "None" entry used by the selector's dropdowns.
        #[arg(long)]
        with_none: bool,
    },

    /// Fetch trigger words for one or more LoRAs (Fetch Lora Tags node).
    #[command(
        long_about = r#"Resolve trigger words for the selected LoRAs and print them as a
single string, one line per LoRA.

Tags come from the cache file when it has an entry (an empty entry means
"looked up, nothing found"); otherwise the file is hashed and the lookup
service is queried, and the answer is cached either way.

Examples:
    loratags fetch --lora anime.safetensors
    loratags fetch --mode prompt --prompt "a <lora:anime> and <lora:style>"
    loratags select a.safetensors b.safetensors | loratags fetch --mode stack --stack -
"#
    )]
    Fetch(FetchArgs),

    /// Pick up to five LoRAs and build a stack (Lora Selector node).
    #[command(long_about = "Build a LoRA stack from up to five names. \"None\" marks an\n\
unset slot and is skipped. Each entry gets model strength 1.0 and clip strength 0.0.\n\n\
Example:\n\
  loratags select a.safetensors None c.safetensors\n")]
    Select {
        /// LoRA names (use None for an unset slot).
        #[arg(value_name = "NAME", num_args = 0..=5)]
        names: Vec<String>,
    },

    /// Load a LoRA and append its trigger words to a prompt (LoraLoaderTagsQuery node).
    Load(LoadArgs),

    /// Print the SHA-256 used to look up a LoRA.
    Hash {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Inspect the tag cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Describe the registered nodes and their typed slots.
    Nodes,

    /// Check whether a node output may be wired into another node's input.
    #[command(long_about = "Type-check one wire between two node slots, written as\n\
NODE.SLOT. The wildcard type * matches anything. Fails when the types differ.\n\n\
Example:\n\
  loratags connect \"Lora Selector.lora_stack\" \"Fetch Lora Tags.lora_stack\"\n")]
    Connect {
        #[arg(value_name = "FROM")]
        from: String,
        #[arg(value_name = "TO")]
        to: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show all cache entries, or a single one.
    Show {
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Selection mode (selected/prompt/stack).
    #[arg(long, default_value = "selected", value_name = "MODE")]
    pub mode: String,

    /// LoRA to look up in "selected" mode.
    #[arg(long, default_value = "", value_name = "NAME")]
    pub lora: String,

    /// Prompt text scanned for <lora:NAME> references in "prompt" mode.
    #[arg(long, default_value = "", value_name = "TEXT")]
    pub prompt: String,

    /// LoRA stack as JSON (e.g. [["a.safetensors",1.0,0.0]]), or - to read stdin.
    #[arg(long, value_name = "JSON")]
    pub stack: Option<String>,

    /// Log the tags found for each LoRA.
    #[arg(long)]
    pub print_tags: bool,

    /// Query the lookup service even when the cache has an entry.
    #[arg(long)]
    pub force_fetch: bool,

    /// Emit "name:" headers followed by one tag per line.
    #[arg(long)]
    pub header: bool,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    #[arg(long, value_name = "NAME")]
    pub lora: String,

    #[arg(long, default_value_t = 1.0, value_name = "F", allow_negative_numbers = true)]
    pub strength_model: f32,

    #[arg(long, default_value_t = 1.0, value_name = "F", allow_negative_numbers = true)]
    pub strength_clip: f32,

    /// Do not query the lookup service when the cache has no tags.
    #[arg(long)]
    pub no_query_tags: bool,

    /// Do not append tags to --prompt.
    #[arg(long)]
    pub no_tags_out: bool,

    #[arg(long)]
    pub print_tags: bool,

    /// Pass the prompt through without loading anything.
    #[arg(long)]
    pub bypass: bool,

    #[arg(long)]
    pub force_fetch: bool,

    /// Prompt to append the trigger words to.
    #[arg(long, value_name = "TEXT")]
    pub prompt: Option<String>,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            loras_dirs: self.loras_dirs.clone(),
            cache_file: self.cache_file.clone(),
            api_base: self.api_base.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn parse_stack(raw: &str) -> Result<LoraStack> {
    let json = if raw == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stack from stdin")?
    } else {
        raw.to_string()
    };
    serde_json::from_str(json.trim()).context("Invalid LoRA stack JSON")
}

impl FetchArgs {
    fn to_request(&self) -> Result<FetchRequest> {
        let selection_mode: SelectionMode = self
            .mode
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let lora_stack = match &self.stack {
            Some(raw) => parse_stack(raw)?,
            None => LoraStack::new(),
        };

        Ok(FetchRequest {
            selection_mode,
            lora_name: self.lora.clone(),
            print_tags: self.print_tags,
            force_fetch: self.force_fetch,
            use_header_format: self.header,
            prompt_text: self.prompt.clone(),
            lora_stack,
        })
    }
}

impl LoadArgs {
    fn to_request(&self) -> LoaderRequest {
        LoaderRequest {
            lora_name: self.lora.clone(),
            strength_model: self.strength_model,
            strength_clip: self.strength_clip,
            query_tags: !self.no_query_tags,
            tags_out: !self.no_tags_out,
            print_tags: self.print_tags,
            bypass: self.bypass,
            force_fetch: self.force_fetch,
            opt_prompt: self.prompt.clone(),
        }
    }
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let render_config = RenderConfig::with_pretty(format, cli.pretty);
    let config = cli.config();

    match &cli.command {
        Commands::List { with_none } => {
            crate::backends::folders::run_list(&config, *with_none, render_config)
        }

        Commands::Fetch(args) => {
            let request = args.to_request()?;
            crate::nodes::fetch_tags::run_fetch(&config, &request, render_config)
        }

        Commands::Select { names } => crate::nodes::selector::run_select(names, render_config),

        Commands::Load(args) => {
            crate::nodes::loader::run_load(&config, &args.to_request(), render_config)
        }

        Commands::Hash { name } => crate::cache::resolver::run_hash(&config, name, render_config),

        Commands::Cache { action } => match action {
            CacheCommands::Show { name } => {
                crate::cache::store::run_cache_show(&config, name.as_deref(), render_config)
            }
        },

        Commands::Nodes => crate::nodes::run_nodes(&config, render_config),

        Commands::Connect { from, to } => {
            crate::nodes::run_connect(&config, from, to, render_config)
        }
    }
}
