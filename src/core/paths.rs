//! Path and file-name helpers
//!
//! Model names are always reported relative to their folder, with '/' as separator.

use std::path::{Component, Path, PathBuf};

/// Canonical extension appended to bare LoRA identifiers
pub const LORA_EXTENSION: &str = ".safetensors";

/// Default location of the tag cache
pub const DEFAULT_CACHE_FILE: &str = "./loras_tags.json";

/// Extensions the host recognizes as model files
pub const MODEL_EXTENSIONS: &[&str] = &[
    "ckpt",
    "pt",
    "pt2",
    "bin",
    "pth",
    "safetensors",
    "pkl",
    "sft",
];

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Append the canonical extension if the identifier lacks it
pub fn ensure_extension(name: &str) -> String {
    if name.ends_with(LORA_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, LORA_EXTENSION)
    }
}

/// Whether the file has one of the recognized model extensions
pub fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MODEL_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Join a '/'-separated name onto a folder, refusing names that leave it
pub fn join_within(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let escapes = relative.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return None;
    }
    Some(root.join(name.replace('/', std::path::MAIN_SEPARATOR_STR)))
}
