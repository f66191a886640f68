//! Model folder registry
//!
//! Maps a category ("loras") to one or more directories and answers the two
//! questions the nodes ask of the host's file registry: which files exist, and
//! where a given one lives.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::core::model::{LORA_CATEGORY, NONE_SENTINEL};
use crate::core::paths::{is_model_file, join_within, make_relative};
use crate::core::render::{Render, RenderConfig, Renderer};
use crate::core::util::sort_case_insensitive;

/// Name-to-path lookup for model files
pub trait FileStore {
    /// Every known file name in the category, sorted case-insensitively
    fn list_known(&self, category: &str) -> Vec<String>;

    /// Path of the named file, if it exists in any folder of the category
    fn resolve_path(&self, category: &str, name: &str) -> Option<PathBuf>;
}

/// Folder-backed file store
#[derive(Debug, Clone, Default)]
pub struct ModelFolders {
    folders: HashMap<String, Vec<PathBuf>>,
}

impl ModelFolders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a folder for a category; earlier folders win on name clashes
    pub fn add_folder(&mut self, category: &str, folder: impl Into<PathBuf>) {
        self.folders
            .entry(category.to_string())
            .or_default()
            .push(folder.into());
    }

    pub fn with_folders(category: &str, folders: &[PathBuf]) -> Self {
        let mut store = Self::new();
        for folder in folders {
            store.add_folder(category, folder.clone());
        }
        store
    }

    pub fn folders(&self, category: &str) -> &[PathBuf] {
        self.folders
            .get(category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

fn scan_folder(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_model_file(entry.path()))
        .filter_map(|entry| make_relative(entry.path(), root))
        .collect()
}

impl FileStore for ModelFolders {
    fn list_known(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for folder in self.folders(category) {
            if !folder.is_dir() {
                debug!("Skipping missing folder {:?}", folder);
                continue;
            }
            for name in scan_folder(folder) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        sort_case_insensitive(&mut names);
        names
    }

    /// Names are confined to the folder lexically; symlinked files resolve
    /// wherever they point, matching what `list_known` reports
    fn resolve_path(&self, category: &str, name: &str) -> Option<PathBuf> {
        self.folders(category)
            .iter()
            .filter_map(|folder| join_within(folder, name))
            .find(|candidate| candidate.is_file())
    }
}

#[derive(Debug, Serialize)]
pub struct NameList {
    pub names: Vec<String>,
}

impl Render for NameList {
    fn to_text(&self) -> String {
        self.names.join("\n")
    }
}

/// Run the list command
pub fn run_list(config: &Config, with_none: bool, render: RenderConfig) -> Result<()> {
    let mut names = Vec::new();
    if with_none {
        names.push(NONE_SENTINEL.to_string());
    }
    names.extend(config.folders().list_known(LORA_CATEGORY));

    Renderer::with_config(render).print(&NameList { names });
    Ok(())
}
