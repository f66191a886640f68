//! Backends module - External collaborators
//!
//! Provides:
//! - folders: Model folder registry (name listing and path lookup)
//! - civitai: Trigger-word lookup by content hash over HTTP
//! - weights: Safetensors loading with a one-slot cache

pub mod civitai;
pub mod folders;
pub mod weights;
