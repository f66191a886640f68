//! Core module - Shared data structures and utilities
//!
//! This module provides:
//! - Error taxonomy (LoraTagsError)
//! - Shared model types (stacks, selection modes, tag origins)
//! - Rendering for text/json output
//! - Path and file-name helpers
//! - Hashing utilities

pub mod error;
pub mod model;
pub mod paths;
pub mod render;
pub mod util;
