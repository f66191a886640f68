//! Safetensors weight loading
//!
//! Reads a LoRA file into memory and validates its header. The host applies
//! the weights; this side only loads them and keeps the last load around.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::core::error::{LoraTagsError, Result};

/// Key of the free-form metadata block in a safetensors header
const METADATA_KEY: &str = "__metadata__";

/// Weights read from disk
#[derive(Debug, Clone)]
pub struct LoadedWeights {
    pub path: PathBuf,
    pub data: Arc<Vec<u8>>,
    pub tensor_names: Vec<String>,
}

impl LoadedWeights {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn tensor_count(&self) -> usize {
        self.tensor_names.len()
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> LoraTagsError {
    LoraTagsError::InvalidWeights {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Parse the header of a safetensors buffer, returning its tensor names
pub fn parse_header(path: &Path, data: &[u8]) -> Result<Vec<String>> {
    if data.len() < 8 {
        return Err(invalid(path, "file shorter than the 8-byte header length"));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[..8]);
    let header_len = u64::from_le_bytes(len_bytes);

    let end = usize::try_from(header_len)
        .ok()
        .and_then(|len| len.checked_add(8))
        .filter(|end| *end <= data.len())
        .ok_or_else(|| invalid(path, format!("header length {} exceeds file", header_len)))?;

    let header: Map<String, Value> = serde_json::from_slice(&data[8..end])
        .map_err(|e| invalid(path, format!("header is not a JSON object: {}", e)))?;

    Ok(header
        .keys()
        .filter(|key| key.as_str() != METADATA_KEY)
        .cloned()
        .collect())
}

/// Read and validate a safetensors file
pub fn load_safetensors(path: &Path) -> Result<LoadedWeights> {
    let data = fs::read(path)?;
    let tensor_names = parse_header(path, &data)?;
    debug!(
        "Loaded {:?}: {} bytes, {} tensors",
        path,
        data.len(),
        tensor_names.len()
    );

    Ok(LoadedWeights {
        path: path.to_path_buf(),
        data: Arc::new(data),
        tensor_names,
    })
}

/// Holds the most recently loaded weights
///
/// A request for the same path reuses the slot; any other path drops it first.
#[derive(Debug, Default)]
pub struct WeightsSlot {
    loaded: Option<LoadedWeights>,
}

impl WeightsSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> Result<LoadedWeights> {
        if let Some(loaded) = &self.loaded {
            if loaded.path == path {
                debug!("Reusing loaded weights for {:?}", path);
                return Ok(loaded.clone());
            }
        }

        self.loaded = None;
        let weights = load_safetensors(path)?;
        self.loaded = Some(weights.clone());
        Ok(weights)
    }

    #[cfg(test)]
    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|w| w.path.as_path())
    }
}

/// Build a minimal safetensors buffer with the given header JSON
#[cfg(test)]
pub fn encode_safetensors(header: &str, payload: &[u8]) -> Vec<u8> {
    let mut data = (header.len() as u64).to_le_bytes().to_vec();
    data.extend_from_slice(header.as_bytes());
    data.extend_from_slice(payload);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = r#"{"__metadata__":{"ss_network_dim":"8"},"lora_down.weight":{"dtype":"F32","shape":[1],"data_offsets":[0,4]},"lora_up.weight":{"dtype":"F32","shape":[1],"data_offsets":[4,8]}}"#;

    fn write_weights(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, encode_safetensors(HEADER, &[0u8; 8])).unwrap();
        path
    }

    #[test]
    fn test_parse_header_skips_metadata() {
        let data = encode_safetensors(HEADER, &[0u8; 8]);
        let names = parse_header(Path::new("x.safetensors"), &data).unwrap();
        assert_eq!(names.len(), 2);
        assert!(!names.iter().any(|n| n == METADATA_KEY));
    }

    #[test]
    fn test_parse_header_too_short() {
        let err = parse_header(Path::new("x"), b"abc").unwrap_err();
        assert!(matches!(err, LoraTagsError::InvalidWeights { .. }));
    }

    #[test]
    fn test_parse_header_length_overflow() {
        let mut data = u64::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(b"{}");
        assert!(parse_header(Path::new("x"), &data).is_err());
    }

    #[test]
    fn test_parse_header_not_json() {
        let data = encode_safetensors("nope", &[]);
        assert!(parse_header(Path::new("x"), &data).is_err());
    }

    #[test]
    fn test_load_safetensors() {
        let temp = tempdir().unwrap();
        let path = write_weights(temp.path(), "a.safetensors");

        let weights = load_safetensors(&path).unwrap();
        assert_eq!(weights.tensor_count(), 2);
        assert_eq!(weights.size(), 8 + HEADER.len() + 8);
    }

    #[test]
    fn test_slot_reuses_same_path() {
        let temp = tempdir().unwrap();
        let path = write_weights(temp.path(), "a.safetensors");

        let mut slot = WeightsSlot::new();
        let first = slot.get_or_load(&path).unwrap();

        // Removing the file proves the second call never touches disk
        fs::remove_file(&path).unwrap();
        let second = slot.get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&first.data, &second.data));
    }

    #[test]
    fn test_slot_invalidates_on_different_path() {
        let temp = tempdir().unwrap();
        let a = write_weights(temp.path(), "a.safetensors");
        let b = write_weights(temp.path(), "b.safetensors");

        let mut slot = WeightsSlot::new();
        slot.get_or_load(&a).unwrap();
        assert_eq!(slot.loaded_path(), Some(a.as_path()));

        slot.get_or_load(&b).unwrap();
        assert_eq!(slot.loaded_path(), Some(b.as_path()));
    }

    #[test]
    fn test_slot_empty_after_failed_load() {
        let temp = tempdir().unwrap();
        let a = write_weights(temp.path(), "a.safetensors");
        let bad = temp.path().join("bad.safetensors");
        fs::write(&bad, b"xx").unwrap();

        let mut slot = WeightsSlot::new();
        slot.get_or_load(&a).unwrap();
        assert!(slot.get_or_load(&bad).is_err());
        assert!(slot.loaded_path().is_none());
    }
}
