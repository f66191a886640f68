//! Common utilities

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read size used while hashing model files
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Compute the SHA-256 of a file as lowercase hex, streaming fixed-size chunks
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA-256 of bytes as lowercase hex
#[cfg(test)]
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Sort names case-insensitively, falling back to byte order for ties
pub fn sort_case_insensitive(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

/// Join tags the way prompts expect them
pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sha256_bytes_known_vector() {
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_file_matches_bytes() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("weights.safetensors");
        // Larger than one chunk so the streaming loop runs more than once
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn test_sha256_file_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("empty.safetensors");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_file_missing() {
        let temp = tempdir().unwrap();
        assert!(sha256_file(&temp.path().join("nope")).is_err());
    }

    #[test]
    fn test_sort_case_insensitive() {
        let mut names = vec![
            "beta.safetensors".to_string(),
            "Alpha.safetensors".to_string(),
            "alpha.pt".to_string(),
        ];
        sort_case_insensitive(&mut names);
        assert_eq!(
            names,
            vec!["alpha.pt", "Alpha.safetensors", "beta.safetensors"]
        );
    }

    #[test]
    fn test_join_tags() {
        let tags = vec!["t1".to_string(), "t2".to_string()];
        assert_eq!(join_tags(&tags), "t1, t2");
        assert_eq!(join_tags(&[]), "");
    }
}
