//! Trigger-word lookup against the model hosting service
//!
//! A single GET by content hash. Anything other than HTTP 200 is reported as
//! an error so the resolver can negative-cache it.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::error::{LoraTagsError, Result};

/// Default base URL of the lookup service
pub const DEFAULT_API_BASE: &str = "https://civitai.com";

/// Looks up trigger words by SHA-256 content hash
pub trait TagLookup {
    /// `Ok(Some(words))` when the service knows the hash and lists trained
    /// words, `Ok(None)` when it answers without any
    fn trained_words(&self, sha256: &str) -> Result<Option<Vec<String>>>;
}

/// The subset of a model-version record the nodes care about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelVersionInfo {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "trainedWords", default)]
    pub trained_words: Option<Vec<String>>,
}

/// Blocking HTTP client for the model-version-by-hash endpoint
pub struct CivitaiClient {
    client: Client,
    api_base: String,
}

impl CivitaiClient {
    pub fn new(api_base: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LoraTagsError::RemoteUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    /// Endpoint URL for a given hash
    pub fn version_url(&self, sha256: &str) -> String {
        format!(
            "{}/api/v1/model-versions/by-hash/{}",
            self.api_base.trim_end_matches('/'),
            sha256
        )
    }

    /// Fetch the model-version record for a hash
    pub fn model_version(&self, sha256: &str) -> Result<ModelVersionInfo> {
        let url = self.version_url(sha256);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| LoraTagsError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LoraTagsError::RemoteStatus(status.as_u16()));
        }

        match response.json::<ModelVersionInfo>() {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!("Unreadable model-version response for {}: {}", sha256, e);
                Ok(ModelVersionInfo::default())
            }
        }
    }
}

impl TagLookup for CivitaiClient {
    fn trained_words(&self, sha256: &str) -> Result<Option<Vec<String>>> {
        let info = self.model_version(sha256)?;
        if let Some(name) = &info.name {
            debug!("Matched model version {:?} ({})", info.id, name);
        }
        Ok(info.trained_words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_url() {
        let client = CivitaiClient::new("https://example.com/", None).unwrap();
        assert_eq!(
            client.version_url("abc123"),
            "https://example.com/api/v1/model-versions/by-hash/abc123"
        );
    }

    #[test]
    fn test_model_version_info_parses_trained_words() {
        let json = r#"{"id": 42, "name": "v1", "trainedWords": ["t1", "t2"], "files": []}"#;
        let info: ModelVersionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.id, Some(42));
        assert_eq!(
            info.trained_words,
            Some(vec!["t1".to_string(), "t2".to_string()])
        );
    }

    #[test]
    fn test_model_version_info_without_trained_words() {
        let info: ModelVersionInfo = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert!(info.trained_words.is_none());
    }

    #[test]
    fn test_unreachable_service_is_remote_error() {
        // Port 9 (discard) is closed on test machines; the connection is refused
        let client =
            CivitaiClient::new("http://127.0.0.1:9", Some(Duration::from_secs(5))).unwrap();
        let err = client.trained_words("deadbeef").unwrap_err();
        assert!(err.is_remote());
    }
}
