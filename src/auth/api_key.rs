//! API key authentication for scoring clients.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Caller identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct ApiKeyInfo {
    pub key_id: String,
    pub client_id: String,
}

/// API key validator. Keys are held only as SHA-256 digests.
#[derive(Clone, Default)]
pub struct ApiKeyValidator {
    keys: Arc<HashMap<String, ApiKeyInfo>>,
}

impl ApiKeyValidator {
    /// Create a new validator from configured keys.
    pub fn new(configured_keys: Vec<ConfiguredApiKey>) -> Self {
        let keys = configured_keys
            .into_iter()
            .map(|key| {
                tracing::debug!(key_id = %key.id, name = %key.name, "API key loaded");
                (
                    Self::hash_key(&key.key),
                    ApiKeyInfo {
                        key_id: key.id,
                        client_id: key.client_id,
                    },
                )
            })
            .collect();

        Self {
            keys: Arc::new(keys),
        }
    }

    /// Hash an API key for comparison.
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Validate an API key and return its info if valid.
    pub fn validate(&self, key: &str) -> Option<ApiKeyInfo> {
        self.keys.get(&Self::hash_key(key)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// API key configuration from config file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConfiguredApiKey {
    /// Unique ID for the key.
    pub id: String,
    /// The actual API key value.
    pub key: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Client the key is issued to.
    pub client_id: String,
}
