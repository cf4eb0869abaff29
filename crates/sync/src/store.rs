//! Object-storage backed input fetch and result cache.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use tracing::info;

use warden_core::config::StorageConfig;
use warden_core::error::{Result, WardenError};
use warden_core::models::sync::SyncResult;

/// Fetches the two sync input files by fixed keys and caches results under
/// `<results_prefix><hash>.json`, keyed by the MD5 of the concatenated input
/// bytes.
pub struct ResultStore {
    store: Arc<dyn ObjectStore>,
    roster_key: String,
    mapping_key: String,
    results_prefix: String,
}

impl ResultStore {
    /// Wrap an existing object store (used by tests with an in-memory
    /// backend).
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            roster_key: config.roster_key.clone(),
            mapping_key: config.mapping_key.clone(),
            results_prefix: config.results_prefix.clone(),
        }
    }

    /// Build an S3-backed store from configuration. `endpoint_url` supports
    /// LocalStack-style testing.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| WardenError::Storage(format!("failed to build object store: {e}")))?;

        Ok(Self::new(Arc::new(store), config))
    }

    /// Fetch the roster and mapping files.
    pub async fn fetch_inputs(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let roster = self.get_bytes(&self.roster_key).await?;
        let mapping = self.get_bytes(&self.mapping_key).await?;
        Ok((roster, mapping))
    }

    /// Fetch only the group-mapping file (used to seed the SCIM surface at
    /// service start).
    pub async fn fetch_mapping(&self) -> Result<Vec<u8>> {
        self.get_bytes(&self.mapping_key).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let path = StorePath::from(key);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| WardenError::Storage(format!("failed to fetch '{key}': {e}")))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| WardenError::Storage(format!("failed to read '{key}': {e}")))?;
        Ok(bytes.to_vec())
    }

    fn result_key(&self, hash: &str) -> String {
        format!("{}{hash}.json", self.results_prefix)
    }

    /// Look up a cached result for the given input hash. A missing key is a
    /// cache miss, not an error.
    pub async fn get_result(&self, hash: &str) -> Result<Option<SyncResult>> {
        let key = self.result_key(hash);
        let path = StorePath::from(key.as_str());

        let result = match self.store.get(&path).await {
            Ok(r) => r,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(WardenError::Storage(format!(
                    "failed to check cached result '{key}': {e}"
                )))
            }
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| WardenError::Storage(format!("failed to read cached result: {e}")))?;
        let parsed: SyncResult = serde_json::from_slice(&bytes)
            .map_err(|e| WardenError::Serialization(format!("invalid cached result: {e}")))?;

        info!(hash, "sync result cache hit");
        Ok(Some(parsed))
    }

    /// Store a result under the input hash, returning the storage key.
    pub async fn put_result(&self, hash: &str, result: &SyncResult) -> Result<String> {
        let key = self.result_key(hash);
        let path = StorePath::from(key.as_str());
        let body = serde_json::to_vec_pretty(result)
            .map_err(|e| WardenError::Serialization(format!("failed to encode result: {e}")))?;

        self.store
            .put(&path, body.into())
            .await
            .map_err(|e| WardenError::Storage(format!("failed to store result '{key}': {e}")))?;

        Ok(key)
    }
}
