//! Mock metadata provider for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::metadata::{MediaInfo, MetadataError, MetadataProvider};

/// Mock implementation of the MetadataProvider trait.
///
/// Returns configured results per URL; unknown URLs fail with
/// `LookupFailed`.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    results: Mutex<HashMap<String, MediaInfo>>,
    lookups: Mutex<Vec<(String, Option<String>)>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, url: impl Into<String>, info: MediaInfo) {
        self.results.lock().insert(url.into(), info);
    }

    /// `(url, quality)` pairs looked up so far.
    pub fn lookups(&self) -> Vec<(String, Option<String>)> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup(&self, url: &str, quality: Option<&str>) -> Result<MediaInfo, MetadataError> {
        if url.trim().is_empty() {
            return Err(MetadataError::InvalidInput("url must not be empty".to_string()));
        }
        self.lookups
            .lock()
            .push((url.to_string(), quality.map(str::to_string)));
        self.results
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| MetadataError::lookup_failed(format!("no such video: {}", url)))
    }
}
