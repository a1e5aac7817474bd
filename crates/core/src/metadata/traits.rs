//! Trait definitions for the metadata module.

use async_trait::async_trait;

use super::error::MetadataError;
use super::types::MediaInfo;

/// One-shot metadata and chapter lookup for a source URL.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Returns the name of this provider implementation.
    fn name(&self) -> &str;

    /// Looks up title, duration, thumbnail, size estimate and chapters.
    ///
    /// `quality` is the format selector the size estimate should refer to.
    async fn lookup(&self, url: &str, quality: Option<&str>) -> Result<MediaInfo, MetadataError>;
}
