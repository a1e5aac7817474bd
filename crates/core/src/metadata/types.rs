//! Metadata types.

use serde::{Deserialize, Serialize};

/// One chapter of a media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Zero-based position; this is what a chapter selection refers to.
    pub index: u32,
    /// Start time as `HH:MM:SS`.
    pub time: String,
    pub name: String,
}

/// What the UI needs before starting a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub description: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    /// Estimated size in bytes for the requested format.
    pub filesize: Option<u64>,
    pub chapters: Vec<Chapter>,
}

/// A lookup request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRequest {
    #[serde(alias = "identifier")]
    pub url: String,
    #[serde(default, alias = "quality")]
    pub quality_selector: Option<String>,
}
