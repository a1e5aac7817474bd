//! Job key normalization.
//!
//! Every variant of the same source (letter case, tracking query parameters,
//! `www.` prefixes, short links) must address the same job.

use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

use super::error::JobError;

/// Hosts that serve YouTube watch pages.
const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "music.youtube.com", "youtube-nocookie.com"];

/// Stable identity of a job, derived from the user-supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey(String);

impl JobKey {
    /// Normalizes an identifier into a key.
    pub fn parse(identifier: &str) -> Result<Self, JobError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(JobError::invalid_input("identifier must not be empty"));
        }

        let key = match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
                normalize_url(&url)
            }
            _ => trimmed.to_string(),
        };
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for JobKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

fn normalize_url(url: &Url) -> String {
    // host_str() is already lowercased by the parser
    let host = url.host_str().unwrap_or_default();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    if let Some(id) = youtube_id(host, url) {
        return format!("youtube:{}", id);
    }

    let path = url.path().trim_end_matches('/').to_lowercase();
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}{}", url.scheme(), host, port, path)
}

fn youtube_id(host: &str, url: &Url) -> Option<String> {
    let id = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host) {
        let mut segments = url.path_segments()?;
        match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(name, _)| name == "v")
                .map(|(_, value)| value.into_owned()),
            "shorts" | "embed" | "live" => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    id.filter(|id| {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}
