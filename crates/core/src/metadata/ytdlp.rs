//! yt-dlp based metadata provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::chapters::{chapters_from_description, format_timestamp, sanitize_name};
use super::error::MetadataError;
use super::traits::MetadataProvider;
use super::types::{Chapter, MediaInfo};

/// Bound on the error text kept from a failed lookup.
const STDERR_TAIL: usize = 500;

/// Runs `yt-dlp --dump-single-json` and maps its output.
#[derive(Debug, Clone)]
pub struct YtDlpMetadataProvider {
    program: PathBuf,
    timeout_secs: u64,
}

impl YtDlpMetadataProvider {
    pub fn new(program: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            timeout_secs,
        }
    }

    fn build_args(url: &str, quality: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
        ];
        if let Some(q) = quality.map(str::trim).filter(|q| !q.is_empty()) {
            args.extend(["-f".to_string(), q.to_string()]);
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MetadataProvider for YtDlpMetadataProvider {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn lookup(&self, url: &str, quality: Option<&str>) -> Result<MediaInfo, MetadataError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(MetadataError::InvalidInput("url must not be empty".to_string()));
        }

        let args = Self::build_args(url, quality);
        debug!(program = %self.program.display(), ?args, "Looking up metadata");

        let run = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| MetadataError::Timeout {
                timeout_secs: self.timeout_secs,
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MetadataError::EngineNotFound {
                        path: self.program.clone(),
                    }
                } else {
                    MetadataError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = tail(stderr.trim(), STDERR_TAIL);
            warn!(url, code = output.status.code(), "Metadata lookup failed");
            return Err(MetadataError::lookup_failed(if reason.is_empty() {
                format!("downloader exited with {}", output.status)
            } else {
                reason
            }));
        }

        parse_info(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    filesize: Option<u64>,
    filesize_approx: Option<f64>,
    #[serde(default)]
    requested_formats: Vec<RawFormat>,
    #[serde(default)]
    chapters: Option<Vec<RawChapter>>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    filesize: Option<u64>,
    filesize_approx: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawChapter {
    start_time: f64,
    title: Option<String>,
}

/// Maps the JSON document printed by `--dump-single-json`.
pub(crate) fn parse_info(json: &[u8]) -> Result<MediaInfo, MetadataError> {
    let raw: RawInfo =
        serde_json::from_slice(json).map_err(|e| MetadataError::parse_error(e.to_string()))?;

    let thumbnail = raw
        .thumbnail
        .or_else(|| raw.thumbnails.iter().rev().find_map(|t| t.url.clone()));

    let filesize = raw
        .filesize
        .or(raw.filesize_approx.map(|f| f as u64))
        .or_else(|| {
            let sizes: Option<Vec<u64>> = raw
                .requested_formats
                .iter()
                .map(|f| f.filesize.or(f.filesize_approx.map(|a| a as u64)))
                .collect();
            sizes.filter(|s| !s.is_empty()).map(|s| s.iter().sum())
        });

    let chapters = match raw.chapters.filter(|c| !c.is_empty()) {
        Some(chapters) => chapters
            .iter()
            .enumerate()
            .map(|(i, c)| Chapter {
                index: i as u32,
                time: format_timestamp(c.start_time.max(0.0) as u64),
                name: c
                    .title
                    .as_deref()
                    .map(sanitize_name)
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("Chapter {}", i + 1)),
            })
            .collect(),
        None => raw
            .description
            .as_deref()
            .map(chapters_from_description)
            .unwrap_or_default(),
    };

    Ok(MediaInfo {
        title: raw.title.unwrap_or_else(|| "Untitled".to_string()),
        description: raw.description,
        duration: raw.duration,
        thumbnail,
        filesize,
        chapters,
    })
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}
