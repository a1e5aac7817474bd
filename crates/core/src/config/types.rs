use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// External downloader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    /// Path or name of the downloader binary.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Directory used when a request does not name one.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Format selector used for video jobs that do not supply one.
    #[serde(default = "default_quality")]
    pub default_quality: String,

    /// Target container for audio-only extraction.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Audio quality passed to the extraction step.
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    /// Container used when merging separate video and audio tracks.
    #[serde(default = "default_merge_format")]
    pub merge_output_format: String,

    /// How long a paused process gets to exit after SIGTERM before it is killed.
    #[serde(default = "default_grace_period")]
    pub pause_grace_period_ms: u64,

    /// Upper bound on the error-stream text kept for error records.
    #[serde(default = "default_error_tail")]
    pub error_tail_chars: usize,

    /// Additional arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_program() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_quality() -> String {
    "bestvideo[height<=1080]+bestaudio/best[height<=1080]".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "192K".to_string()
}

fn default_merge_format() -> String {
    "mp4".to_string()
}

fn default_grace_period() -> u64 {
    5000
}

fn default_error_tail() -> usize {
    2000
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            output_dir: default_output_dir(),
            default_quality: default_quality(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            merge_output_format: default_merge_format(),
            pause_grace_period_ms: default_grace_period(),
            error_tail_chars: default_error_tail(),
            extra_args: Vec::new(),
        }
    }
}

impl DownloaderConfig {
    /// Creates a config pointing at a specific downloader binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Sets the default output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Sets the pause grace period in milliseconds.
    pub fn with_grace_period_ms(mut self, grace_ms: u64) -> Self {
        self.pause_grace_period_ms = grace_ms;
        self
    }
}

/// Metadata lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,
}

fn default_metadata_timeout() -> u64 {
    60
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_metadata_timeout(),
        }
    }
}

/// Config as exposed over the API.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub downloader: SanitizedDownloaderConfig,
    pub metadata: MetadataConfig,
}

/// Downloader config without free-form extra arguments (they may carry cookies or credentials).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloaderConfig {
    pub program: PathBuf,
    pub output_dir: PathBuf,
    pub default_quality: String,
    pub audio_format: String,
    pub merge_output_format: String,
    pub pause_grace_period_ms: u64,
    pub extra_args_count: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let d = &config.downloader;
        Self {
            server: config.server.clone(),
            downloader: SanitizedDownloaderConfig {
                program: d.program.clone(),
                output_dir: d.output_dir.clone(),
                default_quality: d.default_quality.clone(),
                audio_format: d.audio_format.clone(),
                merge_output_format: d.merge_output_format.clone(),
                pause_grace_period_ms: d.pause_grace_period_ms,
                extra_args_count: d.extra_args.len(),
            },
            metadata: config.metadata.clone(),
        }
    }
}
