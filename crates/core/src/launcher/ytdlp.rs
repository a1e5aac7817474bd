//! yt-dlp based engine.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::error::LaunchError;
use super::invocation::{Invocation, MediaFormat};
use super::traits::{DownloadEngine, EngineProcess};
use crate::progress::OutputStream;

/// Capacity of the line channel between pipe readers and the supervisor.
const LINE_BUFFER: usize = 256;

/// Output template relative to the output directory.
const OUTPUT_TEMPLATE: &str = "%(title)s/%(title)s.%(ext)s";

/// Output template for split chapter files.
const CHAPTER_TEMPLATE: &str = "%(title)s/%(section_number)02d - %(section_title)s.%(ext)s";

/// Runs the `yt-dlp` command-line program.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn build_args(&self, invocation: &Invocation) -> Vec<String> {
        let out = &invocation.output_dir;
        let mut args = vec![
            "--newline".to_string(),
            "--no-color".to_string(),
            if invocation.continue_partial {
                "--continue".to_string()
            } else {
                "--no-continue".to_string()
            },
            "-o".to_string(),
            out.join(OUTPUT_TEMPLATE).to_string_lossy().to_string(),
        ];

        match &invocation.format {
            MediaFormat::Audio { codec, quality } => {
                args.extend([
                    "-f".to_string(),
                    "bestaudio/best".to_string(),
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    codec.clone(),
                    "--audio-quality".to_string(),
                    quality.clone(),
                ]);
            }
            MediaFormat::Video {
                selector,
                merge_format,
            } => {
                args.extend([
                    "-f".to_string(),
                    selector.clone(),
                    "--merge-output-format".to_string(),
                    merge_format.clone(),
                ]);
            }
        }

        if invocation.chapters.is_some() {
            args.extend([
                "--split-chapters".to_string(),
                "--force-keyframes-at-cuts".to_string(),
                "-o".to_string(),
                format!("chapter:{}", out.join(CHAPTER_TEMPLATE).to_string_lossy()),
            ]);
        }

        args.extend(invocation.extra_args.iter().cloned());

        // Keep the identifier from being read as an option.
        args.push("--".to_string());
        args.push(invocation.identifier.clone());

        args
    }

    async fn launch(&self, invocation: &Invocation) -> Result<EngineProcess, LaunchError> {
        tokio::fs::create_dir_all(&invocation.output_dir)
            .await
            .map_err(|source| LaunchError::OutputDirectory {
                path: invocation.output_dir.clone(),
                source,
            })?;

        let args = self.build_args(invocation);
        debug!(program = %self.program.display(), ?args, "Spawning downloader");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::from_spawn(&self.program, e))?;

        let stdout = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(LaunchError::MissingPipe("stderr"))?;

        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
        tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx));

        info!(
            pid = child.id(),
            identifier = %invocation.identifier,
            continue_partial = invocation.continue_partial,
            "Downloader started"
        );

        Ok(EngineProcess { child, lines, args })
    }
}

/// Reads newline-terminated lines from a pipe until it closes.
///
/// Output is decoded lossily: progress lines may contain titles in any
/// encoding and must never stop the reader.
async fn forward_lines<R>(pipe: R, stream: OutputStream, tx: mpsc::Sender<(OutputStream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send((stream, line)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                trace!(?stream, error = %e, "Pipe read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloaderConfig;
    use crate::job::JobOptions;
    use crate::launcher::LaunchMode;

    fn invocation(options: JobOptions, mode: LaunchMode) -> Invocation {
        let config = DownloaderConfig::default().with_output_dir("/data/dl");
        Invocation::for_job("https://youtu.be/abc123", &options, &config, mode)
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_video_args() {
        let engine = YtDlpEngine::default();
        let args = engine.build_args(&invocation(
            JobOptions {
                quality: Some("bestvideo[height<=720]+bestaudio".to_string()),
                ..Default::default()
            },
            LaunchMode::Fresh,
        ));

        assert!(args.contains(&"--newline".to_string()));
        assert!(args.contains(&"--no-continue".to_string()));
        assert!(has_pair(&args, "-f", "bestvideo[height<=720]+bestaudio"));
        assert!(has_pair(&args, "--merge-output-format", "mp4"));
        assert!(has_pair(&args, "-o", "/data/dl/%(title)s/%(title)s.%(ext)s"));
        assert!(!args.contains(&"-x".to_string()));
        assert!(!args.contains(&"--split-chapters".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc123"));
    }

    #[test]
    fn test_audio_args_drop_quality_selector() {
        let engine = YtDlpEngine::default();
        let args = engine.build_args(&invocation(
            JobOptions {
                audio_only: true,
                quality: Some("bestvideo".to_string()),
                ..Default::default()
            },
            LaunchMode::Fresh,
        ));

        assert!(args.contains(&"-x".to_string()));
        assert!(has_pair(&args, "--audio-format", "mp3"));
        assert!(has_pair(&args, "--audio-quality", "192K"));
        assert!(has_pair(&args, "-f", "bestaudio/best"));
        assert!(!args.iter().any(|a| a == "bestvideo"));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn test_split_args() {
        let engine = YtDlpEngine::default();
        let args = engine.build_args(&invocation(
            JobOptions {
                split_chapters: true,
                selected_chapters: [0, 2].into_iter().collect(),
                ..Default::default()
            },
            LaunchMode::Fresh,
        ));

        assert!(args.contains(&"--split-chapters".to_string()));
        assert!(args.contains(&"--force-keyframes-at-cuts".to_string()));
        assert!(has_pair(
            &args,
            "-o",
            "chapter:/data/dl/%(title)s/%(section_number)02d - %(section_title)s.%(ext)s"
        ));
    }

    #[test]
    fn test_resume_args_continue() {
        let engine = YtDlpEngine::default();
        let args = engine.build_args(&invocation(JobOptions::default(), LaunchMode::Resume));
        assert!(args.contains(&"--continue".to_string()));
        assert!(!args.contains(&"--no-continue".to_string()));
    }

    #[test]
    fn test_extra_args_before_identifier() {
        let engine = YtDlpEngine::default();
        let mut inv = invocation(JobOptions::default(), LaunchMode::Fresh);
        inv.extra_args = vec!["--cookies".to_string(), "c.txt".to_string()];
        let args = engine.build_args(&inv);
        let n = args.len();
        assert_eq!(&args[n - 4..], &["--cookies", "c.txt", "--", "https://youtu.be/abc123"]);
    }

    #[tokio::test]
    async fn test_launch_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let engine = YtDlpEngine::new(dir.path().join("no-such-downloader"));
        let mut inv = invocation(JobOptions::default(), LaunchMode::Fresh);
        inv.output_dir = dir.path().join("out");

        let err = engine.launch(&inv).await.unwrap_err();
        assert!(matches!(err, LaunchError::EngineNotFound { .. }));
        // output dir is created before spawning
        assert!(inv.output_dir.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_streams_both_pipes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-dl");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"[download]  50.0% of 1MiB\"\necho \"ERROR: boom\" >&2\nexit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = YtDlpEngine::new(&script);
        let mut inv = invocation(JobOptions::default(), LaunchMode::Fresh);
        inv.output_dir = dir.path().join("out");

        let mut process = engine.launch(&inv).await.unwrap();
        let mut seen = Vec::new();
        while let Some(line) = process.lines.recv().await {
            seen.push(line);
        }
        let status = process.child.wait().await.unwrap();

        assert!(status.success());
        assert!(seen.contains(&(OutputStream::Stdout, "[download]  50.0% of 1MiB".to_string())));
        assert!(seen.contains(&(OutputStream::Stderr, "ERROR: boom".to_string())));
    }
}
