//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use chaptergrab_core::testing::{fixtures, RecordingEngine};
//!
//! let dir = tempfile::tempdir()?;
//! let script = fixtures::downloader_script(dir.path(), fixtures::SUCCESS_SCRIPT)?;
//! let engine = Arc::new(RecordingEngine::new(YtDlpEngine::new(&script)));
//! let registry = JobRegistry::new(engine.clone(), DownloaderConfig::with_program(&script));
//! ```

mod mock_metadata;
mod recording_engine;

pub use mock_metadata::MockMetadataProvider;
pub use recording_engine::RecordingEngine;

/// Fake downloader scripts standing in for yt-dlp.
#[cfg(unix)]
pub mod fixtures {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Prints a few progress lines, a merge step and exits 0.
    pub const SUCCESS_SCRIPT: &str = r#"
echo "[youtube] abc123: Downloading webpage"
echo "[download] Destination: video.mp4"
echo "[download]  10.0% of 10.00MiB at 1.00MiB/s ETA 00:09"
echo "[download]  55.5% of 10.00MiB at 2.00MiB/s ETA 00:03"
echo "[download] 100.0% of 10.00MiB at 2.00MiB/s ETA 00:00"
echo "[Merger] Merging formats into \"video.mp4\""
exit 0
"#;

    /// Reports an error on stderr and exits 1.
    pub const FAILURE_SCRIPT: &str = r#"
echo "[download]  12.0% of 10.00MiB at 1.00MiB/s ETA 00:09"
echo "ERROR: [youtube] abc123: Video unavailable" >&2
exit 1
"#;

    /// Emits progress until terminated. Exits 143 on SIGTERM, like yt-dlp.
    pub const LONG_RUNNING_SCRIPT: &str = r#"
trap 'exit 143' TERM
i=0
while [ $i -lt 600 ]; do
  echo "[download]  $((i / 6)).0% of 10.00MiB at 1.00MiB/s ETA 00:10"
  i=$((i + 1))
  sleep 0.05
done
exit 0
"#;

    /// Ignores SIGTERM; only a forceful kill stops it.
    pub const STUBBORN_SCRIPT: &str = r#"
trap '' TERM
echo "[download]   1.0% of 10.00MiB at 1.00MiB/s ETA 00:10"
while true; do sleep 0.05; done
"#;

    /// Writes an executable `/bin/sh` script into `dir` and returns its path.
    ///
    /// Every invocation appends its arguments (one per line, then `---`) to
    /// `args.log` next to the script.
    pub fn downloader_script(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
        let path = dir.join("fake-yt-dlp");
        let log = dir.join("args.log");
        let script = format!(
            "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\" >> '{}'; done\necho --- >> '{}'\n{}",
            log.display(),
            log.display(),
            body
        );
        std::fs::write(&path, script)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    /// Argument lists of every invocation recorded by [`downloader_script`].
    pub fn recorded_args(dir: &Path) -> Vec<Vec<String>> {
        let Ok(log) = std::fs::read_to_string(dir.join("args.log")) else {
            return Vec::new();
        };
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for line in log.lines() {
            if line == "---" {
                runs.push(std::mem::take(&mut current));
            } else {
                current.push(line.to_string());
            }
        }
        runs
    }
}
