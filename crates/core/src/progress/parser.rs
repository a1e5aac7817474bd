//! Line parser for yt-dlp style output.

use regex_lite::Regex;
use std::path::PathBuf;
use tracing::trace;

use super::types::{OutputStream, ProgressRecord};

const DOWNLOADING_MESSAGE: &str = "Downloading...";

/// Post-processor tags and the status text shown while they run.
const POST_PROCESSORS: &[(&str, &str)] = &[
    ("[Merger]", "Merging formats..."),
    ("[ExtractAudio]", "Extracting audio..."),
    ("[EmbedThumbnail]", "Embedding thumbnail..."),
    ("[Metadata]", "Adding metadata..."),
    ("[FFmpegMetadata]", "Adding metadata..."),
    ("[SplitChapters]", "Splitting chapters..."),
    ("[ModifyChapters]", "Modifying chapters..."),
    ("[VideoConvertor]", "Converting video..."),
    ("[VideoRemuxer]", "Remuxing video..."),
];

/// A chapter file reported by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFile {
    /// 1-based section number.
    pub number: u32,
    pub path: PathBuf,
}

/// How a process instance ended, as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub success: bool,
    pub code: Option<i32>,
    /// A pause was requested for this exact process instance.
    pub pause_requested: bool,
}

/// Converts raw output lines of one process instance into progress records.
///
/// One parser per process instance. It remembers the highest percent seen so
/// reordered or restarted counters never move displayed progress backwards.
pub struct ProgressParser {
    last_percent: f32,
    error_tail: ErrorTail,
    chapter_files: Vec<ChapterFile>,
    ansi_regex: Option<Regex>,
    percent_regex: Option<Regex>,
    speed_regex: Option<Regex>,
    eta_regex: Option<Regex>,
    chapter_regex: Option<Regex>,
}

impl ProgressParser {
    pub fn new(error_tail_chars: usize) -> Self {
        Self {
            last_percent: 0.0,
            error_tail: ErrorTail::new(error_tail_chars),
            chapter_files: Vec::new(),
            ansi_regex: Regex::new(r"\x1B(?:[@-Z\\\-_]|\[[0-?]*[ -/]*[@-~])").ok(),
            percent_regex: Regex::new(r"(\d{1,3}(?:\.\d+)?)%").ok(),
            speed_regex: Regex::new(r"\bat\s+(\S+)").ok(),
            eta_regex: Regex::new(r"\bETA\s+(\S+)").ok(),
            chapter_regex: Regex::new(r"^\[SplitChapters\] Chapter (\d+); Destination: (.+)$").ok(),
        }
    }

    /// Starts from a known percent, used when a paused job resumes.
    pub fn with_initial_percent(mut self, percent: f32) -> Self {
        self.last_percent = percent.clamp(0.0, 100.0);
        self
    }

    /// Highest percent seen so far.
    pub fn last_percent(&self) -> f32 {
        self.last_percent
    }

    /// Chapter files reported by the splitter so far.
    pub fn chapter_files(&self) -> &[ChapterFile] {
        &self.chapter_files
    }

    /// Captured error-stream text (bounded).
    pub fn error_text(&self) -> &str {
        self.error_tail.as_str()
    }

    /// Parses one line. Returns `None` for lines that carry no progress meaning.
    pub fn parse_line(&mut self, stream: OutputStream, raw: &str) -> Option<ProgressRecord> {
        let line = self.clean(raw);
        if line.is_empty() {
            return None;
        }

        if stream == OutputStream::Stderr {
            self.error_tail.push(&line);
        }

        if let Some(record) = self.parse_download(&line) {
            return Some(record);
        }

        if let Some(message) = post_processing_message(&line) {
            self.capture_chapter_file(&line);
            return Some(ProgressRecord::progress(
                self.last_percent,
                None,
                None,
                message,
            ));
        }

        trace!(line = %line, "Ignoring unrecognized downloader line");
        None
    }

    /// Produces the terminal record for the process instance.
    pub fn finish(&mut self, exit: ProcessExit) -> ProgressRecord {
        if exit.pause_requested {
            return ProgressRecord::paused(self.last_percent);
        }
        if exit.success {
            self.last_percent = 100.0;
            return ProgressRecord::done();
        }

        let tail = self.error_tail.as_str().trim();
        let message = if tail.is_empty() {
            match exit.code {
                Some(code) => format!("Downloader exited with code {}", code),
                None => "Downloader was terminated by a signal".to_string(),
            }
        } else {
            tail.to_string()
        };
        ProgressRecord::error(self.last_percent, message)
    }

    /// Strips ANSI escapes and keeps only the last carriage-return segment.
    fn clean(&self, raw: &str) -> String {
        let stripped = match &self.ansi_regex {
            Some(re) => re.replace_all(raw, "").into_owned(),
            None => raw.to_string(),
        };
        stripped
            .split('\r')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .last()
            .unwrap_or("")
            .to_string()
    }

    fn parse_download(&mut self, line: &str) -> Option<ProgressRecord> {
        let body = line.strip_prefix("[download]")?;
        if body.trim_start().starts_with("Destination:") {
            return None;
        }

        let percent = capture(&self.percent_regex, body).and_then(|p| p.parse::<f32>().ok());
        let speed = capture(&self.speed_regex, body)
            .filter(|s| s.ends_with("/s"))
            .map(|s| s.replace("iB/s", "B/s"));
        let eta = capture(&self.eta_regex, body).filter(|s| is_known(s));

        if percent.is_none() && speed.is_none() && eta.is_none() {
            return None;
        }

        // A lower value means a rewind (second stream, reordered line): keep the old one.
        if let Some(p) = percent {
            if p > self.last_percent {
                self.last_percent = p.min(100.0);
            }
        }

        Some(ProgressRecord::progress(
            self.last_percent,
            speed,
            eta,
            DOWNLOADING_MESSAGE,
        ))
    }

    fn capture_chapter_file(&mut self, line: &str) {
        let Some(re) = &self.chapter_regex else {
            return;
        };
        let Some(caps) = re.captures(line) else {
            return;
        };
        let number = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let path = caps.get(2).map(|m| m.as_str().trim().trim_matches('"'));
        if let (Some(number), Some(path)) = (number, path) {
            self.chapter_files.push(ChapterFile {
                number,
                path: PathBuf::from(path),
            });
        }
    }
}

fn capture(regex: &Option<Regex>, text: &str) -> Option<String> {
    regex
        .as_ref()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

fn is_known(value: &str) -> bool {
    !matches!(value, "Unknown" | "N/A" | "NA")
}

fn post_processing_message(line: &str) -> Option<&'static str> {
    if line.starts_with("[Fixup") {
        return Some("Fixing up container...");
    }
    POST_PROCESSORS
        .iter()
        .find(|(tag, _)| line.starts_with(tag))
        .map(|(_, message)| *message)
}

/// Keeps the last `max_chars` characters of error-stream text.
struct ErrorTail {
    buf: String,
    max_chars: usize,
}

impl ErrorTail {
    fn new(max_chars: usize) -> Self {
        Self {
            buf: String::new(),
            max_chars,
        }
    }

    fn push(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');

        let count = self.buf.chars().count();
        if count > self.max_chars {
            let skip = count - self.max_chars;
            let cut = self
                .buf
                .char_indices()
                .nth(skip)
                .map(|(idx, _)| idx)
                .unwrap_or(self.buf.len());
            self.buf.drain(..cut);
        }
    }

    fn as_str(&self) -> &str {
        &self.buf
    }
}
