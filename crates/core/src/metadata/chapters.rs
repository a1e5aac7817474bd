//! Chapter extraction helpers.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::Chapter;

/// `H:MM:SS`, `MM:SS` or `M:SS`, optionally parenthesized.
static TIMESTAMP: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\(?\b((?:\d{1,2}:)?\d{1,3}:\d{2})\b\)?").ok());

/// Characters that cannot appear in chapter file names.
const FILENAME_HOSTILE: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Formats seconds as `HH:MM:SS`.
pub fn format_timestamp(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Parses `H:MM:SS` / `MM:SS` into seconds.
pub fn parse_timestamp(text: &str) -> Option<u64> {
    let parts: Vec<u64> = text
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [m, s] if *s < 60 => Some(m * 60 + s),
        [h, m, s] if *m < 60 && *s < 60 => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}

/// Removes characters that would break a file name.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !FILENAME_HOSTILE.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Extracts chapters from timestamp lines in a description.
///
/// Lines without a timestamp are skipped. Names are the rest of the line with
/// separators trimmed.
pub fn chapters_from_description(description: &str) -> Vec<Chapter> {
    let Some(re) = TIMESTAMP.as_ref() else {
        return Vec::new();
    };

    let mut chapters = Vec::new();
    for line in description.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let (Some(whole), Some(stamp)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(secs) = parse_timestamp(stamp.as_str()) else {
            continue;
        };

        let mut rest = String::with_capacity(line.len());
        rest.push_str(&line[..whole.start()]);
        rest.push(' ');
        rest.push_str(&line[whole.end()..]);
        let name = sanitize_name(rest.trim_matches(|c: char| c.is_whitespace() || "-–—:|•".contains(c)));

        let index = chapters.len() as u32;
        chapters.push(Chapter {
            index,
            time: format_timestamp(secs),
            name: if name.is_empty() {
                format!("Chapter {}", index + 1)
            } else {
                name
            },
        });
    }
    chapters
}
