//! Structured progress records and the parser that derives them from
//! downloader output.
//!
//! The downloader writes unstructured, frequently overwritten text. The
//! parser turns each line into at most one [`ProgressRecord`] and never fails:
//! lines it does not recognize are dropped.

mod parser;
mod types;

pub use parser::{ChapterFile, ProcessExit, ProgressParser};
pub use types::{OutputStream, ProgressRecord, RecordKind};
