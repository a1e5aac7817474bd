//! Metadata and chapter lookup.
//!
//! A one-shot call the UI makes before starting a job; it is not part of the
//! job lifecycle.

mod chapters;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use chapters::{chapters_from_description, format_timestamp, parse_timestamp, sanitize_name};
pub use error::MetadataError;
pub use traits::MetadataProvider;
pub use types::{Chapter, InfoRequest, MediaInfo};
pub use ytdlp::YtDlpMetadataProvider;
