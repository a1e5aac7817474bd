pub mod config;
pub mod events;
pub mod job;
pub mod launcher;
pub mod metadata;
pub mod metrics;
pub mod progress;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    DownloaderConfig, MetadataConfig, SanitizedConfig, ServerConfig,
};
pub use events::{listener, EventBus, Listener, ListenerError, Subscription};
pub use job::{
    JobError, JobKey, JobOptions, JobRegistry, JobStatus, JobSummary, PauseOutcome, StartAck,
    StartRequest,
};
pub use launcher::{DownloadEngine, Invocation, LaunchError, LaunchMode, YtDlpEngine};
pub use metadata::{
    Chapter, InfoRequest, MediaInfo, MetadataError, MetadataProvider, YtDlpMetadataProvider,
};
pub use progress::{ProgressParser, ProgressRecord, RecordKind};
