use std::sync::Arc;

use chaptergrab_core::{
    Config, JobRegistry, MetadataProvider, SanitizedConfig, YtDlpEngine, YtDlpMetadataProvider,
};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: Arc<JobRegistry>,
    metadata: Arc<dyn MetadataProvider>,
}

impl AppState {
    /// Wires the yt-dlp engine and metadata provider from config.
    pub fn new(config: Config) -> Self {
        let engine = Arc::new(YtDlpEngine::new(&config.downloader.program));
        let registry = Arc::new(JobRegistry::new(engine, config.downloader.clone()));
        let metadata = Arc::new(YtDlpMetadataProvider::new(
            &config.downloader.program,
            config.metadata.timeout_secs,
        ));
        Self::with_components(config, registry, metadata)
    }

    pub fn with_components(
        config: Config,
        registry: Arc<JobRegistry>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            config,
            registry,
            metadata,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }
}
