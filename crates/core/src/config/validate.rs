use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Downloader program and default quality are not empty
/// - Pause grace period and error tail bound are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let downloader = &config.downloader;
    if downloader.program.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "downloader.program cannot be empty".to_string(),
        ));
    }
    if downloader.default_quality.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "downloader.default_quality cannot be empty".to_string(),
        ));
    }
    if downloader.pause_grace_period_ms == 0 {
        return Err(ConfigError::ValidationError(
            "downloader.pause_grace_period_ms must be greater than 0".to_string(),
        ));
    }
    if downloader.error_tail_chars == 0 {
        return Err(ConfigError::ValidationError(
            "downloader.error_tail_chars must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DownloaderConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_grace_period_fails() {
        let config = Config {
            downloader: DownloaderConfig::default().with_grace_period_ms(0),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("pause_grace_period_ms"));
    }

    #[test]
    fn test_validate_empty_program_fails() {
        let config = Config {
            downloader: DownloaderConfig::with_program(""),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
