use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Store bucket is set
/// - Catalogue timeout is bounded and non-zero
/// - Heartbeats fit inside the liveness timeout
/// - Retry policy is non-decreasing
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.store.bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.bucket cannot be empty".to_string(),
        ));
    }

    if config.catalogue.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "catalogue.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.downloader.heartbeat_interval_secs == 0
        || config.downloader.heartbeat_interval_secs >= config.workflow.heartbeat_timeout_secs
    {
        return Err(ConfigError::ValidationError(format!(
            "downloader.heartbeat_interval_secs ({}) must be non-zero and below workflow.heartbeat_timeout_secs ({})",
            config.downloader.heartbeat_interval_secs, config.workflow.heartbeat_timeout_secs
        )));
    }

    let retry = &config.workflow.retry;
    if retry.backoff_coefficient < 1.0 {
        return Err(ConfigError::ValidationError(
            "workflow.retry.backoff_coefficient must be >= 1.0".to_string(),
        ));
    }
    if retry.maximum_interval_ms < retry.initial_interval_ms {
        return Err(ConfigError::ValidationError(
            "workflow.retry.maximum_interval_ms must be >= initial_interval_ms".to_string(),
        ));
    }

    if config.workflow.max_finished_runs == 0 {
        return Err(ConfigError::ValidationError(
            "workflow.max_finished_runs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[downloader]
output_dir = "/tmp/downloads"

[store]
bucket = "programmes"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_bucket_fails() {
        let mut config = base_config();
        config.store.bucket = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_heartbeat_outside_timeout_fails() {
        let mut config = base_config();
        config.downloader.heartbeat_interval_secs = 300;
        config.workflow.heartbeat_timeout_secs = 300;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval_secs"));
    }

    #[test]
    fn test_validate_shrinking_backoff_fails() {
        let mut config = base_config();
        config.workflow.retry.backoff_coefficient = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_max_interval_below_initial_fails() {
        let mut config = base_config();
        config.workflow.retry.initial_interval_ms = 10_000;
        config.workflow.retry.maximum_interval_ms = 1_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_finished_run_cap_fails() {
        let mut config = base_config();
        config.workflow.max_finished_runs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_finished_runs"));
    }
}
