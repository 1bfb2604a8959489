use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are separated by a double underscore, e.g.
/// `BEEB_DOWNLOADER__OUTPUT_DIR=/srv/downloads`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("BEEB_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[downloader]
output_dir = "/tmp/downloads"

[store]
bucket = "programmes"
"#;

    #[test]
    fn test_load_config_from_str_minimal() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.downloader.output_dir, PathBuf::from("/tmp/downloads"));
        assert_eq!(config.downloader.program, PathBuf::from("get_iplayer"));
        assert_eq!(config.downloader.heartbeat_interval_secs, 120);
        assert_eq!(config.catalogue.base_url, "https://www.bbc.co.uk");
        assert_eq!(config.catalogue.timeout_secs, 5);
        assert_eq!(config.store.bucket, "programmes");
        assert_eq!(config.workflow.retry.maximum_attempts, 3);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_config_from_str_missing_output_dir() {
        let toml = r#"
[downloader]
program = "get_iplayer"

[store]
bucket = "programmes"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_from_str_missing_store() {
        let toml = r#"
[downloader]
output_dir = "/tmp/downloads"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[logging]
level = "debug"
format = "json"

[downloader]
output_dir = "/srv/downloads"
extra_args = ["--quality=fhd"]

[store]
root = "/srv/objects"
bucket = "radio"

[workflow.retry]
initial_interval_ms = 10
maximum_attempts = 5
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.logging.format, crate::config::LogFormat::Json);
        assert_eq!(config.downloader.extra_args, vec!["--quality=fhd"]);
        assert_eq!(config.store.root, PathBuf::from("/srv/objects"));
        assert_eq!(config.workflow.retry.initial_interval_ms, 10);
        assert_eq!(config.workflow.retry.maximum_attempts, 5);
        assert_eq!(config.workflow.retry.backoff_coefficient, 2.0);
    }
}
