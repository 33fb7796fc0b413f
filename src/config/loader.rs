//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_file() {
        let dir = std::env::temp_dir().join("doorman-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[listener]\nbind_address = \"127.0.0.1:8088\"\n\n[signing]\nenabled = true\nsecret = \"abc\"\n"
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8088");
        assert!(config.signing.enabled);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_config_is_validation_error() {
        let dir = std::env::temp_dir().join("doorman-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[signing]\nenabled = true\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
