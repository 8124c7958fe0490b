//! Optional TOML configuration file, merged under CLI flags.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::OutputFormat;
use crate::verifier::WhitespacePolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Contents of a configuration file. Every field is optional; unset fields
/// fall through to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub validation: ValidationSection,
    pub network: NetworkSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    /// Number of concurrent document validations
    pub threads: Option<usize>,
    /// Per-document timeout in seconds
    pub timeout_seconds: Option<u64>,
    /// Stop after the first invalid document
    pub fail_fast: Option<bool>,
    /// Whitespace handling for element-only content
    pub whitespace: Option<WhitespacePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    /// HTTP request timeout in seconds
    pub timeout_seconds: Option<u64>,
    /// Retry attempts for failed downloads
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub format: Option<OutputFormat>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[validation]
threads = 4
timeout_seconds = 10
fail_fast = true
whitespace = "strict"

[network]
timeout_seconds = 15
retry_attempts = 1

[output]
format = "json"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.validation.threads, Some(4));
        assert_eq!(config.validation.timeout_seconds, Some(10));
        assert_eq!(config.validation.fail_fast, Some(true));
        assert_eq!(config.validation.whitespace, Some(WhitespacePolicy::Strict));
        assert_eq!(config.network.retry_attempts, Some(1));
        assert_eq!(config.output.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();
        file.flush().unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[validation]\nthread_count = 4\n").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            FileConfig::load(file.path()),
            Err(ConfigError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            FileConfig::load(Path::new("/nonexistent/config.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
