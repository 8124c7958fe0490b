use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FileConfig};
use crate::verifier::WhitespacePolicy;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    /// Show failures with diagnostics plus a summary
    #[default]
    Normal,
    /// Show every document and timing information
    Verbose,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WhitespaceArg {
    Flexible,
    Strict,
}

impl From<WhitespaceArg> for WhitespacePolicy {
    fn from(arg: WhitespaceArg) -> Self {
        match arg {
            WhitespaceArg::Flexible => WhitespacePolicy::Flexible,
            WhitespaceArg::Strict => WhitespacePolicy::Strict,
        }
    }
}

/// Validate XML documents against a RELAX-NG grammar with embedded
/// Schematron assertions
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-rng")]
#[command(
    about = "Validate XML documents against a RELAX-NG grammar with embedded Schematron rules"
)]
#[command(version)]
pub struct Cli {
    /// RELAX-NG grammar (file path or URL)
    pub grammar: String,

    /// XML documents to validate (file paths or URLs)
    #[arg(required = true)]
    pub documents: Vec<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (failures only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Number of concurrent document validations
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Per-document validation timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Whitespace handling for element-only content
    #[arg(long = "whitespace-policy", value_enum)]
    pub whitespace_policy: Option<WhitespaceArg>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Stop after the first invalid document
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// HTTP timeout for remote sources in seconds
    #[arg(long = "http-timeout")]
    pub http_timeout: Option<u64>,

    /// Retry attempts for remote source downloads
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    /// Maximum number of compiled grammars kept in memory
    #[arg(long = "cache-capacity")]
    pub cache_capacity: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Resolved runtime configuration: CLI flags take precedence over the config
/// file, which takes precedence over the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub threads: usize,
    pub validation_timeout: Duration,
    pub whitespace: WhitespacePolicy,
    pub format: OutputFormat,
    pub verbosity: VerbosityLevel,
    pub fail_fast: bool,
    pub http_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub cache_capacity: u64,
}

impl Config {
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let threads = cli
            .threads
            .or(file.validation.threads)
            .unwrap_or_else(default_thread_count);
        if threads == 0 {
            return Err(ConfigError::Validation(
                "number of threads must be greater than 0".to_string(),
            ));
        }
        let timeout_seconds = cli
            .timeout
            .or(file.validation.timeout_seconds)
            .unwrap_or(30);
        if timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "validation timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            threads,
            validation_timeout: Duration::from_secs(timeout_seconds),
            whitespace: cli
                .whitespace_policy
                .map(WhitespacePolicy::from)
                .or(file.validation.whitespace)
                .unwrap_or_default(),
            format: cli.format.or(file.output.format).unwrap_or_default(),
            verbosity: cli.verbosity(),
            fail_fast: cli.fail_fast || file.validation.fail_fast.unwrap_or(false),
            http_timeout_seconds: cli
                .http_timeout
                .or(file.network.timeout_seconds)
                .unwrap_or(30),
            retry_attempts: cli
                .retry_attempts
                .or(file.network.retry_attempts)
                .unwrap_or(3),
            cache_capacity: cli.cache_capacity.unwrap_or(16),
        })
    }
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
