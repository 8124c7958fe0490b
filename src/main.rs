use std::sync::Arc;

use anyhow::Context;

use validate_rng::cache::CacheConfig;
use validate_rng::cli::{Cli, Config, VerbosityLevel};
use validate_rng::grammar_loader::GrammarLoader;
use validate_rng::http_client::HttpClientConfig;
use validate_rng::output::Output;
use validate_rng::validator::{EngineConfig, ValidationEngine, ValidationResults};

/// Exit status when execution aborts (grammar failure, I/O failure). The
/// highest value a shell reports cleanly.
const ABORT_STATUS: i32 = 127;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let status = match run(&cli).await {
        Ok(results) => exit_status(&results),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ABORT_STATUS
        }
    };
    std::process::exit(status);
}

async fn run(cli: &Cli) -> anyhow::Result<ValidationResults> {
    let config = Config::resolve(cli).context("invalid configuration")?;

    if config.verbosity >= VerbosityLevel::Verbose {
        println!(
            "Validating {} document(s) with grammar: {}",
            cli.documents.len(),
            cli.grammar
        );
    }

    let http_config = HttpClientConfig {
        timeout_seconds: config.http_timeout_seconds,
        retry_attempts: config.retry_attempts,
        ..HttpClientConfig::default()
    };
    let cache_config = CacheConfig {
        max_capacity: config.cache_capacity,
    };
    let loader = Arc::new(
        GrammarLoader::new(http_config, cache_config).context("failed to set up grammar loader")?,
    );

    let engine_config = EngineConfig {
        max_concurrent_validations: config.threads,
        validation_timeout: config.validation_timeout,
        fail_fast: config.fail_fast,
        whitespace: config.whitespace,
    };
    let engine = ValidationEngine::new(loader, engine_config);

    let results = engine
        .validate_documents(&cli.grammar, &cli.documents, None)
        .await?;

    let output = Output::new(config.verbosity, config.format);
    print!("{}", output.format_results(&results));

    Ok(results)
}

/// Exit status mirrors the historical driver: 0 when everything validated,
/// the number of invalid documents otherwise, 127 when execution aborted.
/// The count is capped below 127 so it cannot collide with the abort status.
fn exit_status(results: &ValidationResults) -> i32 {
    if results.error_documents > 0 {
        return ABORT_STATUS;
    }
    (results.invalid_documents as i32).min(ABORT_STATUS - 1)
}
