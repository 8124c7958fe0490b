//! Grammar loading: resolve a grammar reference to bytes, compile, cache.
//!
//! Grammar references follow the original driver's defaulting: anything
//! without a scheme is a file path, and a single colon in drive-letter
//! position still means a file path, so `C:\schemas\doc.rng` works.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheConfig, GrammarCache};
use crate::compiler;
use crate::error::{CompileError, Result, ValidationError};
use crate::http_client::{AsyncHttpClient, HttpClientConfig};
use crate::pattern::Grammar;

/// A resolved source reference: local file or remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    File(PathBuf),
    Remote(String),
}

impl SourceRef {
    /// Classify a reference string. A colon at index 0 or 1 is taken to be a
    /// drive designator, not a URL scheme.
    pub fn parse(reference: &str) -> SourceRef {
        match reference.find(':') {
            Some(idx) if idx >= 2 => {
                let scheme = &reference[..idx];
                if scheme.eq_ignore_ascii_case("file") {
                    SourceRef::File(PathBuf::from(&reference[idx + 1..]))
                } else {
                    SourceRef::Remote(reference.to_string())
                }
            }
            _ => SourceRef::File(PathBuf::from(reference)),
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRef::File(path) => write!(f, "{}", path.display()),
            SourceRef::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Loads and compiles grammars, sharing compiled results process-wide.
pub struct GrammarLoader {
    cache: GrammarCache,
    http_client: AsyncHttpClient,
}

impl GrammarLoader {
    pub fn new(http_config: HttpClientConfig, cache_config: CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: GrammarCache::new(cache_config),
            http_client: AsyncHttpClient::new(http_config)?,
        })
    }

    /// Fetch the raw bytes of a source reference (grammar or document).
    pub async fn fetch_source(&self, reference: &str) -> Result<Vec<u8>> {
        match SourceRef::parse(reference) {
            SourceRef::File(path) => Ok(tokio::fs::read(&path).await?),
            SourceRef::Remote(url) => self.http_client.fetch(&url).await,
        }
    }

    /// Compile the grammar at `reference`, reusing a prior compilation of the
    /// same reference if one exists. An unreachable source surfaces as
    /// [`CompileError::Source`]; compilation itself is CPU-bound and runs off
    /// the async runtime's worker.
    pub async fn compile_grammar(&self, reference: &str) -> Result<Arc<Grammar>> {
        let key = reference.to_string();
        self.cache
            .get_or_compile(key, || async {
                let bytes = self.fetch_source(reference).await.map_err(|e| {
                    ValidationError::Compile(CompileError::Source {
                        url: reference.to_string(),
                        cause: e.to_string(),
                    })
                })?;
                let grammar = tokio::task::spawn_blocking(move || {
                    compiler::compile_source(&bytes)
                })
                .await
                .map_err(|e| ValidationError::Concurrency {
                    details: e.to_string(),
                })??;
                Ok(Arc::new(grammar))
            })
            .await
    }

    pub fn cache(&self) -> &GrammarCache {
        &self.cache
    }
}
