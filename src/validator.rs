//! Validation engine: concurrent per-document validation against one shared
//! compiled grammar.
//!
//! The grammar compiles once; each document gets its own verifier state and
//! diagnostic sequence, so documents validate in parallel with no locking.
//! Per-document work is CPU-bound and runs under `spawn_blocking`, bounded by
//! a semaphore; a per-document timeout cancels just that document through its
//! `CancelToken` and never disturbs the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::error::{Result, ValidationError};
use crate::grammar_loader::GrammarLoader;
use crate::pattern::Grammar;
use crate::verifier::{self, CancelToken, VerifierOptions, WhitespacePolicy};
use crate::xml_source::XmlEventSource;

/// Validation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of documents validated concurrently
    pub max_concurrent_validations: usize,
    /// Per-document validation timeout
    pub validation_timeout: Duration,
    /// Stop after the first invalid document
    pub fail_fast: bool,
    /// Whitespace handling for element-only content
    pub whitespace: WhitespacePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: num_cpus::get(),
            validation_timeout: Duration::from_secs(30),
            fail_fast: false,
            whitespace: WhitespacePolicy::default(),
        }
    }
}

/// Status of a single document validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Document satisfied the grammar and all assertions
    Valid,
    /// Document violated the grammar or an assertion
    Invalid { error_count: usize },
    /// Validation did not complete (I/O failure, timeout)
    Error { message: String },
}

impl DocumentStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, DocumentStatus::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, DocumentStatus::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DocumentStatus::Error { .. })
    }
}

/// Result of validating a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentValidationResult {
    /// The document reference as given by the caller
    pub reference: String,
    /// Validation status
    pub status: DocumentStatus,
    /// Ordered diagnostics for the document
    pub diagnostics: Vec<Diagnostic>,
    /// Duration of validation
    #[serde(skip)]
    pub duration: Duration,
}

impl DocumentValidationResult {
    pub fn valid(reference: String, diagnostics: Vec<Diagnostic>, duration: Duration) -> Self {
        Self {
            reference,
            status: DocumentStatus::Valid,
            diagnostics,
            duration,
        }
    }

    pub fn invalid(reference: String, diagnostics: Vec<Diagnostic>, duration: Duration) -> Self {
        let error_count = diagnostics
            .iter()
            .filter(|d| d.severity.is_invalidating())
            .count();
        Self {
            reference,
            status: DocumentStatus::Invalid { error_count },
            diagnostics,
            duration,
        }
    }

    pub fn error(reference: String, error: &ValidationError, duration: Duration) -> Self {
        Self {
            reference,
            status: DocumentStatus::Error {
                message: error.to_string(),
            },
            diagnostics: Vec::new(),
            duration,
        }
    }
}

/// Aggregated results of one validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResults {
    pub total_documents: usize,
    pub valid_documents: usize,
    pub invalid_documents: usize,
    pub error_documents: usize,
    #[serde(skip)]
    pub total_duration: Duration,
    pub document_results: Vec<DocumentValidationResult>,
}

impl ValidationResults {
    pub fn aggregate(document_results: Vec<DocumentValidationResult>, total_duration: Duration) -> Self {
        let mut valid_documents = 0;
        let mut invalid_documents = 0;
        let mut error_documents = 0;
        for result in &document_results {
            match result.status {
                DocumentStatus::Valid => valid_documents += 1,
                DocumentStatus::Invalid { .. } => invalid_documents += 1,
                DocumentStatus::Error { .. } => error_documents += 1,
            }
        }
        Self {
            total_documents: document_results.len(),
            valid_documents,
            invalid_documents,
            error_documents,
            total_duration,
            document_results,
        }
    }

    pub fn all_valid(&self) -> bool {
        self.valid_documents == self.total_documents && self.total_documents > 0
    }

    pub fn has_failures(&self) -> bool {
        self.invalid_documents > 0 || self.error_documents > 0
    }
}

/// Progress callback invoked as documents complete.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// The validation engine. One compiled grammar, many documents.
pub struct ValidationEngine {
    grammar_loader: Arc<GrammarLoader>,
    config: EngineConfig,
}

impl ValidationEngine {
    pub fn new(grammar_loader: Arc<GrammarLoader>, config: EngineConfig) -> Self {
        Self {
            grammar_loader,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grammar_loader(&self) -> &Arc<GrammarLoader> {
        &self.grammar_loader
    }

    /// Validate a batch of documents against the grammar at `grammar_ref`.
    ///
    /// Grammar compilation failures abort the run; document failures never
    /// do — each document yields its own result and the batch continues.
    pub async fn validate_documents(
        &self,
        grammar_ref: &str,
        documents: &[String],
        progress: Option<ProgressCallback>,
    ) -> Result<ValidationResults> {
        let run_start = Instant::now();
        let grammar = self.grammar_loader.compile_grammar(grammar_ref).await?;

        let results = if self.config.fail_fast {
            self.validate_sequential(&grammar, documents, progress).await
        } else {
            self.validate_concurrent(&grammar, documents, progress).await?
        };

        Ok(ValidationResults::aggregate(results, run_start.elapsed()))
    }

    async fn validate_concurrent(
        &self,
        grammar: &Arc<Grammar>,
        documents: &[String],
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<DocumentValidationResult>> {
        let total = documents.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_validations.max(1),
        ));

        let tasks: Vec<_> = documents
            .iter()
            .map(|reference| {
                let reference = reference.clone();
                let grammar = Arc::clone(grammar);
                let loader = Arc::clone(&self.grammar_loader);
                let semaphore = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let progress = progress.clone();
                let timeout = self.config.validation_timeout;
                let whitespace = self.config.whitespace;

                tokio::spawn(async move {
                    let _permit =
                        semaphore
                            .acquire()
                            .await
                            .map_err(|_| ValidationError::Concurrency {
                                details: "validation semaphore closed".to_string(),
                            })?;
                    let result = Self::validate_single_document(
                        grammar, loader, reference, timeout, whitespace,
                    )
                    .await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &progress {
                        callback(done, total);
                    }
                    Ok::<DocumentValidationResult, ValidationError>(result)
                })
            })
            .collect();

        let joined = try_join_all(tasks)
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("task join error: {}", e),
            })?;

        let mut results = Vec::with_capacity(joined.len());
        for result in joined {
            results.push(result?);
        }
        Ok(results)
    }

    async fn validate_sequential(
        &self,
        grammar: &Arc<Grammar>,
        documents: &[String],
        progress: Option<ProgressCallback>,
    ) -> Vec<DocumentValidationResult> {
        let total = documents.len();
        let mut results = Vec::new();
        for (i, reference) in documents.iter().enumerate() {
            let result = Self::validate_single_document(
                Arc::clone(grammar),
                Arc::clone(&self.grammar_loader),
                reference.clone(),
                self.config.validation_timeout,
                self.config.whitespace,
            )
            .await;
            let stop = !result.status.is_valid();
            if let Some(callback) = &progress {
                callback(i + 1, total);
            }
            results.push(result);
            if stop {
                break;
            }
        }
        results
    }

    async fn validate_single_document(
        grammar: Arc<Grammar>,
        loader: Arc<GrammarLoader>,
        reference: String,
        timeout: Duration,
        whitespace: WhitespacePolicy,
    ) -> DocumentValidationResult {
        let start = Instant::now();

        let bytes = match loader.fetch_source(&reference).await {
            Ok(bytes) => bytes,
            Err(e) => return DocumentValidationResult::error(reference, &e, start.elapsed()),
        };

        // The verifier is pure compute once the bytes are in hand; run it on
        // a blocking worker and cancel cooperatively on timeout.
        let cancel = CancelToken::new();
        let cancel_for_task = cancel.clone();
        let task_reference = reference.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let mut source = XmlEventSource::from_bytes(bytes, task_reference);
            let options = VerifierOptions { whitespace };
            verifier::validate(&grammar, &mut source, options, Some(&cancel_for_task))
        });

        let outcome = match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                cancel.cancel();
                let error = ValidationError::Cancelled {
                    reason: format!("timed out after {:?}", timeout),
                };
                return DocumentValidationResult::error(reference, &error, start.elapsed());
            }
        };

        let duration = start.elapsed();
        match outcome {
            Ok(Ok(report)) => {
                if report.valid {
                    DocumentValidationResult::valid(reference, report.diagnostics, duration)
                } else {
                    DocumentValidationResult::invalid(reference, report.diagnostics, duration)
                }
            }
            Ok(Err(e)) => DocumentValidationResult::error(reference, &e, duration),
            Err(e) => DocumentValidationResult::error(
                reference,
                &ValidationError::Concurrency {
                    details: format!("join error: {}", e),
                },
                duration,
            ),
        }
    }
}
