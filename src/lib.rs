//! # validate-rng Library
//!
//! A RELAX-NG-with-Schematron schema validation engine with an async batch
//! driver. The core is a derivative-based acceptance automaton: a grammar
//! compiles once into an immutable pattern tree, and each document streams
//! through a per-document verifier that replaces the current residual
//! pattern on every structural event while collecting position-anchored
//! diagnostics. Embedded Schematron rules evaluate as element subtrees
//! complete, so one pass yields both structural and assertion findings.

pub mod automaton;
pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod datatype;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod grammar_loader;
pub mod http_client;
pub mod output;
pub mod pattern;
pub mod schematron;
pub mod validator;
pub mod verifier;
pub mod xml_source;

pub use cache::{CacheConfig, GrammarCache};
pub use cli::{Cli, Config, OutputFormat, VerbosityLevel};
pub use compiler::{compile_source, compile_tree};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{CompileError, CompileResult, Result, ValidationError};
pub use event::{Event, EventSource, Location, QName, VecEventSource};
pub use grammar_loader::{GrammarLoader, SourceRef};
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use output::Output;
pub use pattern::{Grammar, NameClass, Pattern};
pub use validator::{
    DocumentStatus, DocumentValidationResult, EngineConfig, ProgressCallback, ValidationEngine,
    ValidationResults,
};
pub use verifier::{
    CancelToken, DocumentReport, Verifier, VerifierOptions, WhitespacePolicy, validate,
};
pub use xml_source::XmlEventSource;
