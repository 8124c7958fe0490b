//! Output formatting for validation results: the diagnostic sink.
//!
//! The engine hands over per-document verdicts and ordered diagnostics;
//! everything about presentation lives here.

use atty;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::diagnostic::Severity;
use crate::validator::{DocumentStatus, DocumentValidationResult, ValidationResults};

/// Formatter for validation results.
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    #[cfg(test)]
    fn without_colors(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: false,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_results(&self, results: &ValidationResults) -> String {
        match self.format {
            OutputFormat::Json => self.format_json(results),
            OutputFormat::Summary => self.format_summary(results),
            OutputFormat::Human => self.format_human(results),
        }
    }

    fn format_human(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        match self.verbosity {
            VerbosityLevel::Quiet => {
                for result in &results.document_results {
                    if !result.status.is_valid() {
                        output.push_str(&self.format_document_result(result));
                        output.push('\n');
                    }
                }
            }
            _ => {
                for result in &results.document_results {
                    if !result.status.is_valid() || self.verbosity >= VerbosityLevel::Verbose {
                        output.push_str(&self.format_document_result(result));
                        output.push('\n');
                    }
                }
                output.push_str(&self.format_summary(results));
            }
        }
        output
    }

    pub fn format_document_result(&self, result: &DocumentValidationResult) -> String {
        let mut output = match &result.status {
            DocumentStatus::Valid => format!(
                "{}  {}",
                self.colorize("✓ VALID", "32"),
                result.reference
            ),
            DocumentStatus::Invalid { error_count } => format!(
                "{}  {} - {} error{}",
                self.colorize("✗ INVALID", "31"),
                result.reference,
                error_count,
                if *error_count == 1 { "" } else { "s" }
            ),
            DocumentStatus::Error { message } => format!(
                "{}  {} - {}",
                self.colorize("⚠ ERROR", "33"),
                result.reference,
                message
            ),
        };
        if self.verbosity >= VerbosityLevel::Normal {
            for diagnostic in &result.diagnostics {
                let tag = match diagnostic.severity {
                    Severity::Warning => self.colorize("warning", "33"),
                    Severity::Error => self.colorize("error", "31"),
                    Severity::Fatal => self.colorize("fatal", "35"),
                };
                output.push_str(&format!(
                    "\n    {}:{} {}: {}",
                    result.reference, diagnostic.location, tag, diagnostic.message
                ));
            }
        }
        output
    }

    fn format_summary(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("Validation summary:\n");
        output.push_str(&format!("  Total documents: {}\n", results.total_documents));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            results.valid_documents
        ));
        if results.invalid_documents > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Invalid:", "31"),
                results.invalid_documents
            ));
        }
        if results.error_documents > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                results.error_documents
            ));
        }
        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!(
                "  Duration: {}ms\n",
                results.total_duration.as_millis()
            ));
        }
        output
    }

    fn format_json(&self, results: &ValidationResults) -> String {
        serde_json::to_string_pretty(results)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize results: {}\"}}", e))
    }
}
