//! Per-module warnings and errors.
//!
//! Failures never escape a single module's processing: they are logged and
//! recorded here, and the module degrades to pass-through or placeholder
//! entries.

use parking_lot::Mutex;
use serde::Serialize;

use crate::log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub module: String,
    pub severity: Severity,
    pub message: String,
}

/// Thread-safe diagnostics ledger
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record a warning.
    pub fn warn(&self, module: &str, message: impl Into<String>) {
        let message = message.into();
        log!("warning"; "{}: {}", module, message);
        self.push(module, Severity::Warning, message);
    }

    /// Log and record an error.
    pub fn error(&self, module: &str, message: impl Into<String>) {
        let message = message.into();
        log!("error"; "{}: {}", module, message);
        self.push(module, Severity::Error, message);
    }

    fn push(&self, module: &str, severity: Severity, message: String) {
        self.entries.lock().push(Diagnostic {
            module: module.to_string(),
            severity,
            message,
        });
    }

    pub fn all(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn for_module(&self, module: &str) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.module == module)
            .cloned()
            .collect()
    }

    /// Number of errors recorded for a module.
    pub fn error_count(&self, module: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.module == module && d.severity == Severity::Error)
            .count()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_filter() {
        let diagnostics = Diagnostics::new();
        diagnostics.warn("/a.tsx", "skipped call site");
        diagnostics.error("/a.tsx", "evaluation failed");
        diagnostics.error("/b.tsx", "evaluation failed");

        assert_eq!(diagnostics.for_module("/a.tsx").len(), 2);
        assert_eq!(diagnostics.error_count("/a.tsx"), 1);
        assert_eq!(diagnostics.error_count("/c.tsx"), 0);
    }

    #[test]
    fn test_take_drains() {
        let diagnostics = Diagnostics::new();
        diagnostics.warn("/a.tsx", "x");
        assert_eq!(diagnostics.take().len(), 1);
        assert!(diagnostics.is_empty());
    }
}
