//! Custom error types for tweet-loader.
//!
//! Provides structured error handling with enough context to locate the
//! offending archive, entry and line when a load halts.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for loader operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling better error messages and programmatic error handling.
#[derive(Error, Debug)]
pub enum LoaderError {
    // =========================================================================
    // Archive Errors
    // =========================================================================
    /// Input path does not exist.
    #[error("Archive not found at '{path}'")]
    ArchiveNotFound { path: PathBuf },

    /// Input exists but is not a readable zip archive.
    #[error("Invalid archive '{path}': {reason}")]
    InvalidArchive { path: PathBuf, reason: String },

    /// A line inside an archive entry is not valid JSON.
    #[error("Invalid JSON in '{archive}' entry '{entry}' line {line}: {reason}")]
    InvalidJson {
        archive: PathBuf,
        entry: String,
        line: usize,
        reason: String,
    },

    // =========================================================================
    // Record Errors
    // =========================================================================
    /// A required field is absent from the record.
    #[error("Record is missing required field '{field}'")]
    MissingField { field: String },

    /// A field is present but has an unexpected shape.
    #[error("Record field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    /// Invalid date format in record data.
    #[error("Invalid date format '{value}' in {field}")]
    InvalidDate { value: String, field: String },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database file not found (nothing loaded yet).
    #[error("No database found at '{path}'. Run 'load-tweets load --inputs <archive>' first.")]
    DatabaseNotFound { path: PathBuf },

    /// Database schema version mismatch.
    #[error("Database schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: i32, found: i32 },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Zip container error.
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

impl LoaderError {
    /// Create an archive not found error.
    pub fn archive_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ArchiveNotFound { path: path.into() }
    }

    /// Create an invalid archive error.
    pub fn invalid_archive(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a database not found error.
    pub fn database_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DatabaseNotFound { path: path.into() }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error comes from the content of a record rather than
    /// from the environment.
    #[must_use]
    pub const fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson { .. }
                | Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::InvalidDate { .. }
        )
    }

    /// Check if this error is recoverable (user can fix it and re-run).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ArchiveNotFound { .. }
                | Self::InvalidArchive { .. }
                | Self::DatabaseNotFound { .. }
                | Self::ConfigError { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ArchiveNotFound { .. } => Some("Verify the input paths passed to --inputs."),
            Self::InvalidArchive { .. } => {
                Some("Inputs must be zip archives or directories containing zip archives.")
            }
            Self::DatabaseNotFound { .. } => {
                Some("Run 'load-tweets load --inputs <archive>' to create the database.")
            }
            Self::SchemaMismatch { .. } => {
                Some("Load into a fresh database file; the schema is created on first open.")
            }
            Self::InvalidJson { .. }
            | Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::InvalidDate { .. } => Some(
                "Fix or remove the offending record and re-run; already loaded tweets are skipped.",
            ),
            Self::ConfigError { .. } => {
                Some("Fix the file, or move it aside and run 'load-tweets config --init'.")
            }
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LoaderError::with_context(context, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| LoaderError::with_context(f(), e))
    }
}

// =============================================================================
// CLI Error Formatting
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
///
/// # Arguments
/// * `title` - Brief error title (e.g., "Load failed")
/// * `explanation` - What went wrong and why
/// * `suggestions` - List of actionable suggestions
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoaderError::archive_not_found("/path/to/archive.zip");
        assert!(err.to_string().contains("/path/to/archive.zip"));
    }

    #[test]
    fn test_error_suggestions() {
        let err = LoaderError::database_not_found("/path/to/db");
        assert!(err.suggestion().is_some());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_record_errors_are_classified() {
        let err = LoaderError::missing_field("user.id");
        assert!(err.is_record_error());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("user.id"));

        let err = LoaderError::InvalidJson {
            archive: PathBuf::from("2021-01-01.zip"),
            entry: "part0.jsonl".to_string(),
            line: 7,
            reason: "EOF while parsing".to_string(),
        };
        assert!(err.is_record_error());
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LoaderError = io_err.into();
        assert!(matches!(err, LoaderError::IoError(_)));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: LoaderError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, LoaderError::DatabaseError(_)));
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn test_result_ext_wraps_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let err = ResultExt::context(res, "reading entry").unwrap_err();
        assert_eq!(err.to_string(), "reading entry: boom");
    }

    #[test]
    fn format_error_single_suggestion() {
        let output = format_error("Test Error", "Something went wrong", &["Try this"]);
        assert!(output.contains("Test Error"));
        assert!(output.contains("Something went wrong"));
        assert!(output.contains("Try this"));
    }

    #[test]
    fn format_error_multiple_suggestions() {
        let output = format_error(
            "Test Error",
            "Something went wrong",
            &["First option", "Second option"],
        );
        assert!(output.contains("First option"));
        assert!(output.contains("Second option"));
    }
}
