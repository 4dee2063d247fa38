//! tweet-loader - load zipped tweet archives into a normalized `SQLite` schema
//!
//! Each archive holds line-delimited JSON tweet records. Every record is
//! split into users, tweets, urls, mentions, tags and media rows and written
//! in one transaction, so a run can be interrupted and repeated safely.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Layered configuration
//! - [`error`] - Error types with suggestions
//! - [`ingest`] - Input expansion and the archive loop
//! - [`loader`] - Per-record transactional writes
//! - [`model`] - Row types
//! - [`parser`] - Zip archive reader
//! - [`record`] - Field extraction from one JSON record
//! - [`storage`] - `SQLite` schema and store checks

pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod model;
pub mod parser;
pub mod record;
pub mod storage;

pub use cli::*;
pub use config::Config;
pub use error::{LoaderError, Result, format_error};
pub use ingest::{LoadOptions, ProgressEvent, load_archives, open_store};
pub use model::*;
pub use parser::ArchiveParser;
pub use storage::Storage;

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "tweets.db";

/// Get the default data directory
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tweet-loader")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let abs = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(abs.len() + abs.len() / 3);

    for (idx, ch) in abs.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut formatted: String = out.chars().rev().collect();
    if value < 0 {
        formatted.insert(0, '-');
    }
    formatted
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_count(value: usize) -> String {
    format_number(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::{default_db_path, format_count, format_number};

    #[test]
    fn format_number_adds_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(12_345_678), "12,345,678");
        assert_eq!(format_number(-12_345), "-12,345");
    }

    #[test]
    fn format_count_matches_signed() {
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn default_db_path_is_named() {
        assert!(default_db_path().ends_with("tweet-loader/tweets.db"));
    }
}
