//! Zip archive reader for line-delimited tweet JSON.
//!
//! Each archive holds one or more entries; every non-blank line of an entry
//! is one JSON record. Entries are visited in sorted name order, reversed by
//! default so that the newest dated files are loaded first.

use crate::error::{LoaderError, Result, ResultExt};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use zip::ZipArchive;

/// Reader over a single zip archive.
pub struct ArchiveParser {
    archive_path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl ArchiveParser {
    /// Open an archive.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ArchiveNotFound`] if the file does not exist and
    /// [`LoaderError::InvalidArchive`] if it is not a readable zip.
    pub fn open(archive_path: impl AsRef<Path>) -> Result<Self> {
        let archive_path = archive_path.as_ref().to_path_buf();
        let file = File::open(&archive_path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                LoaderError::archive_not_found(&archive_path)
            } else {
                LoaderError::IoError(err)
            }
        })?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|err| LoaderError::invalid_archive(&archive_path, err.to_string()))?;

        debug!(
            archive = %archive_path.display(),
            entries = archive.len(),
            "Opened archive"
        );
        Ok(Self {
            archive_path,
            archive,
        })
    }

    /// Names of the file entries, sorted; reversed when `reverse` is set.
    ///
    /// Directory entries are skipped.
    #[must_use]
    pub fn entry_names(&self, reverse: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(String::from)
            .collect();
        names.sort();
        if reverse {
            names.reverse();
        }
        names
    }

    /// Stream the records of one entry into `on_record`.
    ///
    /// The callback receives the zero-based line index within the entry and
    /// the decoded value. Blank lines are skipped but still counted, so the
    /// index always matches the line's position. Stops at the first error,
    /// from decoding or from the callback.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidJson`] for a line that does not decode,
    /// or whatever error the callback returned.
    pub fn for_each_record<F>(&mut self, entry: &str, mut on_record: F) -> Result<usize>
    where
        F: FnMut(usize, Value) -> Result<()>,
    {
        let file = self.archive.by_name(entry)?;
        let reader = BufReader::new(file);
        let mut records = 0;

        for (index, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!(
                    "Failed to read line {} of '{entry}' in {}",
                    index + 1,
                    self.archive_path.display()
                )
            })?;
            if line.trim().is_empty() {
                trace!(entry, index, "Skipping blank line");
                continue;
            }

            let value: Value =
                serde_json::from_str(&line).map_err(|err| LoaderError::InvalidJson {
                    archive: self.archive_path.clone(),
                    entry: entry.to_string(),
                    line: index + 1,
                    reason: err.to_string(),
                })?;

            on_record(index, value)?;
            records += 1;
        }

        debug!(entry, records, "Finished entry");
        Ok(records)
    }
}
