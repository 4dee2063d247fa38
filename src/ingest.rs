//! Ingest driver: expands inputs, walks archives and feeds the loader.
//!
//! Archives and the entries inside each archive are visited in sorted name
//! order, reversed by default. Loading stops at the first failing record;
//! everything committed before it stays, and a re-run skips it.

use crate::config::LoadConfig;
use crate::error::{LoaderError, Result};
use crate::loader;
use crate::logging::OperationGuard;
use crate::model::{LoadOutcome, LoadSummary};
use crate::parser::ArchiveParser;
use crate::record;
use crate::storage::Storage;
use anyhow::Context;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Knobs for one load run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Emit a [`ProgressEvent::Record`] every this many lines (0 disables).
    pub print_every: usize,
    /// Visit archives and entries in descending name order.
    pub reverse_order: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&LoadConfig::default())
    }
}

impl From<&LoadConfig> for LoadOptions {
    fn from(config: &LoadConfig) -> Self {
        Self {
            print_every: config.print_every,
            reverse_order: config.reverse_order,
        }
    }
}

/// Progress notifications, delivered synchronously.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// An archive was opened.
    ArchiveStarted {
        archive: &'a Path,
        position: usize,
        total: usize,
    },
    /// A sampled record was loaded.
    Record {
        archive: &'a Path,
        entry: &'a str,
        index: usize,
        id_tweets: i64,
        outcome: LoadOutcome,
    },
    /// Every entry of an archive was loaded.
    ArchiveFinished { archive: &'a Path },
}

/// Turn input paths into the ordered list of archives to load.
///
/// Files are taken as given; directories are walked recursively for
/// `*.zip` files. Duplicates are removed.
///
/// # Errors
///
/// Returns [`LoaderError::ArchiveNotFound`] for an input that does not exist
/// and an IO error if a directory cannot be walked.
pub fn expand_inputs(inputs: &[PathBuf], reverse: bool) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();

    for input in inputs {
        if !input.exists() {
            return Err(LoaderError::archive_not_found(input));
        }
        if input.is_dir() {
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_file() && is_zip(entry.path()) {
                    archives.push(entry.into_path());
                }
            }
        } else {
            archives.push(input.clone());
        }
    }

    archives.sort();
    archives.dedup();
    if reverse {
        archives.reverse();
    }
    debug!(count = archives.len(), "Expanded inputs");
    Ok(archives)
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Load every record of every archive under `inputs`.
///
/// # Errors
///
/// Returns the first error encountered, with the archive and entry as
/// context. The underlying [`LoaderError`] can be recovered with
/// `downcast_ref`.
pub fn load_archives<F>(
    storage: &mut Storage,
    inputs: &[PathBuf],
    options: &LoadOptions,
    mut on_progress: F,
) -> anyhow::Result<LoadSummary>
where
    F: FnMut(ProgressEvent<'_>),
{
    let archives = expand_inputs(inputs, options.reverse_order)?;
    let mut summary = LoadSummary::default();

    for (position, path) in archives.iter().enumerate() {
        let guard = OperationGuard::new(format!("load {}", path.display()));
        match load_archive(
            storage,
            path,
            position,
            archives.len(),
            options,
            &mut summary,
            &mut on_progress,
        ) {
            Ok(()) => guard.complete(),
            Err(err) => {
                guard.fail(&*err);
                return Err(err);
            }
        }
        summary.archives += 1;
        on_progress(ProgressEvent::ArchiveFinished { archive: path });
    }

    info!(
        archives = summary.archives,
        records = summary.records,
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Load finished"
    );
    Ok(summary)
}

fn load_archive<F>(
    storage: &mut Storage,
    path: &Path,
    position: usize,
    total: usize,
    options: &LoadOptions,
    summary: &mut LoadSummary,
    on_progress: &mut F,
) -> anyhow::Result<()>
where
    F: FnMut(ProgressEvent<'_>),
{
    let mut parser = ArchiveParser::open(path)?;
    on_progress(ProgressEvent::ArchiveStarted {
        archive: path,
        position,
        total,
    });

    for entry in parser.entry_names(options.reverse_order) {
        let conn = storage.connection_mut();
        parser
            .for_each_record(&entry, |index, value| {
                let outcome = loader::insert_tweet(conn, &value)?;
                summary.record(outcome);

                if options.print_every > 0 && index % options.print_every == 0 {
                    on_progress(ProgressEvent::Record {
                        archive: path,
                        entry: &entry,
                        index,
                        id_tweets: record::tweet_id(&value)?,
                        outcome,
                    });
                }
                Ok(())
            })
            .with_context(|| format!("entry '{entry}' of {}", path.display()))?;
        summary.entries += 1;
    }

    Ok(())
}

/// Open the store at `db_path`, creating its parent directory if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the store cannot
/// be opened.
pub fn open_store(db_path: &Path) -> anyhow::Result<Storage> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Storage::open(db_path)
}
