//! File rewriting for applying a rename plan.
//!
//! Every occurrence of a renamed declaration becomes a position-aware
//! [`Edit`]. Edits are grouped per file, checked against the current file
//! contents, sorted by offset and applied back to front so earlier edits
//! don't invalidate later offsets. A file that can't be rewritten is recorded
//! and the remaining files are still processed.

use crate::error::Error;
use crate::model::{FileId, Program};
use crate::renamer::RenamePlan;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

/// Replacement of one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub old: String,
    pub new: String,
}

impl Edit {
    pub fn end(&self) -> usize {
        self.start + self.old.len()
    }
}

#[derive(Debug, ThisError)]
pub enum RewriteError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("offset {offset} is outside the file ({len} bytes)")]
    OutOfRange { offset: usize, len: usize },

    #[error("expected {expected:?} at offset {offset}, found {found:?}; file changed since it was loaded")]
    Stale {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("overlapping edits at offset {0}")]
    Overlap(usize),
}

/// A file that could not be rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of a rename pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Identifier occurrences updated.
    pub occurrences: usize,
    /// Distinct files containing an updated occurrence.
    pub files: usize,
    /// Distinct packages containing an updated file.
    pub packages: usize,
    pub failures: Vec<FileFailure>,
    /// Nothing was written to disk.
    pub dry_run: bool,
}

/// Applies edits to source content, returning the modified string.
///
/// Each edit must still find its old spelling at its offset; mismatches mean
/// the file moved on since the program was loaded.
pub fn splice(content: &str, edits: &[Edit]) -> Result<String, RewriteError> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = content.to_string();
    let mut limit = content.len();
    for edit in sorted {
        if edit.end() > limit {
            return Err(if edit.end() > content.len() {
                RewriteError::OutOfRange {
                    offset: edit.start,
                    len: content.len(),
                }
            } else {
                RewriteError::Overlap(edit.start)
            });
        }
        let found = content.get(edit.start..edit.end());
        if found != Some(edit.old.as_str()) {
            return Err(RewriteError::Stale {
                offset: edit.start,
                expected: edit.old.clone(),
                found: found.unwrap_or_default().to_string(),
            });
        }
        result.replace_range(edit.start..edit.end(), &edit.new);
        limit = edit.start;
    }

    Ok(result)
}

/// Reads `file`, applies `edits`, and writes it back unless `dry_run`.
pub fn rewrite_file(file: &Path, edits: &[Edit], dry_run: bool) -> Result<(), RewriteError> {
    let content = std::fs::read_to_string(file).map_err(|source| RewriteError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    let new_content = splice(&content, edits)?;
    if dry_run {
        return Ok(());
    }
    std::fs::write(file, new_content).map_err(|source| RewriteError::Write {
        path: file.to_path_buf(),
        source,
    })
}

/// Collects one edit per occurrence of every planned declaration, grouped by
/// file. Occurrences reported twice at the same offset collapse to one.
pub fn collect_edits(program: &Program, plan: &RenamePlan) -> BTreeMap<FileId, Vec<Edit>> {
    let mut by_file: BTreeMap<FileId, BTreeMap<usize, Edit>> = BTreeMap::new();
    for (decl, to) in plan.iter() {
        for occ in program.occurrences_of(decl) {
            by_file
                .entry(occ.pos.file)
                .or_default()
                .entry(occ.pos.offset)
                .or_insert_with(|| Edit {
                    start: occ.pos.offset,
                    old: occ.name.clone(),
                    new: to.to_string(),
                });
        }
    }
    by_file
        .into_iter()
        .map(|(file, edits)| (file, edits.into_values().collect()))
        .collect()
}

/// Rewrites every file touched by `plan` in a single pass.
///
/// Takes the program by value: once files are rewritten its positions no
/// longer describe the sources, and a new analysis needs a fresh load.
pub fn execute(program: Program, plan: &RenamePlan, dry_run: bool) -> Result<ApplyReport, Error> {
    let edits = collect_edits(&program, plan);
    let mut report = ApplyReport {
        occurrences: edits.values().map(Vec::len).sum(),
        files: edits.len(),
        dry_run,
        ..Default::default()
    };

    let mut packages = BTreeSet::new();
    for (file_id, file_edits) in &edits {
        let file = program.file(*file_id);
        if packages.insert(file.package) {
            debug!(package = %program.package(file.package).path, "updating package");
        }
        debug!(path = %file.path.display(), edits = file_edits.len(), "rewriting file");
        if let Err(err) = rewrite_file(&file.path, file_edits, dry_run) {
            warn!(path = %file.path.display(), error = %err, "failed to rewrite file");
            report.failures.push(FileFailure {
                path: file.path.clone(),
                message: err.to_string(),
            });
        }
    }
    report.packages = packages.len();

    info!(
        "{} {} occurrence{} in {} file{} in {} package{}.",
        if dry_run { "Would rename" } else { "Renamed" },
        report.occurrences,
        plural(report.occurrences),
        report.files,
        plural(report.files),
        report.packages,
        plural(report.packages)
    );

    if !report.failures.is_empty() {
        return Err(Error::Rewrite {
            failed: report.failures.len(),
            report,
        });
    }
    Ok(report)
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
