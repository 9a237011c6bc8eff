//! Error types.
//!
//! Load failures abort a session. Rename conflicts are not errors: they are
//! carried as data on each candidate. Rewrite failures are collected per file
//! and surfaced once, after every file has been attempted.

use crate::loader::LoadError;
use crate::rewriter::ApplyReport;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("package {0:?} is not part of the loaded program")]
    UnknownPackage(String),

    #[error("no candidate named {0}")]
    UnknownCandidate(String),

    #[error("{id} was already {state}")]
    AlreadyDecided { id: String, state: &'static str },

    #[error("{id}: {conflict}")]
    BatchConflict { id: String, conflict: String },

    #[error("failed to rewrite {failed} file{}", plural(.failed))]
    Rewrite { failed: usize, report: ApplyReport },
}

pub type Result<T> = std::result::Result<T, Error>;

fn plural(n: &usize) -> &'static str {
    if *n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_error_pluralizes() {
        let one = Error::Rewrite {
            failed: 1,
            report: ApplyReport::default(),
        };
        let two = Error::Rewrite {
            failed: 2,
            report: ApplyReport::default(),
        };
        assert_eq!(one.to_string(), "failed to rewrite 1 file");
        assert_eq!(two.to_string(), "failed to rewrite 2 files");
    }
}
