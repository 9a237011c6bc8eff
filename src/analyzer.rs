//! Unused-export detection.
//!
//! Compares the target package's exported declarations against the set of
//! declarations used from outside it. Whatever remains could be unexported;
//! whether it can be done safely is decided per candidate by the checker.

use crate::model::{DeclId, DeclKind, PackageId, Position, Program, QualifiedName};
use crate::renamer::RenamePlan;
use crate::usage::UsedSet;
use serde::Serialize;
use std::path::PathBuf;

/// An exported declaration nothing outside its package needs.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: QualifiedName,
    #[serde(skip)]
    pub decl: DeclId,
    pub kind: DeclKind,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    /// Proposed new name.
    pub to: String,
    /// Why renaming is unsafe, if it is.
    pub conflict: Option<String>,
    /// Every declaration renamed along with this one.
    pub renames: Vec<QualifiedName>,
    #[serde(skip)]
    pub plan: RenamePlan,
    #[serde(skip)]
    pub pos: Position,
}

impl Candidate {
    pub fn is_safe(&self) -> bool {
        self.conflict.is_none()
    }
}

/// Summary statistics from a detection run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub packages_loaded: usize,
    pub target_declarations: usize,
    pub exported: usize,
    pub used_externally: usize,
    pub candidates: usize,
    pub conflicting: usize,
}

/// Complete detection results.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub candidates: Vec<Candidate>,
    pub diagnostics: Diagnostics,
}

/// Exported, non-local declarations of `target` that are not in `used`.
///
/// No particular order is guaranteed.
pub fn unused_exports(program: &Program, target: PackageId, used: &UsedSet) -> Vec<DeclId> {
    program
        .package_decls(target)
        .iter()
        .copied()
        .filter(|&id| {
            let decl = program.decl(id);
            decl.is_exported() && !decl.is_local() && !used.contains(id)
        })
        .collect()
}

/// Counts for the target package, before candidates are evaluated.
pub fn diagnostics(program: &Program, target: PackageId, used: &UsedSet) -> Diagnostics {
    let decls = program.package_decls(target);
    let exported: Vec<DeclId> = decls
        .iter()
        .copied()
        .filter(|&id| {
            let decl = program.decl(id);
            decl.is_exported() && !decl.is_local()
        })
        .collect();
    Diagnostics {
        packages_loaded: program.packages().count(),
        target_declarations: decls.len(),
        exported: exported.len(),
        used_externally: exported.iter().filter(|&&id| used.contains(id)).count(),
        ..Default::default()
    }
}
