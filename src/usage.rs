//! Cross-package usage.
//!
//! A declaration counts as used when something outside its own package
//! depends on its spelling: a use occurrence in another package, membership
//! in a cross-package satisfaction pairing, or being an embedded field (whose
//! name is dictated by the embedded type).

use crate::model::{DeclId, OccurrenceKind, Program};
use crate::satisfy::{Analysis, satisfied_methods};
use std::collections::HashSet;
use tracing::debug;

/// Declarations whose exported spelling is required outside their package.
#[derive(Debug, Default, Clone)]
pub struct UsedSet {
    used: HashSet<DeclId>,
}

impl UsedSet {
    pub fn contains(&self, id: DeclId) -> bool {
        self.used.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.used.iter().copied()
    }
}

/// Marks declarations referenced from a package other than their own.
///
/// Runs in a single pass over the occurrences. Builtins (no declaration) are
/// skipped, and references from within the declaring package never count.
pub fn collect_uses(program: &Program) -> HashSet<DeclId> {
    let mut used = HashSet::new();
    for occ in program.occurrences() {
        if occ.kind != OccurrenceKind::Use {
            continue;
        }
        let Some(decl) = occ.decl else {
            continue;
        };
        if program.decl(decl).package != program.occurrence_package(occ) {
            used.insert(decl);
        }
        // The identifier of an embedded field is spelled like its type, so
        // the field can't be renamed on its own.
        if let Some(field) = occ.embeds {
            used.insert(field);
        }
    }
    used
}

/// Combines direct cross-package uses with satisfaction pinning.
pub fn used_decls(program: &Program, analysis: &Analysis) -> UsedSet {
    let mut used = collect_uses(program);
    let direct = used.len();
    used.extend(satisfied_methods(program, analysis));
    debug!(
        direct,
        via_interfaces = used.len() - direct,
        "collected externally used declarations"
    );
    UsedSet { used }
}
