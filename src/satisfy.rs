//! Interface satisfaction.
//!
//! Every assignability fact whose target is an interface yields a
//! [`Constraint`] once the source type's method set is checked to cover the
//! interface. Constraints that cross a package boundary pin both sides: the
//! interface method and the concrete method selected for the same name must
//! keep their exported spelling, or the pairing breaks in the other package.

use crate::methodset::MethodSetCache;
use crate::model::{DeclId, Program, TypeRef};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use tracing::debug;

/// A concrete (or interface) type whose method set satisfies an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    pub concrete: TypeRef,
    pub interface: DeclId,
}

impl Constraint {
    /// Whether both types are declared in the same package.
    pub fn is_local(&self, program: &Program) -> bool {
        program.decl(self.concrete.decl).package == program.decl(self.interface).package
    }

    /// Pairs of (interface method, concrete method) sharing a name.
    pub fn method_pairs(&self, program: &Program, cache: &MethodSetCache) -> Vec<(DeclId, DeclId)> {
        let iface = cache.table(program, TypeRef::value(self.interface));
        let concrete = cache.table(program, self.concrete);
        iface
            .methods()
            .filter_map(|(name, im)| concrete.method(name).map(|cm| (im, cm)))
            .collect()
    }
}

/// Shared, read-only analysis state for one program: the method-set cache and
/// the lazily computed constraint set.
#[derive(Debug, Default)]
pub struct Analysis {
    methods: MethodSetCache,
    constraints: OnceLock<Vec<Constraint>>,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods(&self) -> &MethodSetCache {
        &self.methods
    }

    /// All satisfaction constraints of the program, computed on first use.
    pub fn constraints(&self, program: &Program) -> &[Constraint] {
        self.constraints
            .get_or_init(|| find_constraints(program, &self.methods))
    }
}

/// Derives satisfaction constraints from the program's assignability facts.
pub fn find_constraints(program: &Program, cache: &MethodSetCache) -> Vec<Constraint> {
    let mut found = BTreeSet::new();
    for assignment in program.assignments() {
        let to = program.decl(assignment.to.decl);
        if !to.is_interface() || assignment.to.pointer {
            continue;
        }
        if assignment.from.decl == assignment.to.decl {
            continue;
        }
        if !cache.implements(program, assignment.from, assignment.to.decl) {
            debug!(
                from = %program.qualified_name(assignment.from.decl),
                to = %program.qualified_name(assignment.to.decl),
                "assignment does not satisfy interface, ignoring"
            );
            continue;
        }
        found.insert(Constraint {
            concrete: assignment.from,
            interface: assignment.to.decl,
        });
    }
    debug!(constraints = found.len(), "resolved interface satisfaction");
    found.into_iter().collect()
}

/// Methods pinned by cross-package satisfaction.
///
/// Constraints within one package are skipped: satisfying a local interface
/// doesn't require anything to be exported.
pub fn satisfied_methods(program: &Program, analysis: &Analysis) -> HashSet<DeclId> {
    let mut used = HashSet::new();
    for constraint in analysis.constraints(program) {
        if constraint.is_local(program) {
            continue;
        }
        for (im, cm) in constraint.method_pairs(program, analysis.methods()) {
            used.insert(im);
            used.insert(cm);
        }
    }
    used
}
