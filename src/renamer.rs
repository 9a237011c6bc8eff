//! Rename capability.
//!
//! [`Renamer`] is the seam between candidate evaluation and the code that
//! actually renames. [`ModelRenamer`] implements it over the program model:
//! `check` computes the set of declarations that must change together and
//! reports the first naming conflict, without touching any file; `apply`
//! hands a merged plan to the rewriter.

use crate::error::Result;
use crate::methodset::MemberTable;
use crate::model::{
    DeclId, DeclKind, OccurrenceKind, PackageId, Program, Shape, TypeRef, is_exported, is_identifier,
};
use crate::rewriter::{self, ApplyReport};
use crate::satisfy::Analysis;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Keywords of the language; never valid as identifiers.
pub const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Declarations to rename, each with its new name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    renames: BTreeMap<DeclId, String>,
}

impl RenamePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rename. An existing entry for `decl` is kept.
    pub fn insert(&mut self, decl: DeclId, to: impl Into<String>) -> bool {
        match self.renames.entry(decl) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(to.into());
                true
            }
        }
    }

    pub fn get(&self, decl: DeclId) -> Option<&str> {
        self.renames.get(&decl).map(String::as_str)
    }

    pub fn contains(&self, decl: DeclId) -> bool {
        self.renames.contains_key(&decl)
    }

    /// Folds `other` into this plan. On overlap the entry already here wins.
    pub fn merge(&mut self, other: &RenamePlan) {
        for (decl, to) in other.iter() {
            if let Some(existing) = self.get(decl) {
                debug!(
                    decl = decl.0,
                    kept = existing,
                    dropped = to,
                    "declaration already planned"
                );
                continue;
            }
            self.renames.insert(decl, to.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &str)> {
        self.renames.iter().map(|(d, n)| (*d, n.as_str()))
    }

    pub fn decls(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.renames.keys().copied()
    }
}

/// Result of a dry-run rename: the full plan and the first conflict found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCheck {
    pub plan: RenamePlan,
    pub conflict: Option<String>,
}

/// Renames declarations across a loaded program.
pub trait Renamer: Send + Sync {
    /// Computes what renaming `decl` to `to` involves, without writing.
    fn check(&self, program: &Program, analysis: &Analysis, decl: DeclId, to: &str)
    -> RenameCheck;

    /// Rewrites every occurrence of every planned declaration.
    fn apply(&self, program: Program, plan: &RenamePlan) -> Result<ApplyReport>;
}

/// [`Renamer`] backed by the program model.
#[derive(Debug, Clone)]
pub struct ModelRenamer {
    reserved: BTreeSet<String>,
    dry_run: bool,
}

impl Default for ModelRenamer {
    fn default() -> Self {
        Self {
            reserved: KEYWORDS.iter().map(|k| k.to_string()).collect(),
            dry_run: false,
        }
    }
}

impl ModelRenamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds names that must never be used as a new name.
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// When set, `apply` verifies and reports without writing files.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    fn conflict(
        &self,
        program: &Program,
        analysis: &Analysis,
        decl: DeclId,
        to: &str,
        plan: &RenamePlan,
    ) -> Option<String> {
        let root = program.decl(decl);
        if to == root.name {
            return Some(format!("{} is already named {}", program.qualified_name(decl), to));
        }
        if !is_identifier(to) {
            return Some(format!("{to:?} is not a valid identifier"));
        }
        if is_exported(to) {
            return Some(format!("{to} is still exported"));
        }
        if self.is_reserved(to) {
            return Some(format!("{to} is a reserved word"));
        }

        let checker = Conflicts {
            program,
            analysis,
            to,
            plan,
        };
        plan.decls().find_map(|member| checker.check(member, root.package))
    }
}

impl Renamer for ModelRenamer {
    fn check(
        &self,
        program: &Program,
        analysis: &Analysis,
        decl: DeclId,
        to: &str,
    ) -> RenameCheck {
        let plan = closure(program, analysis, decl, to);
        let conflict = self.conflict(program, analysis, decl, to, &plan);
        RenameCheck { plan, conflict }
    }

    fn apply(&self, program: Program, plan: &RenamePlan) -> Result<ApplyReport> {
        rewriter::execute(program, plan, self.dry_run)
    }
}

/// Every declaration that must take the new name together with `decl`.
///
/// A type and the embedded fields naming it share one identifier. A method
/// and its counterpart in a satisfaction pairing must keep matching, in both
/// directions, until nothing new is reached.
pub fn closure(program: &Program, analysis: &Analysis, decl: DeclId, to: &str) -> RenamePlan {
    let mut plan = RenamePlan::new();
    let mut work = vec![decl];
    while let Some(id) = work.pop() {
        if !plan.insert(id, to) {
            continue;
        }
        let d = program.decl(id);
        match d.kind {
            DeclKind::Type => work.extend_from_slice(program.embedders(id)),
            DeclKind::Field => work.extend(d.embedded.map(|t| t.decl)),
            DeclKind::Method => {
                for constraint in analysis.constraints(program) {
                    for (im, cm) in constraint.method_pairs(program, analysis.methods()) {
                        if im == id {
                            work.push(cm);
                        } else if cm == id {
                            work.push(im);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    plan
}

/// First clash between `plan` and the names `claimed` already hands out.
///
/// Two declarations taking one new name collide when they share a package
/// scope or a selector table. Declarations already spelled alike keep
/// whatever relation they had. A declaration claimed under another name
/// would leave `plan` split across two spellings.
pub fn batch_conflict(program: &Program, claimed: &RenamePlan, plan: &RenamePlan) -> Option<String> {
    for (decl, to) in plan.iter() {
        if let Some(taken) = claimed.get(decl) {
            if taken != to {
                return Some(format!(
                    "{} is already planned as {}",
                    program.qualified_name(decl),
                    taken
                ));
            }
            continue;
        }
        let rival = claimed
            .iter()
            .find(|&(other, taken)| taken == to && share_namespace(program, decl, other));
        if let Some((other, _)) = rival {
            return Some(format!(
                "{} is already planned for {}",
                to,
                program.qualified_name(other)
            ));
        }
    }
    None
}

fn share_namespace(program: &Program, a: DeclId, b: DeclId) -> bool {
    let (da, db) = (program.decl(a), program.decl(b));
    if da.name == db.name {
        return false;
    }
    if da.is_package_level() && db.is_package_level() {
        return da.package == db.package;
    }
    match (da.owner, db.owner) {
        (Some(oa), Some(ob)) => {
            oa == ob || embeds(program, oa, ob) || embeds(program, ob, oa)
        }
        _ => false,
    }
}

/// Whether `outer` reaches `inner` through embedding, at any depth.
fn embeds(program: &Program, outer: DeclId, inner: DeclId) -> bool {
    let mut seen = HashSet::from([inner]);
    let mut work = vec![inner];
    while let Some(ty) = work.pop() {
        for next in embedding_types(program, ty) {
            if next == outer {
                return true;
            }
            if seen.insert(next) {
                work.push(next);
            }
        }
    }
    false
}

/// Struct types with an embedded field of `ty`, and interfaces embedding it.
fn embedding_types(program: &Program, ty: DeclId) -> Vec<DeclId> {
    let mut outer: Vec<DeclId> = program
        .embedders(ty)
        .iter()
        .filter_map(|&field| program.decl(field).owner)
        .collect();
    if program.decl(ty).is_interface() {
        outer.extend(program.decls().filter_map(|(id, d)| match &d.shape {
            Shape::Interface { embeds } if embeds.iter().any(|e| e.decl == ty) => Some(id),
            _ => None,
        }));
    }
    outer
}

struct Conflicts<'a> {
    program: &'a Program,
    analysis: &'a Analysis,
    to: &'a str,
    plan: &'a RenamePlan,
}

impl Conflicts<'_> {
    fn check(&self, member: DeclId, package: PackageId) -> Option<String> {
        let program = self.program;
        let decl = program.decl(member);
        if decl.package != package {
            return Some(format!(
                "renaming requires changing {} in another package",
                program.qualified_name(member)
            ));
        }
        if let Some(occ) = program.occurrences_of(member).find(|occ| {
            occ.kind == OccurrenceKind::Use && program.occurrence_package(occ) != decl.package
        }) {
            return Some(format!(
                "{} is referenced from another package at {}",
                program.qualified_name(member),
                program.location(occ.pos)
            ));
        }
        if decl.is_package_level() {
            self.package_level(member)
        } else if let Some(owner) = decl.owner {
            self.selector(owner)
        } else {
            None
        }
    }

    fn package_level(&self, member: DeclId) -> Option<String> {
        let program = self.program;
        let package = program.decl(member).package;

        for &other in program.package_decls(package) {
            let d = program.decl(other);
            if d.is_package_level() && d.name == self.to && !self.plan.contains(other) {
                return Some(format!(
                    "{} conflicts with {} declared at {}",
                    self.to,
                    program.qualified_name(other),
                    program.location(d.pos)
                ));
            }
        }

        for &file in program.files_of(package) {
            let source = program.file(file);
            if source.imports.iter().any(|name| name == self.to) {
                return Some(format!(
                    "{} conflicts with an import in {}",
                    self.to,
                    source.path.display()
                ));
            }
        }

        for occ in program.occurrences() {
            if occ.decl.is_none()
                && occ.name == self.to
                && program.occurrence_package(occ) == package
            {
                return Some(format!(
                    "{} would shadow the predeclared identifier used at {}",
                    self.to,
                    program.location(occ.pos)
                ));
            }
        }

        for occ in program.occurrences_of(member) {
            if occ.kind != OccurrenceKind::Use || occ.decl != Some(member) {
                continue;
            }
            let mut scope = occ.scope;
            while let Some(id) = scope {
                let shadow = program.locals(id).iter().copied().find(|&local| {
                    let l = program.decl(local);
                    l.name == self.to && l.pos.file == occ.pos.file && l.pos.offset < occ.pos.offset
                });
                if let Some(local) = shadow {
                    return Some(format!(
                        "use at {} would be shadowed by the local {} declared at {}",
                        program.location(occ.pos),
                        self.to,
                        program.location(program.decl(local).pos)
                    ));
                }
                scope = program.scope(id).parent;
            }
        }

        None
    }

    /// Conflicts for a field or method of `owner`: on the owner itself, in
    /// every struct embedding it, and in every interface embedding it.
    fn selector(&self, owner: DeclId) -> Option<String> {
        let program = self.program;
        let own = self.table(owner);
        if let Some(hit) = self.clash(&own) {
            return Some(format!(
                "{} conflicts with {} of {}",
                self.to,
                hit,
                program.qualified_name(owner)
            ));
        }

        let mut seen = HashSet::from([owner]);
        let mut work = vec![owner];
        while let Some(ty) = work.pop() {
            for outer in embedding_types(program, ty) {
                if !seen.insert(outer) {
                    continue;
                }
                if let Some(hit) = self.clash(&self.table(outer)) {
                    return Some(format!(
                        "{} would collide with {} in {}, which embeds {}",
                        self.to,
                        hit,
                        program.qualified_name(outer),
                        program.qualified_name(ty)
                    ));
                }
                work.push(outer);
            }
        }
        None
    }

    fn table(&self, ty: DeclId) -> Arc<MemberTable> {
        let reference = if self.program.decl(ty).is_interface() {
            TypeRef::value(ty)
        } else {
            TypeRef::ptr(ty)
        };
        self.analysis.methods().table(self.program, reference)
    }

    /// Describes an existing selector spelled like the new name that isn't
    /// being renamed along with it.
    fn clash(&self, table: &MemberTable) -> Option<String> {
        match table.get(self.to) {
            Some(sel) if !self.plan.contains(sel.decl) => {
                let d = self.program.decl(sel.decl);
                Some(format!("{} {}", d.kind, self.program.qualified_name(sel.decl)))
            }
            Some(_) => None,
            None if table.is_ambiguous(self.to) => {
                Some(format!("the ambiguous selector {}", self.to))
            }
            None => None,
        }
    }
}
