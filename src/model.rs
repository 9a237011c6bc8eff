//! Typed program model.
//!
//! A [`Program`] is the type-checked view of every loaded package: packages,
//! files, lexical scopes, declarations, identifier occurrences, and the
//! assignability facts the type checker recorded. It is built once from a
//! [`ProgramData`] document (usually deserialized from JSON by a loader),
//! validated, indexed, and from then on only read.
//!
//! Exported-ness is never stored: it is derived from the first character of a
//! declaration's name, so a renamed declaration can't disagree with itself.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Index of a declaration in [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub usize);

/// Index of a package in [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub usize);

/// Index of a source file in [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub usize);

/// Index of a function-local lexical scope in [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Var,
    Const,
    Type,
    Func,
    Method,
    Field,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclKind::Var => "var",
            DeclKind::Const => "const",
            DeclKind::Type => "type",
            DeclKind::Func => "func",
            DeclKind::Method => "method",
            DeclKind::Field => "field",
        };
        f.write_str(s)
    }
}

/// Location of an identifier. `line` and `column` are 1-indexed; zero means
/// the front end didn't report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub file: FileId,
    /// Byte offset of the first character of the identifier.
    pub offset: usize,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

impl Position {
    pub fn new(file: FileId, offset: usize) -> Self {
        Self {
            file,
            offset,
            line: 0,
            column: 0,
        }
    }

    pub fn at(file: FileId, offset: usize, line: usize, column: usize) -> Self {
        Self {
            file,
            offset,
            line,
            column,
        }
    }

    /// Key for ordering positions in source order.
    pub fn sort_key(&self) -> (FileId, usize) {
        (self.file, self.offset)
    }
}

/// A named type, optionally behind a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    pub decl: DeclId,
    #[serde(default)]
    pub pointer: bool,
}

impl TypeRef {
    pub fn value(decl: DeclId) -> Self {
        Self {
            decl,
            pointer: false,
        }
    }

    pub fn ptr(decl: DeclId) -> Self {
        Self {
            decl,
            pointer: true,
        }
    }
}

/// Underlying shape of a type declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    /// Anything that is neither a struct nor an interface.
    #[default]
    Basic,
    /// Fields are the `field` declarations owned by the type.
    Struct,
    /// Methods are the `method` declarations owned by the type, plus those of
    /// the embedded interfaces.
    Interface {
        #[serde(default)]
        embeds: Vec<TypeRef>,
    },
}

/// A named entity introduced in exactly one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub package: PackageId,
    pub pos: Position,
    /// Receiver type of a method, or the struct/interface declaring a field
    /// or interface method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<DeclId>,
    #[serde(default)]
    pub pointer_receiver: bool,
    /// Type named by an embedded field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<TypeRef>,
    /// Set for function-local declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    #[serde(default)]
    pub shape: Shape,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclKind, package: PackageId, pos: Position) -> Self {
        Self {
            name: name.into(),
            kind,
            package,
            pos,
            owner: None,
            pointer_receiver: false,
            embedded: None,
            scope: None,
            shape: Shape::Basic,
        }
    }

    pub fn with_owner(mut self, owner: DeclId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_pointer_receiver(mut self) -> Self {
        self.pointer_receiver = true;
        self
    }

    pub fn embedding(mut self, ty: TypeRef) -> Self {
        self.embedded = Some(ty);
        self
    }

    pub fn in_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }

    pub fn is_local(&self) -> bool {
        self.scope.is_some()
    }

    pub fn is_member(&self) -> bool {
        self.owner.is_some()
    }

    pub fn is_package_level(&self) -> bool {
        !self.is_local() && !self.is_member()
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.shape, Shape::Interface { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Unique import path.
    pub path: String,
    /// Import paths this package imports.
    #[serde(default)]
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub package: PackageId,
    /// Names under which imported packages are visible in this file.
    #[serde(default)]
    pub imports: Vec<String>,
}

/// A function-local block. Package scope is implicit and has no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub file: FileId,
    #[serde(default)]
    pub parent: Option<ScopeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceKind {
    Def,
    Use,
}

/// An identifier in source bound to the declaration it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Identifier as spelled at this site.
    pub name: String,
    pub pos: Position,
    pub kind: OccurrenceKind,
    /// `None` for builtin and predeclared identifiers.
    #[serde(default)]
    pub decl: Option<DeclId>,
    /// Innermost local scope enclosing the site.
    #[serde(default)]
    pub scope: Option<ScopeId>,
    /// For an embedded-field identifier: the field it also defines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeds: Option<DeclId>,
}

impl Occurrence {
    /// Byte offset one past the identifier.
    pub fn end(&self) -> usize {
        self.pos.offset + self.name.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignKind {
    #[default]
    Assign,
    Conversion,
    Assertion,
    Composite,
    Call,
    Return,
}

/// A value of type `from` used where type `to` is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub from: TypeRef,
    pub to: TypeRef,
    #[serde(default)]
    pub kind: AssignKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

/// Serialized form of a program, as produced by a front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramData {
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub decls: Vec<Declaration>,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("package {0:?} is listed more than once")]
    DuplicatePackage(String),

    #[error("{what} {index} refers to missing {target} {id}")]
    Dangling {
        what: &'static str,
        index: usize,
        target: &'static str,
        id: usize,
    },

    #[error("declaration {name:?}: {reason}")]
    Malformed { name: String, reason: &'static str },

    #[error("scope {0} is its own ancestor")]
    ScopeCycle(usize),
}

/// Validated, indexed, read-only program.
#[derive(Debug)]
pub struct Program {
    data: ProgramData,
    package_index: HashMap<String, PackageId>,
    files_by_package: Vec<Vec<FileId>>,
    decls_by_package: Vec<Vec<DeclId>>,
    members: HashMap<DeclId, Vec<DeclId>>,
    locals: HashMap<ScopeId, Vec<DeclId>>,
    embedders: HashMap<DeclId, Vec<DeclId>>,
    refs: HashMap<DeclId, Vec<usize>>,
}

impl Program {
    pub fn new(data: ProgramData) -> Result<Self, ModelError> {
        validate(&data)?;

        let mut package_index = HashMap::new();
        for (i, pkg) in data.packages.iter().enumerate() {
            if package_index.insert(pkg.path.clone(), PackageId(i)).is_some() {
                return Err(ModelError::DuplicatePackage(pkg.path.clone()));
            }
        }

        let mut files_by_package = vec![Vec::new(); data.packages.len()];
        for (i, file) in data.files.iter().enumerate() {
            files_by_package[file.package.0].push(FileId(i));
        }

        let mut decls_by_package = vec![Vec::new(); data.packages.len()];
        let mut members: HashMap<DeclId, Vec<DeclId>> = HashMap::new();
        let mut locals: HashMap<ScopeId, Vec<DeclId>> = HashMap::new();
        let mut embedders: HashMap<DeclId, Vec<DeclId>> = HashMap::new();
        for (i, decl) in data.decls.iter().enumerate() {
            let id = DeclId(i);
            decls_by_package[decl.package.0].push(id);
            if let Some(owner) = decl.owner {
                members.entry(owner).or_default().push(id);
            }
            if let Some(scope) = decl.scope {
                locals.entry(scope).or_default().push(id);
            }
            if let Some(ty) = decl.embedded {
                embedders.entry(ty.decl).or_default().push(id);
            }
        }

        let mut refs: HashMap<DeclId, Vec<usize>> = HashMap::new();
        for (i, occ) in data.occurrences.iter().enumerate() {
            for id in occ.decl.iter().chain(occ.embeds.iter()) {
                refs.entry(*id).or_default().push(i);
            }
        }

        Ok(Self {
            data,
            package_index,
            files_by_package,
            decls_by_package,
            members,
            locals,
            embedders,
            refs,
        })
    }

    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.data
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId(i), p))
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.data.packages[id.0]
    }

    pub fn package_by_path(&self, path: &str) -> Option<PackageId> {
        self.package_index.get(path).copied()
    }

    pub fn files_of(&self, pkg: PackageId) -> &[FileId] {
        &self.files_by_package[pkg.0]
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.data.files[id.0]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.data.scopes[id.0]
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.data.decls[id.0]
    }

    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.data
            .decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i), d))
    }

    pub fn decl_count(&self) -> usize {
        self.data.decls.len()
    }

    pub fn package_decls(&self, pkg: PackageId) -> &[DeclId] {
        &self.decls_by_package[pkg.0]
    }

    /// Fields and methods whose owner is `ty`, in declaration order.
    pub fn members(&self, ty: DeclId) -> &[DeclId] {
        self.members.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Local declarations made directly in `scope`.
    pub fn locals(&self, scope: ScopeId) -> &[DeclId] {
        self.locals.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Embedded fields whose type is `ty`.
    pub fn embedders(&self, ty: DeclId) -> &[DeclId] {
        self.embedders.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.data.occurrences
    }

    /// Occurrences resolving to `decl`, including embedded-field identifiers
    /// that define it.
    pub fn occurrences_of(&self, decl: DeclId) -> impl Iterator<Item = &Occurrence> {
        self.refs
            .get(&decl)
            .into_iter()
            .flatten()
            .map(|&i| &self.data.occurrences[i])
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.data.assignments
    }

    /// Package containing an occurrence.
    pub fn occurrence_package(&self, occ: &Occurrence) -> PackageId {
        self.file(occ.pos.file).package
    }

    /// Human-readable `path:line:column`, or `path:#offset` when the front
    /// end reported no line information.
    pub fn location(&self, pos: Position) -> String {
        let path = self.file(pos.file).path.display();
        if pos.line > 0 {
            format!("{}:{}:{}", path, pos.line, pos.column)
        } else {
            format!("{}:#{}", path, pos.offset)
        }
    }

    pub fn qualified_name(&self, id: DeclId) -> QualifiedName {
        let decl = self.decl(id);
        QualifiedName {
            package: self.package(decl.package).path.clone(),
            owner: decl.owner.map(|o| self.decl(o).name.clone()),
            name: decl.name.clone(),
        }
    }

    /// Finds a declaration by qualified name. Local declarations are never
    /// matched.
    pub fn lookup(&self, name: &QualifiedName) -> Option<DeclId> {
        let pkg = self.package_by_path(&name.package)?;
        self.package_decls(pkg).iter().copied().find(|&id| {
            let decl = self.decl(id);
            !decl.is_local()
                && decl.name == name.name
                && decl.owner.map(|o| self.decl(o).name.as_str()) == name.owner.as_deref()
        })
    }

    /// Rebases relative file paths onto `root`.
    pub(crate) fn resolve_paths(data: &mut ProgramData, root: &Path) {
        for file in &mut data.files {
            if file.path.is_relative() {
                file.path = root.join(&file.path);
            }
        }
    }
}

fn validate(data: &ProgramData) -> Result<(), ModelError> {
    let dangling = |what, index, target, id| ModelError::Dangling {
        what,
        index,
        target,
        id,
    };
    let npkgs = data.packages.len();
    let nfiles = data.files.len();
    let nscopes = data.scopes.len();
    let ndecls = data.decls.len();

    for (i, file) in data.files.iter().enumerate() {
        if file.package.0 >= npkgs {
            return Err(dangling("file", i, "package", file.package.0));
        }
    }
    for (i, scope) in data.scopes.iter().enumerate() {
        if scope.file.0 >= nfiles {
            return Err(dangling("scope", i, "file", scope.file.0));
        }
        if let Some(parent) = scope.parent {
            if parent.0 >= nscopes {
                return Err(dangling("scope", i, "scope", parent.0));
            }
        }
    }
    for (i, scope) in data.scopes.iter().enumerate() {
        // A chain longer than the number of scopes must revisit one.
        let mut parent = scope.parent;
        let mut steps = 0;
        while let Some(id) = parent {
            steps += 1;
            if id.0 == i || steps > nscopes {
                return Err(ModelError::ScopeCycle(i));
            }
            parent = data.scopes[id.0].parent;
        }
    }
    for (i, decl) in data.decls.iter().enumerate() {
        if decl.package.0 >= npkgs {
            return Err(dangling("declaration", i, "package", decl.package.0));
        }
        if decl.pos.file.0 >= nfiles {
            return Err(dangling("declaration", i, "file", decl.pos.file.0));
        }
        if let Some(scope) = decl.scope {
            if scope.0 >= nscopes {
                return Err(dangling("declaration", i, "scope", scope.0));
            }
        }
        if let Some(ty) = decl.embedded {
            if ty.decl.0 >= ndecls {
                return Err(dangling("declaration", i, "declaration", ty.decl.0));
            }
        }
        match (decl.kind, decl.owner) {
            (DeclKind::Method | DeclKind::Field, None) => {
                return Err(ModelError::Malformed {
                    name: decl.name.clone(),
                    reason: "methods and fields need an owner",
                });
            }
            (_, Some(owner)) => {
                if owner.0 >= ndecls {
                    return Err(dangling("declaration", i, "declaration", owner.0));
                }
                if data.decls[owner.0].kind != DeclKind::Type {
                    return Err(ModelError::Malformed {
                        name: decl.name.clone(),
                        reason: "owner is not a type",
                    });
                }
            }
            _ => {}
        }
        if let Shape::Interface { embeds } = &decl.shape {
            if let Some(bad) = embeds.iter().find(|t| t.decl.0 >= ndecls) {
                return Err(dangling("declaration", i, "declaration", bad.decl.0));
            }
        }
    }
    for (i, occ) in data.occurrences.iter().enumerate() {
        if occ.pos.file.0 >= nfiles {
            return Err(dangling("occurrence", i, "file", occ.pos.file.0));
        }
        for id in occ.decl.iter().chain(occ.embeds.iter()) {
            if id.0 >= ndecls {
                return Err(dangling("occurrence", i, "declaration", id.0));
            }
        }
        if let Some(scope) = occ.scope {
            if scope.0 >= nscopes {
                return Err(dangling("occurrence", i, "scope", scope.0));
            }
        }
    }
    for (i, a) in data.assignments.iter().enumerate() {
        for t in [a.from, a.to] {
            if t.decl.0 >= ndecls {
                return Err(dangling("assignment", i, "declaration", t.decl.0));
            }
        }
    }
    Ok(())
}

/// Incremental construction of a [`Program`], used by front ends and tests.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    data: ProgramData,
}

impl ProgramBuilder {
    pub fn package(&mut self, path: &str) -> PackageId {
        self.data.packages.push(Package {
            path: path.to_string(),
            imports: Vec::new(),
        });
        PackageId(self.data.packages.len() - 1)
    }

    /// Records that `pkg` imports `path`.
    pub fn import_path(&mut self, pkg: PackageId, path: &str) {
        self.data.packages[pkg.0].imports.push(path.to_string());
    }

    pub fn file(&mut self, pkg: PackageId, path: impl Into<PathBuf>) -> FileId {
        self.data.files.push(SourceFile {
            path: path.into(),
            package: pkg,
            imports: Vec::new(),
        });
        FileId(self.data.files.len() - 1)
    }

    /// Records that `file` sees an imported package under `name`.
    pub fn import_name(&mut self, file: FileId, name: &str) {
        self.data.files[file.0].imports.push(name.to_string());
    }

    pub fn scope(&mut self, file: FileId, parent: Option<ScopeId>) -> ScopeId {
        self.data.scopes.push(Scope { file, parent });
        ScopeId(self.data.scopes.len() - 1)
    }

    /// Adds a declaration without a definition occurrence.
    pub fn decl(&mut self, decl: Declaration) -> DeclId {
        self.data.decls.push(decl);
        DeclId(self.data.decls.len() - 1)
    }

    /// Adds a declaration together with its definition occurrence.
    pub fn declare(&mut self, decl: Declaration) -> DeclId {
        let occ = Occurrence {
            name: decl.name.clone(),
            pos: decl.pos,
            kind: OccurrenceKind::Def,
            decl: None,
            scope: decl.scope,
            embeds: None,
        };
        let id = self.decl(decl);
        self.data.occurrences.push(Occurrence {
            decl: Some(id),
            ..occ
        });
        id
    }

    /// Adds a use of `decl` at `pos`.
    pub fn use_at(&mut self, decl: DeclId, pos: Position) {
        self.use_in(decl, pos, None);
    }

    /// Adds a use of `decl` at `pos` inside a local scope.
    pub fn use_in(&mut self, decl: DeclId, pos: Position, scope: Option<ScopeId>) {
        let name = self.data.decls[decl.0].name.clone();
        self.data.occurrences.push(Occurrence {
            name,
            pos,
            kind: OccurrenceKind::Use,
            decl: Some(decl),
            scope,
            embeds: None,
        });
    }

    /// Adds a use of a predeclared identifier.
    pub fn builtin_use(&mut self, name: &str, pos: Position, scope: Option<ScopeId>) {
        self.data.occurrences.push(Occurrence {
            name: name.to_string(),
            pos,
            kind: OccurrenceKind::Use,
            decl: None,
            scope,
            embeds: None,
        });
    }

    /// Adds the identifier of an embedded field: a use of the embedded type
    /// that also defines `field`. The field must already carry its embedded
    /// type.
    pub fn embed_at(&mut self, field: DeclId, pos: Position) {
        let decl = &self.data.decls[field.0];
        let ty = decl.embedded.map(|t| t.decl);
        self.data.occurrences.push(Occurrence {
            name: decl.name.clone(),
            pos,
            kind: OccurrenceKind::Use,
            decl: ty,
            scope: None,
            embeds: Some(field),
        });
    }

    pub fn assign(&mut self, from: TypeRef, to: TypeRef) {
        self.assign_as(from, to, AssignKind::Assign);
    }

    pub fn assign_as(&mut self, from: TypeRef, to: TypeRef, kind: AssignKind) {
        self.data.assignments.push(Assignment {
            from,
            to,
            kind,
            pos: None,
        });
    }

    pub fn build(self) -> Result<Program, ModelError> {
        Program::new(self.data)
    }
}

/// Reports whether `name` is spelled as an exported identifier.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// The unexported spelling of `name`: first character lower-cased.
pub fn unexported_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Reports whether `name` is a syntactically valid identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Fully qualified declaration path: `"pkg".Name` or `("pkg".Owner).Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub package: String,
    pub owner: Option<String>,
    pub name: String,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "(\"{}\".{}).{}", self.package, owner, self.name),
            None => write!(f, "\"{}\".{}", self.package, self.name),
        }
    }
}

impl Serialize for QualifiedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid qualified name '{0}', expected '\"pkg\".Name' or '(\"pkg\".Type).Name'")]
pub struct ParseNameError(String);

impl FromStr for QualifiedName {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNameError(s.to_string());
        if let Some(inner) = s.strip_prefix('(') {
            let (head, name) = inner.rsplit_once(").").ok_or_else(err)?;
            let (package, owner) = split_package(head).ok_or_else(err)?;
            if name.is_empty() {
                return Err(err());
            }
            Ok(Self {
                package,
                owner: Some(owner),
                name: name.to_string(),
            })
        } else {
            let (package, name) = split_package(s).ok_or_else(err)?;
            Ok(Self {
                package,
                owner: None,
                name,
            })
        }
    }
}

/// Splits `"pkg".Member` into its parts.
fn split_package(s: &str) -> Option<(String, String)> {
    let rest = s.strip_prefix('"')?;
    let (package, member) = rest.split_once("\".")?;
    if package.is_empty() || member.is_empty() || member.contains('"') {
        return None;
    }
    Some((package.to_string(), member.to_string()))
}
