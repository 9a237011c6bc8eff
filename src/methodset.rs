//! Member lookup and method sets.
//!
//! Follows the language's selector rules rather than matching names
//! syntactically: members are found breadth-first through embedded fields,
//! a name found at a shallower depth hides deeper ones, and a name found
//! twice at the same depth is ambiguous and selects nothing. Methods with a
//! pointer receiver belong to a type's method set only when reached through
//! a pointer, either the root reference or a pointer-embedded field.

use crate::model::{DeclId, DeclKind, Program, Shape, TypeRef};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// A member reachable by selector from some type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub decl: DeclId,
    /// Embedding depth: 0 for members declared on the type itself.
    pub depth: usize,
    /// Whether this is a method callable on the root type reference, and
    /// hence part of its method set.
    pub in_method_set: bool,
}

/// Every unambiguous field and method selectable from a type, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberTable {
    members: BTreeMap<String, Selection>,
    /// Names hidden because two members collide at the same depth.
    ambiguous: Vec<String>,
}

impl MemberTable {
    pub fn get(&self, name: &str) -> Option<&Selection> {
        self.members.get(name)
    }

    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.iter().any(|n| n == name)
    }

    /// Whether `name` is selectable at all (unambiguous or not).
    pub fn has_name(&self, name: &str) -> bool {
        self.members.contains_key(name) || self.is_ambiguous(name)
    }

    /// The method set: methods callable on the root type reference.
    pub fn methods(&self) -> impl Iterator<Item = (&str, DeclId)> {
        self.members
            .iter()
            .filter(|(_, s)| s.in_method_set)
            .map(|(n, s)| (n.as_str(), s.decl))
    }

    /// The method named `name`, if it's in the method set.
    pub fn method(&self, name: &str) -> Option<DeclId> {
        self.members
            .get(name)
            .filter(|s| s.in_method_set)
            .map(|s| s.decl)
    }
}

struct Level {
    ty: DeclId,
    /// Reached through a pointer somewhere along the embedding path.
    addressable: bool,
    /// Reached along more than one embedding path at this depth.
    multiple: bool,
}

/// Computes the member table of `root`.
pub fn member_table(program: &Program, root: TypeRef) -> MemberTable {
    let root_decl = program.decl(root.decl);
    if root_decl.is_interface() {
        // A pointer to an interface has no methods.
        if root.pointer {
            return MemberTable::default();
        }
        let members = interface_methods(program, root.decl)
            .into_iter()
            .map(|m| {
                let sel = Selection {
                    decl: m,
                    depth: 0,
                    in_method_set: true,
                };
                (program.decl(m).name.clone(), sel)
            })
            .collect();
        return MemberTable {
            members,
            ambiguous: Vec::new(),
        };
    }

    let mut table = MemberTable::default();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut seen_types: HashSet<DeclId> = HashSet::new();
    let mut level = vec![Level {
        ty: root.decl,
        addressable: root.pointer,
        multiple: false,
    }];
    let mut depth = 0;

    while !level.is_empty() {
        let mut found: BTreeMap<String, Vec<Selection>> = BTreeMap::new();
        let mut next = Vec::new();
        // Names reached through a type embedded more than once at this depth.
        let mut duplicated: HashSet<String> = HashSet::new();

        // The same type reached twice at one depth is looked at once, and
        // everything found in it collides with itself.
        let mut copies: HashMap<DeclId, usize> = HashMap::new();
        for entry in level.iter().filter(|e| !seen_types.contains(&e.ty)) {
            *copies.entry(entry.ty).or_default() += if entry.multiple { 2 } else { 1 };
        }

        for entry in &level {
            if !seen_types.insert(entry.ty) {
                continue;
            }
            let multiple = copies.get(&entry.ty).is_some_and(|&n| n > 1);
            let addressable = level.iter().any(|e| e.ty == entry.ty && e.addressable);
            let decl = program.decl(entry.ty);
            if decl.is_interface() {
                // Embedded interface: all of its methods are promoted.
                for m in interface_methods(program, entry.ty) {
                    let name = program.decl(m).name.clone();
                    if multiple {
                        duplicated.insert(name.clone());
                    }
                    found.entry(name).or_default().push(Selection {
                        decl: m,
                        depth,
                        in_method_set: true,
                    });
                }
                continue;
            }
            for &member in program.members(entry.ty) {
                let m = program.decl(member);
                let in_method_set = match m.kind {
                    DeclKind::Method => addressable || !m.pointer_receiver,
                    _ => false,
                };
                if multiple {
                    duplicated.insert(m.name.clone());
                }
                found.entry(m.name.clone()).or_default().push(Selection {
                    decl: member,
                    depth,
                    in_method_set,
                });
                if let (DeclKind::Field, Some(embedded)) = (m.kind, m.embedded) {
                    next.push(Level {
                        ty: embedded.decl,
                        addressable: addressable || embedded.pointer,
                        multiple,
                    });
                }
            }
        }

        for (name, hits) in found {
            if !seen_names.insert(name.clone()) {
                continue;
            }
            match hits.as_slice() {
                [only] if !duplicated.contains(&name) => {
                    table.members.insert(name, *only);
                }
                _ => table.ambiguous.push(name),
            }
        }

        level = next;
        depth += 1;
    }

    table
}

/// Methods of an interface, including those of embedded interfaces, one per
/// name.
pub fn interface_methods(program: &Program, iface: DeclId) -> Vec<DeclId> {
    let mut methods = Vec::new();
    let mut names = HashSet::new();
    let mut visited = HashSet::new();
    collect_interface_methods(program, iface, &mut methods, &mut names, &mut visited);
    methods
}

fn collect_interface_methods(
    program: &Program,
    iface: DeclId,
    methods: &mut Vec<DeclId>,
    names: &mut HashSet<String>,
    visited: &mut HashSet<DeclId>,
) {
    if !visited.insert(iface) {
        return;
    }
    for &member in program.members(iface) {
        let m = program.decl(member);
        if m.kind == DeclKind::Method && names.insert(m.name.clone()) {
            methods.push(member);
        }
    }
    if let Shape::Interface { embeds } = &program.decl(iface).shape {
        for embedded in embeds {
            collect_interface_methods(program, embedded.decl, methods, names, visited);
        }
    }
}

/// Memoizing, thread-safe cache of member tables.
///
/// Candidate checks run in parallel and ask for the same types, so lookups
/// take a read lock and only computing a missing entry takes the write lock.
#[derive(Debug, Default)]
pub struct MethodSetCache {
    tables: RwLock<HashMap<TypeRef, Arc<MemberTable>>>,
}

impl MethodSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, program: &Program, ty: TypeRef) -> Arc<MemberTable> {
        if let Some(table) = self.tables.read().get(&ty) {
            return Arc::clone(table);
        }
        let computed = Arc::new(member_table(program, ty));
        let mut tables = self.tables.write();
        Arc::clone(tables.entry(ty).or_insert(computed))
    }

    /// Reports whether the method set of `concrete` covers every method of
    /// the interface `iface`.
    pub fn implements(&self, program: &Program, concrete: TypeRef, iface: DeclId) -> bool {
        let have = self.table(program, concrete);
        let want = self.table(program, TypeRef::value(iface));
        want.methods().all(|(name, _)| have.method(name).is_some())
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Declaration, PackageId, Position, ProgramBuilder};

    struct Fixture {
        b: ProgramBuilder,
        pkg: PackageId,
        offset: usize,
    }

    impl Fixture {
        fn new() -> Self {
            let mut b = Program::builder();
            let pkg = b.package("p");
            b.file(pkg, "p.go");
            Self { b, pkg, offset: 0 }
        }

        fn pos(&mut self) -> Position {
            self.offset += 10;
            Position::new(crate::model::FileId(0), self.offset)
        }

        fn ty(&mut self, name: &str, shape: Shape) -> DeclId {
            let pos = self.pos();
            self.b.declare(
                Declaration::new(name, DeclKind::Type, self.pkg, pos).with_shape(shape),
            )
        }

        fn method(&mut self, owner: DeclId, name: &str, pointer: bool) -> DeclId {
            let pos = self.pos();
            let mut decl =
                Declaration::new(name, DeclKind::Method, self.pkg, pos).with_owner(owner);
            if pointer {
                decl = decl.with_pointer_receiver();
            }
            self.b.declare(decl)
        }

        fn field(&mut self, owner: DeclId, name: &str) -> DeclId {
            let pos = self.pos();
            self.b
                .declare(Declaration::new(name, DeclKind::Field, self.pkg, pos).with_owner(owner))
        }

        fn embed(&mut self, owner: DeclId, ty: TypeRef, name: &str) -> DeclId {
            let pos = self.pos();
            let field = self.b.decl(
                Declaration::new(name, DeclKind::Field, self.pkg, pos)
                    .with_owner(owner)
                    .embedding(ty),
            );
            self.b.embed_at(field, pos);
            field
        }
    }

    fn names(table: &MemberTable) -> Vec<&str> {
        table.methods().map(|(n, _)| n).collect()
    }

    #[test]
    fn pointer_receiver_methods_need_pointer() {
        let mut f = Fixture::new();
        let a = f.ty("A", Shape::Struct);
        f.method(a, "String", true);
        f.method(a, "Value", false);
        let program = f.b.build().unwrap();

        assert_eq!(names(&member_table(&program, TypeRef::value(a))), vec!["Value"]);
        assert_eq!(
            names(&member_table(&program, TypeRef::ptr(a))),
            vec!["String", "Value"]
        );
    }

    #[test]
    fn promotes_methods_through_embedding() {
        let mut f = Fixture::new();
        let a = f.ty("A", Shape::Struct);
        let count = f.method(a, "Count", true);
        let b = f.ty("B", Shape::Struct);
        f.embed(b, TypeRef::value(a), "A");
        let program = f.b.build().unwrap();

        // B embeds A by value: *A's methods only reach *B.
        assert!(member_table(&program, TypeRef::value(b)).method("Count").is_none());
        let ptr = member_table(&program, TypeRef::ptr(b));
        assert_eq!(ptr.method("Count"), Some(count));
        assert_eq!(ptr.get("Count").unwrap().depth, 1);
    }

    #[test]
    fn pointer_embedding_promotes_to_value() {
        let mut f = Fixture::new();
        let a = f.ty("A", Shape::Struct);
        let count = f.method(a, "Count", true);
        let b = f.ty("B", Shape::Struct);
        f.embed(b, TypeRef::ptr(a), "A");
        let program = f.b.build().unwrap();

        assert_eq!(
            member_table(&program, TypeRef::value(b)).method("Count"),
            Some(count)
        );
    }

    #[test]
    fn shallower_member_hides_promoted_one() {
        let mut f = Fixture::new();
        let a = f.ty("A", Shape::Struct);
        f.method(a, "String", false);
        let b = f.ty("B", Shape::Struct);
        f.embed(b, TypeRef::value(a), "A");
        let own = f.method(b, "String", false);
        let program = f.b.build().unwrap();

        let table = member_table(&program, TypeRef::value(b));
        assert_eq!(table.method("String"), Some(own));
        assert_eq!(table.get("String").unwrap().depth, 0);
    }

    #[test]
    fn collision_at_same_depth_is_ambiguous() {
        let mut f = Fixture::new();
        let a = f.ty("A", Shape::Struct);
        f.method(a, "Close", false);
        let c = f.ty("C", Shape::Struct);
        f.method(c, "Close", false);
        let s = f.ty("S", Shape::Struct);
        f.embed(s, TypeRef::value(a), "A");
        f.embed(s, TypeRef::value(c), "C");
        let program = f.b.build().unwrap();

        let table = member_table(&program, TypeRef::ptr(s));
        assert!(table.method("Close").is_none());
        assert!(table.is_ambiguous("Close"));
        assert!(table.has_name("Close"));
    }

    #[test]
    fn type_embedded_twice_at_same_depth_is_ambiguous() {
        let mut f = Fixture::new();
        let base = f.ty("Base", Shape::Struct);
        f.field(base, "Size");
        f.method(base, "Len", false);
        let left = f.ty("Left", Shape::Struct);
        f.embed(left, TypeRef::value(base), "Base");
        let right = f.ty("Right", Shape::Struct);
        f.embed(right, TypeRef::value(base), "Base");
        let s = f.ty("S", Shape::Struct);
        f.embed(s, TypeRef::value(left), "Left");
        f.embed(s, TypeRef::value(right), "Right");
        let program = f.b.build().unwrap();

        let table = member_table(&program, TypeRef::ptr(s));
        assert!(table.get("Size").is_none());
        assert!(table.is_ambiguous("Size"));
        assert!(table.method("Len").is_none());
        assert!(table.is_ambiguous("Len"));
        assert!(table.get("Left").is_some());
    }

    #[test]
    fn fields_hide_deeper_methods_but_are_not_methods() {
        let mut f = Fixture::new();
        let a = f.ty("A", Shape::Struct);
        f.method(a, "Name", false);
        let s = f.ty("S", Shape::Struct);
        f.embed(s, TypeRef::value(a), "A");
        let field = f.field(s, "Name");
        let program = f.b.build().unwrap();

        let table = member_table(&program, TypeRef::value(s));
        assert_eq!(table.get("Name").unwrap().decl, field);
        assert!(table.method("Name").is_none());
    }

    #[test]
    fn interface_methods_include_embedded_interfaces() {
        let mut f = Fixture::new();
        let reader = f.ty("Reader", Shape::Interface { embeds: vec![] });
        let read = f.method(reader, "Read", false);
        let rc = f.ty(
            "ReadCloser",
            Shape::Interface {
                embeds: vec![TypeRef::value(reader)],
            },
        );
        let close = f.method(rc, "Close", false);
        let program = f.b.build().unwrap();

        let methods = interface_methods(&program, rc);
        assert_eq!(methods, vec![close, read]);
        assert!(member_table(&program, TypeRef::ptr(rc)).methods().next().is_none());
    }

    #[test]
    fn cache_answers_implements() {
        let mut f = Fixture::new();
        let counter = f.ty("Counter", Shape::Interface { embeds: vec![] });
        f.method(counter, "Count", false);
        let a = f.ty("A", Shape::Struct);
        f.method(a, "Count", true);
        let program = f.b.build().unwrap();

        let cache = MethodSetCache::new();
        assert!(cache.implements(&program, TypeRef::ptr(a), counter));
        assert!(!cache.implements(&program, TypeRef::value(a), counter));
        assert_eq!(cache.len(), 3);
        assert!(Arc::ptr_eq(
            &cache.table(&program, TypeRef::ptr(a)),
            &cache.table(&program, TypeRef::ptr(a))
        ));
    }
}
