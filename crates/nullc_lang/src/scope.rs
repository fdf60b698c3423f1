//! Symbols and scopes for name resolution.
//!
//! A [`Symbol`] (here [`SymbolEntry`] to avoid clashing with
//! [`nullc_base::Symbol`], the interned-string handle) records a declared
//! name's kind, resolved type, and mutability. A [`Scope`] maps names to
//! symbol entries and links to its parent.
//!
//! # Bulk-free discipline
//!
//! Spec: "the analyzer never destroys a scope while analysis is in progress
//! — all scopes created during a single analyzer run are released together
//! at the end." [`ScopeArena`] expresses this directly: scopes live in a
//! `Vec` owned by the arena, `push`/`pop` only move a cursor (the `active`
//! stack of indices), and nothing is ever removed from the `Vec` until the
//! whole arena drops. A [`ScopeId`] handed out while a scope is active stays
//! valid for the arena's lifetime even after that scope is popped — this is
//! what lets an AST node's resolved symbol continue to point at the scope
//! that declared it after the analyzer has moved on to sibling subtrees.

use std::collections::HashMap;

use nullc_base::Symbol as Name;

use crate::ast::Type;

/// What kind of thing a name was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Var,
    Param,
    Function,
    Struct,
    Enum,
}

/// A resolved declaration: name, kind, type, mutability, and whether it is
/// backed by the host ABI (`@extern`).
#[derive(Debug, Clone, Copy)]
pub struct SymbolEntry<'a> {
    pub name: Name,
    pub kind: SymbolKind,
    pub ty: Type<'a>,
    pub mutable: bool,
    pub is_extern: bool,
}

impl<'a> SymbolEntry<'a> {
    pub fn new(name: Name, kind: SymbolKind, ty: Type<'a>, mutable: bool) -> Self {
        Self {
            name,
            kind,
            ty,
            mutable,
            is_extern: false,
        }
    }

    pub fn extern_fn(name: Name, ty: Type<'a>) -> Self {
        Self {
            name,
            kind: SymbolKind::Function,
            ty,
            mutable: false,
            is_extern: true,
        }
    }
}

/// Opaque handle to a scope stored in a [`ScopeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A single lexical scope: a name-to-symbol map plus a parent link.
///
/// The parent link is a [`ScopeId`] rather than a borrow, so `Scope` does
/// not need a lifetime of its own beyond the `'a` on the `Type`s its symbols
/// carry — convenient since the arena holding scopes and the arena holding
/// AST nodes are different allocators.
pub struct Scope<'a> {
    parent: Option<ScopeId>,
    names: HashMap<Name, SymbolEntry<'a>>,
}

impl<'a> Scope<'a> {
    fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            names: HashMap::new(),
        }
    }
}

/// Owns every [`Scope`] created during a single analyzer run.
///
/// Scopes are pushed at function entry, block entry, and `for`-loop entry,
/// and popped at the corresponding exit, but popping
/// only moves the `active` cursor — the `Scope` itself stays in `scopes`
/// until the whole `ScopeArena` drops, so a [`ScopeId`] captured before a pop
/// keeps resolving correctly afterward.
#[derive(Default)]
pub struct ScopeArena<'a> {
    scopes: Vec<Scope<'a>>,
    active: Vec<ScopeId>,
}

impl<'a> ScopeArena<'a> {
    pub fn new() -> Self {
        let mut arena = Self {
            scopes: Vec::new(),
            active: Vec::new(),
        };
        arena.push();
        arena
    }

    /// The globally-active scope (function/struct/enum names at top level).
    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// The innermost currently-active scope.
    pub fn current(&self) -> ScopeId {
        *self.active.last().expect("ScopeArena always has a global scope active")
    }

    /// Pushes a new scope whose parent is the current one, making it current.
    pub fn push(&mut self) -> ScopeId {
        let parent = self.active.last().copied();
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(parent));
        self.active.push(id);
        id
    }

    /// Pops the current scope. The `Scope` itself is *not* freed — see
    /// module docs — only the cursor moves back to the parent.
    pub fn pop(&mut self) {
        assert!(self.active.len() > 1, "cannot pop the global scope");
        self.active.pop();
    }

    /// Declares `name` in the given scope.
    ///
    /// Returns `false` (and does not overwrite the existing entry) if `name`
    /// is already declared directly in `scope` — shadowing an outer scope is
    /// fine, redeclaring within the same one is the caller's "duplicate
    /// declaration" error.
    pub fn declare(&mut self, scope: ScopeId, entry: SymbolEntry<'a>) -> bool {
        let s = &mut self.scopes[scope.0];
        if s.names.contains_key(&entry.name) {
            return false;
        }
        s.names.insert(entry.name, entry);
        true
    }

    /// Looks up `name` starting at `scope` and walking parent links outward.
    pub fn resolve(&self, scope: ScopeId, name: Name) -> Option<SymbolEntry<'a>> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let s = &self.scopes[id.0];
            if let Some(entry) = s.names.get(&name) {
                return Some(*entry);
            }
            cursor = s.parent;
        }
        None
    }

    /// `true` if `name` is declared directly in `scope` (not an ancestor) —
    /// used for the "duplicate declaration in the same scope" check before
    /// `declare` would otherwise silently refuse to overwrite.
    pub fn declared_locally(&self, scope: ScopeId, name: Name) -> bool {
        self.scopes[scope.0].names.contains_key(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_base::Interner;

    fn name(interner: &mut Interner, s: &str) -> Name {
        interner.intern(s)
    }

    #[test]
    fn resolve_finds_name_in_current_scope() {
        let mut interner = Interner::new();
        let x = name(&mut interner, "x");
        let mut arena: ScopeArena = ScopeArena::new();
        arena.declare(arena.global(), SymbolEntry::new(x, SymbolKind::Var, Type::I64, false));
        assert!(arena.resolve(arena.global(), x).is_some());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut interner = Interner::new();
        let x = name(&mut interner, "x");
        let mut arena: ScopeArena = ScopeArena::new();
        arena.declare(arena.global(), SymbolEntry::new(x, SymbolKind::Var, Type::I64, false));
        let inner = arena.push();
        arena.declare(inner, SymbolEntry::new(x, SymbolKind::Var, Type::Bool, true));

        let resolved = arena.resolve(inner, x).unwrap();
        assert_eq!(resolved.ty, Type::Bool);
        assert!(resolved.mutable);
    }

    #[test]
    fn popped_scope_restores_outer_binding() {
        let mut interner = Interner::new();
        let x = name(&mut interner, "x");
        let mut arena: ScopeArena = ScopeArena::new();
        arena.declare(arena.global(), SymbolEntry::new(x, SymbolKind::Var, Type::I64, false));
        let inner = arena.push();
        arena.declare(inner, SymbolEntry::new(x, SymbolKind::Var, Type::Bool, true));
        arena.pop();

        let resolved = arena.resolve(arena.current(), x).unwrap();
        assert_eq!(resolved.ty, Type::I64);
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_rejected() {
        let mut interner = Interner::new();
        let x = name(&mut interner, "x");
        let mut arena: ScopeArena = ScopeArena::new();
        assert!(arena.declare(arena.global(), SymbolEntry::new(x, SymbolKind::Var, Type::I64, false)));
        assert!(!arena.declare(arena.global(), SymbolEntry::new(x, SymbolKind::Var, Type::Bool, false)));
    }

    #[test]
    fn scope_id_captured_before_pop_still_resolves_after() {
        // A ScopeId handed out while a scope was active must keep resolving
        // even after the analyzer has popped back to an ancestor scope —
        // this is the whole point of never freeing on pop.
        let mut interner = Interner::new();
        let y = name(&mut interner, "y");
        let mut arena: ScopeArena = ScopeArena::new();
        let inner = arena.push();
        arena.declare(inner, SymbolEntry::new(y, SymbolKind::Var, Type::F64, false));
        arena.pop();

        assert!(arena.resolve(inner, y).is_some());
    }

    #[test]
    fn resolve_missing_name_returns_none() {
        let mut interner = Interner::new();
        let z = name(&mut interner, "z");
        let arena: ScopeArena = ScopeArena::new();
        assert!(arena.resolve(arena.global(), z).is_none());
    }

    #[test]
    fn declared_locally_ignores_ancestor_scopes() {
        let mut interner = Interner::new();
        let x = name(&mut interner, "x");
        let mut arena: ScopeArena = ScopeArena::new();
        arena.declare(arena.global(), SymbolEntry::new(x, SymbolKind::Var, Type::I64, false));
        let inner = arena.push();
        assert!(!arena.declared_locally(inner, x));
        assert!(arena.declared_locally(arena.global(), x));
    }
}
