//! Bundled typed arenas for AST allocation during parsing.
//!
//! [`Node`](crate::ast::Node) is a single polymorphic type, but its children
//! are stored in several different shapes (a node itself, a slice of child
//! references, a `(Symbol, Type)` field pair, …), and [`nullc_base::Arena<T>`]
//! is homogeneous in `T`. [`AstArena`] bundles one typed arena per shape the
//! parser needs, mirroring the teacher's own `AstContext` — a single value
//! threaded through the whole parse, rather than five separate arena
//! parameters on every constructor function.

use nullc_base::{Arena, Symbol};

use crate::ast::{Node, Type};

/// One arena per distinct shape of AST storage the parser allocates.
///
/// All fields share the same lifetime `'a`: the program node transitively
/// owns everything reachable from it, and the whole forest drops together
/// when the last `AstArena` borrow goes out of scope.
///
/// `Clone`/`Copy`: every field is a shared reference, so handing the same
/// view to both the parser and the analyzer is just copying seven pointers,
/// not aliasing anything mutable.
#[derive(Clone, Copy)]
pub struct AstArena<'a> {
    nodes: &'a Arena<Node<'a>>,
    node_lists: &'a Arena<&'a Node<'a>>,
    struct_fields: &'a Arena<(Symbol, Type<'a>)>,
    enum_variants: &'a Arena<(Symbol, i64)>,
    types: &'a Arena<Type<'a>>,
    init_fields: &'a Arena<(Symbol, &'a Node<'a>)>,
    bytes: &'a Arena<u8>,
}

impl<'a> AstArena<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nodes: &'a Arena<Node<'a>>,
        node_lists: &'a Arena<&'a Node<'a>>,
        struct_fields: &'a Arena<(Symbol, Type<'a>)>,
        enum_variants: &'a Arena<(Symbol, i64)>,
        types: &'a Arena<Type<'a>>,
        init_fields: &'a Arena<(Symbol, &'a Node<'a>)>,
        bytes: &'a Arena<u8>,
    ) -> Self {
        Self {
            nodes,
            node_lists,
            struct_fields,
            enum_variants,
            types,
            init_fields,
            bytes,
        }
    }

    pub fn alloc_node(&self, node: Node<'a>) -> &'a Node<'a> {
        self.nodes.alloc(node)
    }

    pub fn alloc_nodes<I>(&self, nodes: I) -> &'a [&'a Node<'a>]
    where
        I: IntoIterator<Item = &'a Node<'a>>,
        I::IntoIter: ExactSizeIterator,
    {
        self.node_lists.alloc_slice(nodes)
    }

    pub fn alloc_fields<I>(&self, fields: I) -> &'a [(Symbol, Type<'a>)]
    where
        I: IntoIterator<Item = (Symbol, Type<'a>)>,
        I::IntoIter: ExactSizeIterator,
    {
        self.struct_fields.alloc_slice(fields)
    }

    pub fn alloc_variants<I>(&self, variants: I) -> &'a [(Symbol, i64)]
    where
        I: IntoIterator<Item = (Symbol, i64)>,
        I::IntoIter: ExactSizeIterator,
    {
        self.enum_variants.alloc_slice(variants)
    }

    pub fn alloc_type(&self, ty: Type<'a>) -> &'a Type<'a> {
        self.types.alloc(ty)
    }

    pub fn alloc_types<I>(&self, types: I) -> &'a [Type<'a>]
    where
        I: IntoIterator<Item = Type<'a>>,
        I::IntoIter: ExactSizeIterator,
    {
        self.types.alloc_slice(types)
    }

    pub fn alloc_init_fields<I>(&self, fields: I) -> &'a [(Symbol, &'a Node<'a>)]
    where
        I: IntoIterator<Item = (Symbol, &'a Node<'a>)>,
        I::IntoIter: ExactSizeIterator,
    {
        self.init_fields.alloc_slice(fields)
    }

    /// Copies `s` into the arena, returning a `&'a str` with the arena's
    /// lifetime. Used for string-literal payloads, which otherwise would
    /// borrow from the (shorter-lived) preprocessed source buffer.
    pub fn alloc_str(&self, s: &str) -> &'a str {
        let bytes = self.bytes.alloc_slice(s.bytes());
        // Safe: `bytes` was copied byte-for-byte out of a valid `&str`.
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }
}

/// Owns the backing [`Arena`]s for one [`AstArena`].
///
/// Kept separate from `AstArena` itself so callers can construct the storage
/// first, then build the `AstArena` view that borrows from it — the same
/// two-step arena/context split the teacher uses.
#[derive(Default)]
pub struct AstStorage<'a> {
    pub nodes: Arena<Node<'a>>,
    pub node_lists: Arena<&'a Node<'a>>,
    pub struct_fields: Arena<(Symbol, Type<'a>)>,
    pub enum_variants: Arena<(Symbol, i64)>,
    pub types: Arena<Type<'a>>,
    pub init_fields: Arena<(Symbol, &'a Node<'a>)>,
    pub bytes: Arena<u8>,
}

impl<'a> AstStorage<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&'a self) -> AstArena<'a> {
        AstArena::new(
            &self.nodes,
            &self.node_lists,
            &self.struct_fields,
            &self.enum_variants,
            &self.types,
            &self.init_fields,
            &self.bytes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_base::{Interner, Span};
    use crate::ast::NodeKind;

    #[test]
    fn alloc_str_round_trips() {
        let storage: AstStorage = AstStorage::new();
        let ctx = storage.context();
        let s = ctx.alloc_str("hello");
        assert_eq!(s, "hello");
    }

    #[test]
    fn alloc_node_and_nodes_compose() {
        let storage: AstStorage = AstStorage::new();
        let ctx = storage.context();
        let a = ctx.alloc_node(Node::new(NodeKind::IntLiteral(1), Span::default()));
        let b = ctx.alloc_node(Node::new(NodeKind::IntLiteral(2), Span::default()));
        let list = ctx.alloc_nodes([a, b]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn alloc_fields_for_struct_decl() {
        let storage: AstStorage = AstStorage::new();
        let ctx = storage.context();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let fields = ctx.alloc_fields([(x, Type::I64)]);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].1, Type::I64);
    }
}
