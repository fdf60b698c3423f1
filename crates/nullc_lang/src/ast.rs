//! Abstract syntax tree for `null` programs.
//!
//! A single polymorphic [`Node`] type is tagged by [`NodeKind`]; every node
//! carries a [`Span`] and a resolved-type slot the Analyzer fills in after
//! parsing. Nodes are arena-allocated (see [`nullc_base::Arena`]) and
//! referenced by `&'a Node<'a>` — the **program** node transitively owns
//! every other node in the forest, and the whole thing is freed exactly once
//! when the arena backing it is dropped.
//!
//! Everything downstream (Analyzer, IR builder, evaluator) borrows this tree
//! read-only, except that the Analyzer mutates each node's `ty` cell in
//! place as it resolves types — hence [`Cell`], not a plain field.

use std::cell::Cell;
use std::fmt;

use nullc_base::{Span, Symbol};

/// A resolved (or, for `Named`, not-yet-resolved) type.
///
/// Recursive cases hold arena references (`&'a Type<'a>`) rather than boxing,
/// matching the rest of the tree. `Type` is `Copy`: every case is either a
/// plain tag, a reference, or a slice reference, none of which need a
/// destructor.
///
/// Struct and enum types carry only their declared name — equality is
/// nominal, not structural (spec: "struct and enum equality is by declared
/// name"). The full, ordered field/variant list lives on the corresponding
/// `StructDecl`/`EnumDecl` node, looked up by name where needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type<'a> {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Ptr(&'a Type<'a>),
    Array(&'a Type<'a>, u32),
    Slice(&'a Type<'a>),
    Struct(Symbol),
    Enum(Symbol),
    Function(&'a Type<'a>, &'a [Type<'a>]),
    /// A bare identifier type reference as written by the parser, before the
    /// Analyzer has looked it up to tell a struct name from an enum name.
    /// Never reaches the IR builder or evaluator — the Analyzer replaces it
    /// with `Struct`/`Enum`, or with `Unknown` plus an error if the name
    /// doesn't resolve.
    Named(Symbol),
    /// Sentinel used only during error recovery; never participates in a
    /// successful type check.
    Unknown,
}

impl<'a> Type<'a> {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
        )
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }
}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Ptr(inner) => write!(f, "ptr<{inner}>"),
            Type::Array(elem, n) => write!(f, "[{elem}; {n}]"),
            Type::Slice(elem) => write!(f, "[{elem}]"),
            Type::Struct(_) | Type::Enum(_) | Type::Named(_) => write!(f, "<named>"),
            Type::Function(ret, params) => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Unknown => write!(f, "unknown"),
        }
    }
}

/// `let` (immutable), `mut` (mutable), or `const` (compile-time, immutable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Let,
    Mut,
    Const,
}

impl Mutability {
    pub fn is_mutable(self) -> bool {
        matches!(self, Mutability::Mut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// `true` for operators requiring two boolean operands (`and`/`or`).
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }

    pub fn is_bitwise_or_shift(self) -> bool {
        matches!(
            self,
            BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd | BinaryOp::Shl | BinaryOp::Shr
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    AddrOf,
    Deref,
}

/// The tag of a [`Node`], one variant per syntactic form the parser builds.
pub enum NodeKind<'a> {
    Program(&'a [&'a Node<'a>]),

    FnDecl {
        name: Symbol,
        params: &'a [&'a Node<'a>],
        return_type: Type<'a>,
        /// `None` for an `@extern` declaration, which has no body.
        body: Option<&'a Node<'a>>,
        is_extern: bool,
    },
    StructDecl {
        name: Symbol,
        fields: &'a [(Symbol, Type<'a>)],
    },
    EnumDecl {
        name: Symbol,
        variants: &'a [(Symbol, i64)],
    },
    VarDecl {
        name: Symbol,
        mutability: Mutability,
        type_annotation: Option<Type<'a>>,
        init: &'a Node<'a>,
    },
    Param {
        name: Symbol,
        type_annotation: Type<'a>,
    },

    Block(&'a [&'a Node<'a>]),
    Return(Option<&'a Node<'a>>),
    Break,
    Continue,
    If {
        cond: &'a Node<'a>,
        then_block: &'a Node<'a>,
        /// Either a `Block` node (`else`) or a nested `If` node (`elif`
        /// cascade), or `None`.
        else_branch: Option<&'a Node<'a>>,
    },
    While {
        cond: &'a Node<'a>,
        body: &'a Node<'a>,
    },
    For {
        var: Symbol,
        start: &'a Node<'a>,
        end: &'a Node<'a>,
        body: &'a Node<'a>,
    },
    ExprStmt(&'a Node<'a>),

    Assign {
        target: &'a Node<'a>,
        value: &'a Node<'a>,
    },
    Binary {
        op: BinaryOp,
        lhs: &'a Node<'a>,
        rhs: &'a Node<'a>,
    },
    Unary {
        op: UnaryOp,
        operand: &'a Node<'a>,
    },
    /// `expr as Type` — an explicit numeric cast. No binary operator's
    /// precedence accommodates it, so it parses as a postfix suffix,
    /// tighter than any binary operator. Lowered the same way as the IR
    /// builder's implicit return-coercion casts: integer↔integer via
    /// sign-extend/truncate, integer→float via signed-to-fp, float↔float via
    /// fp-cast.
    Cast {
        expr: &'a Node<'a>,
        target: Type<'a>,
    },
    Call {
        callee: &'a Node<'a>,
        args: &'a [&'a Node<'a>],
    },
    Member {
        base: &'a Node<'a>,
        field: Symbol,
    },
    Index {
        base: &'a Node<'a>,
        index: &'a Node<'a>,
    },

    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(&'a str),
    BoolLiteral(bool),
    Identifier(Symbol),

    StructInit {
        name: Symbol,
        fields: &'a [(Symbol, &'a Node<'a>)],
    },
    ArrayInit(&'a [&'a Node<'a>]),
    EnumVariant {
        enum_name: Symbol,
        variant_name: Symbol,
    },

    Use(&'a str),
    Extern(&'a [&'a Node<'a>]),
}

/// A single AST node: a tag, a source span, and a type slot the Analyzer
/// fills in.
///
/// `ty` starts `None` for every node the parser produces; literal and
/// identifier nodes get it filled during analysis just like everything else
/// — the parser never guesses at types.
pub struct Node<'a> {
    pub kind: NodeKind<'a>,
    pub span: Span,
    ty: Cell<Option<Type<'a>>>,
}

impl<'a> Node<'a> {
    pub fn new(kind: NodeKind<'a>, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: Cell::new(None),
        }
    }

    pub fn ty(&self) -> Option<Type<'a>> {
        self.ty.get()
    }

    pub fn set_ty(&self, ty: Type<'a>) {
        self.ty.set(Some(ty));
    }

    /// `true` for node kinds `assign.target` is allowed to be.
    pub fn is_valid_assign_target(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Identifier(_) | NodeKind::Member { .. } | NodeKind::Index { .. }
        )
    }
}

/// Immutable pre-order traversal over a subtree.
///
/// The Analyzer, IR builder, and evaluator each need to walk the same tree
/// shape; factoring the walk once here means a change to the node shape
/// can't silently desync three independently-hand-rolled walks — the IR
/// builder and evaluator must agree on every program they both run.
pub trait Visitor<'a> {
    fn visit_node(&mut self, node: &'a Node<'a>) {
        walk(self, node);
    }
}

pub fn walk<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, node: &'a Node<'a>) {
    match &node.kind {
        NodeKind::Program(decls) => {
            for d in decls.iter() {
                visitor.visit_node(d);
            }
        }
        NodeKind::FnDecl { params, body, .. } => {
            for p in params.iter() {
                visitor.visit_node(p);
            }
            if let Some(b) = body {
                visitor.visit_node(b);
            }
        }
        NodeKind::StructDecl { .. } | NodeKind::EnumDecl { .. } | NodeKind::Param { .. } => {}
        NodeKind::VarDecl { init, .. } => visitor.visit_node(init),
        NodeKind::Block(stmts) => {
            for s in stmts.iter() {
                visitor.visit_node(s);
            }
        }
        NodeKind::Return(value) => {
            if let Some(v) = value {
                visitor.visit_node(v);
            }
        }
        NodeKind::Break | NodeKind::Continue => {}
        NodeKind::If {
            cond,
            then_block,
            else_branch,
        } => {
            visitor.visit_node(cond);
            visitor.visit_node(then_block);
            if let Some(e) = else_branch {
                visitor.visit_node(e);
            }
        }
        NodeKind::While { cond, body } => {
            visitor.visit_node(cond);
            visitor.visit_node(body);
        }
        NodeKind::For {
            start, end, body, ..
        } => {
            visitor.visit_node(start);
            visitor.visit_node(end);
            visitor.visit_node(body);
        }
        NodeKind::ExprStmt(expr) => visitor.visit_node(expr),
        NodeKind::Assign { target, value } => {
            visitor.visit_node(target);
            visitor.visit_node(value);
        }
        NodeKind::Binary { lhs, rhs, .. } => {
            visitor.visit_node(lhs);
            visitor.visit_node(rhs);
        }
        NodeKind::Unary { operand, .. } => visitor.visit_node(operand),
        NodeKind::Cast { expr, .. } => visitor.visit_node(expr),
        NodeKind::Call { callee, args } => {
            visitor.visit_node(callee);
            for a in args.iter() {
                visitor.visit_node(a);
            }
        }
        NodeKind::Member { base, .. } => visitor.visit_node(base),
        NodeKind::Index { base, index } => {
            visitor.visit_node(base);
            visitor.visit_node(index);
        }
        NodeKind::IntLiteral(_)
        | NodeKind::FloatLiteral(_)
        | NodeKind::StringLiteral(_)
        | NodeKind::BoolLiteral(_)
        | NodeKind::Identifier(_)
        | NodeKind::EnumVariant { .. }
        | NodeKind::Use(_) => {}
        NodeKind::StructInit { fields, .. } => {
            for (_, v) in fields.iter() {
                visitor.visit_node(v);
            }
        }
        NodeKind::ArrayInit(elements) => {
            for e in elements.iter() {
                visitor.visit_node(e);
            }
        }
        NodeKind::Extern(decls) => {
            for d in decls.iter() {
                visitor.visit_node(d);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_base::{Arena, Interner};

    #[test]
    fn type_display_formats_compound_types() {
        let inner = Type::I32;
        let ptr = Type::Ptr(&inner);
        assert_eq!(ptr.to_string(), "ptr<i32>");
        let arr = Type::Array(&inner, 4);
        assert_eq!(arr.to_string(), "[i32; 4]");
    }

    #[test]
    fn struct_and_enum_types_are_nominally_equal() {
        let mut interner = Interner::new();
        let a = interner.intern("Point");
        let b = interner.intern("Point");
        assert_eq!(Type::Struct(a), Type::Struct(b));
        assert_ne!(Type::Struct(a), Type::Enum(a));
    }

    #[test]
    fn node_ty_starts_none_and_is_settable() {
        let node = Node::new(NodeKind::IntLiteral(42), Span::new(0, 2));
        assert_eq!(node.ty(), None);
        node.set_ty(Type::I64);
        assert_eq!(node.ty(), Some(Type::I64));
    }

    #[test]
    fn assign_target_validity() {
        let ident = Node::new(NodeKind::Identifier(Symbol::EMPTY), Span::default());
        assert!(ident.is_valid_assign_target());
        let lit = Node::new(NodeKind::IntLiteral(1), Span::default());
        assert!(!lit.is_valid_assign_target());
    }

    #[test]
    fn walk_visits_block_statements_in_order() {
        let arena: Arena<Node> = Arena::new();
        let a = arena.alloc(Node::new(NodeKind::IntLiteral(1), Span::default()));
        let b = arena.alloc(Node::new(NodeKind::IntLiteral(2), Span::default()));
        let stmts: &[&Node] = arena.alloc_slice(&[
            &*arena.alloc(Node::new(NodeKind::ExprStmt(a), Span::default())),
            &*arena.alloc(Node::new(NodeKind::ExprStmt(b), Span::default())),
        ]);
        let block = Node::new(NodeKind::Block(stmts), Span::default());

        struct Collector(Vec<i64>);
        impl<'a> Visitor<'a> for Collector {
            fn visit_node(&mut self, node: &'a Node<'a>) {
                if let NodeKind::IntLiteral(v) = node.kind {
                    self.0.push(v);
                }
                walk(self, node);
            }
        }

        let mut collector = Collector(Vec::new());
        collector.visit_node(&block);
        assert_eq!(collector.0, vec![1, 2]);
    }
}
