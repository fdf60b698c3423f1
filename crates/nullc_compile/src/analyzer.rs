//! Two-pass semantic analysis.
//!
//! Pass one walks top-level declarations only (structs, enums, functions —
//! including `@extern` signatures) and populates the global scope and the
//! struct/enum registries, so forward references ("a function calling
//! another function declared later in the file") resolve without a
//! fixed-point loop. Pass two walks every function body against that fully
//! populated global scope.
//!
//! Every node the Analyzer assigns a type to records it on the node itself
//! (`Node::set_ty`) so the IR builder and evaluator never need to re-derive
//! what the Analyzer already decided.

use std::collections::HashMap;
use std::fmt;

use nullc_base::{Span, Symbol};
use nullc_lang::ast::{BinaryOp, Mutability, Node, NodeKind, Type, UnaryOp};
use nullc_lang::arena_ctx::AstArena;
use nullc_lang::scope::{ScopeArena, ScopeId, SymbolEntry, SymbolKind};

/// What went wrong, independent of *where* (see [`AnalysisError::span`]).
#[derive(Debug, Clone)]
pub enum AnalysisErrorKind {
    DuplicateDeclaration(String),
    UndefinedName(String),
    UndefinedType(String),
    UndefinedStruct(String),
    UndefinedEnum(String),
    UnknownField { struct_name: String, field: String },
    UnknownVariant { enum_name: String, variant: String },
    NotAStruct(String),
    TypeMismatch { expected: String, found: String },
    NotCallable,
    WrongArgCount { expected: usize, found: usize },
    AssignToImmutable(String),
    InvalidOperand { op: &'static str, ty: String },
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnTypeMismatch { expected: String, found: String },
    IndexOnNonArray,
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDeclaration(name) => write!(f, "'{name}' is already declared in this scope"),
            Self::UndefinedName(name) => write!(f, "undefined name '{name}'"),
            Self::UndefinedType(name) => write!(f, "undefined type '{name}'"),
            Self::UndefinedStruct(name) => write!(f, "undefined struct '{name}'"),
            Self::UndefinedEnum(name) => write!(f, "undefined enum '{name}'"),
            Self::UnknownField { struct_name, field } => {
                write!(f, "struct '{struct_name}' has no field '{field}'")
            }
            Self::UnknownVariant { enum_name, variant } => {
                write!(f, "enum '{enum_name}' has no variant '{variant}'")
            }
            Self::NotAStruct(name) => write!(f, "'{name}' is not a struct type"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected type '{expected}', found '{found}'")
            }
            Self::NotCallable => write!(f, "expression is not callable"),
            Self::WrongArgCount { expected, found } => {
                write!(f, "expected {expected} argument(s), found {found}")
            }
            Self::AssignToImmutable(name) => write!(f, "cannot assign to immutable variable '{name}'"),
            Self::InvalidOperand { op, ty } => write!(f, "operator '{op}' is not defined for type '{ty}'"),
            Self::BreakOutsideLoop => write!(f, "'break' outside of a loop"),
            Self::ContinueOutsideLoop => write!(f, "'continue' outside of a loop"),
            Self::ReturnTypeMismatch { expected, found } => {
                write!(f, "function returns '{expected}', but this 'ret' produces '{found}'")
            }
            Self::IndexOnNonArray => write!(f, "indexing is only valid on arrays and slices"),
        }
    }
}

/// One analysis diagnostic: a [`AnalysisErrorKind`] plus where it happened.
#[derive(Debug, Clone)]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub span: Span,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.kind, self.span.start, self.span.end)
    }
}

impl std::error::Error for AnalysisError {}

/// Resolved program metadata the IR builder and evaluator consume without
/// re-walking the AST to re-derive it (struct layouts, enum tables).
pub struct AnalyzedProgram<'a> {
    pub structs: HashMap<Symbol, &'a [(Symbol, Type<'a>)]>,
    pub enums: HashMap<Symbol, &'a [(Symbol, i64)]>,
}

pub struct Analyzer<'a, 'i> {
    arena: AstArena<'a>,
    interner: &'i nullc_base::Interner,
    scopes: ScopeArena<'a>,
    structs: HashMap<Symbol, &'a [(Symbol, Type<'a>)]>,
    enums: HashMap<Symbol, &'a [(Symbol, i64)]>,
    errors: Vec<AnalysisError>,
}

impl<'a, 'i> Analyzer<'a, 'i> {
    pub fn new(arena: AstArena<'a>, interner: &'i nullc_base::Interner) -> Self {
        Self {
            arena,
            interner,
            scopes: ScopeArena::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn name(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).to_string()
    }

    fn error(&mut self, span: Span, kind: AnalysisErrorKind) {
        self.errors.push(AnalysisError { kind, span });
    }

    /// Runs both passes over `program` (must be a `Program` node). On success
    /// returns the resolved struct/enum tables; on any error returns every
    /// error collected (the Analyzer does not stop at the first one, per
    /// spec: "continues to collect obvious follow-on errors").
    pub fn analyze(mut self, program: &'a Node<'a>) -> Result<AnalyzedProgram<'a>, Vec<AnalysisError>> {
        let decls = match &program.kind {
            NodeKind::Program(decls) => *decls,
            _ => panic!("analyze() called on a non-Program node"),
        };

        self.declare_globals(decls);
        let global = self.scopes.global();
        for decl in decls {
            self.analyze_fn_body(decl, global);
        }

        if self.errors.is_empty() {
            Ok(AnalyzedProgram {
                structs: self.structs,
                enums: self.enums,
            })
        } else {
            Err(self.errors)
        }
    }

    // ---- pass 1: global declarations -----------------------------------

    fn declare_globals(&mut self, decls: &'a [&'a Node<'a>]) {
        for decl in decls {
            match &decl.kind {
                NodeKind::StructDecl { name, fields } => {
                    if self.structs.contains_key(name) || self.enums.contains_key(name) {
                        self.error(decl.span, AnalysisErrorKind::DuplicateDeclaration(self.name(*name)));
                    } else {
                        self.structs.insert(*name, fields);
                    }
                }
                NodeKind::EnumDecl { name, variants } => {
                    if self.structs.contains_key(name) || self.enums.contains_key(name) {
                        self.error(decl.span, AnalysisErrorKind::DuplicateDeclaration(self.name(*name)));
                    } else {
                        self.enums.insert(*name, variants);
                    }
                }
                NodeKind::FnDecl { .. } => self.declare_fn(decl),
                NodeKind::Extern(decls) => {
                    for fn_decl in decls.iter() {
                        self.declare_fn(fn_decl);
                    }
                }
                _ => {}
            }
        }
    }

    fn declare_fn(&mut self, decl: &'a Node<'a>) {
        let NodeKind::FnDecl {
            name,
            params,
            return_type,
            is_extern,
            ..
        } = &decl.kind
        else {
            return;
        };
        let param_types: Vec<Type<'a>> = params
            .iter()
            .map(|p| match &p.kind {
                NodeKind::Param { type_annotation, .. } => self.resolve_type(*type_annotation, p.span),
                _ => Type::Unknown,
            })
            .collect();
        let return_type = self.resolve_type(*return_type, decl.span);
        let param_slice = self.arena.alloc_types(param_types);
        let fn_ty = Type::Function(self.arena.alloc_type(return_type), param_slice);
        let global = self.scopes.global();
        let entry = if *is_extern {
            SymbolEntry::extern_fn(*name, fn_ty)
        } else {
            SymbolEntry::new(*name, SymbolKind::Function, fn_ty, false)
        };
        if !self.scopes.declare(global, entry) {
            self.error(decl.span, AnalysisErrorKind::DuplicateDeclaration(self.name(*name)));
        }
    }

    /// Replaces a parser-produced `Type::Named` with `Struct`/`Enum`, or
    /// records an error and returns `Unknown` if the name resolves to
    /// neither, so later type checks against the poisoned type are
    /// suppressed instead of cascading into a second, misleading error.
    fn resolve_type(&mut self, ty: Type<'a>, span: Span) -> Type<'a> {
        match ty {
            Type::Named(sym) => {
                if self.structs.contains_key(&sym) {
                    Type::Struct(sym)
                } else if self.enums.contains_key(&sym) {
                    Type::Enum(sym)
                } else {
                    self.error(span, AnalysisErrorKind::UndefinedType(self.name(sym)));
                    Type::Unknown
                }
            }
            Type::Ptr(inner) => {
                let resolved = self.resolve_type(*inner, span);
                Type::Ptr(self.arena.alloc_type(resolved))
            }
            Type::Array(inner, n) => {
                let resolved = self.resolve_type(*inner, span);
                Type::Array(self.arena.alloc_type(resolved), n)
            }
            Type::Slice(inner) => {
                let resolved = self.resolve_type(*inner, span);
                Type::Slice(self.arena.alloc_type(resolved))
            }
            other => other,
        }
    }

    // ---- pass 2: function bodies -----------------------------------------

    fn analyze_fn_body(&mut self, decl: &'a Node<'a>, global: ScopeId) {
        let NodeKind::FnDecl {
            params,
            return_type,
            body,
            ..
        } = &decl.kind
        else {
            return;
        };
        let Some(body) = body else { return };
        let return_type = self.resolve_type(*return_type, decl.span);
        debug_assert_eq!(self.scopes.current(), global, "analyzer scope stack must be balanced between top-level declarations");

        let scope = self.scopes.push();
        for p in params.iter() {
            if let NodeKind::Param { name, type_annotation } = &p.kind {
                let ty = self.resolve_type(*type_annotation, p.span);
                p.set_ty(ty);
                if !self
                    .scopes
                    .declare(scope, SymbolEntry::new(*name, SymbolKind::Param, ty, false))
                {
                    self.error(p.span, AnalysisErrorKind::DuplicateDeclaration(self.name(*name)));
                }
            }
        }
        self.analyze_block(body, scope, return_type, false);
        self.scopes.pop();
    }

    /// Pushes a child scope nested under `parent` (which must be the
    /// currently active scope — the analyzer walks the tree single-
    /// threaded, so the active cursor always matches the caller's notion of
    /// "current scope"), analyzes `block`'s statements, then pops back.
    fn analyze_block(&mut self, block: &'a Node<'a>, parent: ScopeId, return_type: Type<'a>, in_loop: bool) {
        let NodeKind::Block(stmts) = &block.kind else {
            return;
        };
        debug_assert_eq!(self.scopes.current(), parent);
        let scope = self.scopes.push();
        for stmt in stmts.iter() {
            self.analyze_stmt(stmt, scope, return_type, in_loop);
        }
        self.scopes.pop();
    }

    fn analyze_stmt(&mut self, node: &'a Node<'a>, scope: ScopeId, return_type: Type<'a>, in_loop: bool) {
        match &node.kind {
            NodeKind::VarDecl {
                name,
                mutability,
                type_annotation,
                init,
            } => {
                let init_ty = self.analyze_expr(init, scope);
                let declared = match type_annotation {
                    Some(ty) => {
                        let resolved = self.resolve_type(*ty, node.span);
                        if !resolved.is_unknown() && !init_ty.is_unknown() && resolved != init_ty {
                            self.error(
                                node.span,
                                AnalysisErrorKind::TypeMismatch {
                                    expected: resolved.to_string(),
                                    found: init_ty.to_string(),
                                },
                            );
                        }
                        resolved
                    }
                    None => init_ty,
                };
                node.set_ty(declared);
                if self.scopes.declared_locally(scope, *name) {
                    self.error(node.span, AnalysisErrorKind::DuplicateDeclaration(self.name(*name)));
                } else {
                    self.scopes.declare(
                        scope,
                        SymbolEntry::new(*name, SymbolKind::Var, declared, *mutability != Mutability::Let),
                    );
                }
            }
            NodeKind::ExprStmt(expr) => {
                self.analyze_expr(expr, scope);
            }
            NodeKind::Return(value) => {
                let found = match value {
                    Some(v) => self.analyze_expr(v, scope),
                    None => Type::Void,
                };
                // spec.md §4.5 ("Return coercion") has the IR builder insert a numeric
                // cast when a returned expression's type differs from the function's
                // declared return type (e.g. an `i64`-typed literal returned from an
                // `i32` function) — there is no analyzer-level return-type rule, only
                // a type-compatibility check. Differing numeric widths/kinds are
                // exactly what that coercion exists for, so only a non-numeric
                // mismatch (e.g. returning a `bool` from an `i32` function) is an
                // analyzer error here.
                let numeric_coercible = return_type.is_numeric() && found.is_numeric();
                if !return_type.is_unknown() && !found.is_unknown() && return_type != found && !numeric_coercible {
                    self.error(
                        node.span,
                        AnalysisErrorKind::ReturnTypeMismatch {
                            expected: return_type.to_string(),
                            found: found.to_string(),
                        },
                    );
                }
            }
            NodeKind::Break => {
                if !in_loop {
                    self.error(node.span, AnalysisErrorKind::BreakOutsideLoop);
                }
            }
            NodeKind::Continue => {
                if !in_loop {
                    self.error(node.span, AnalysisErrorKind::ContinueOutsideLoop);
                }
            }
            NodeKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.analyze_expr(cond, scope);
                self.analyze_block_or_branch(then_block, scope, return_type, in_loop);
                if let Some(branch) = else_branch {
                    self.analyze_block_or_branch(branch, scope, return_type, in_loop);
                }
            }
            NodeKind::While { cond, body } => {
                self.analyze_expr(cond, scope);
                self.analyze_block(body, scope, return_type, true);
            }
            NodeKind::For {
                var, start, end, body, ..
            } => {
                self.analyze_expr(start, scope);
                self.analyze_expr(end, scope);
                let loop_scope = self.scopes.push();
                self.scopes.declare(
                    loop_scope,
                    SymbolEntry::new(*var, SymbolKind::Var, Type::I64, false),
                );
                if let NodeKind::Block(stmts) = &body.kind {
                    for stmt in stmts.iter() {
                        self.analyze_stmt(stmt, loop_scope, return_type, true);
                    }
                }
                self.scopes.pop();
            }
            _ => {
                self.analyze_expr(node, scope);
            }
        }
    }

    /// `then`/`else` branches may be a `Block` or (for an `elif` cascade) a
    /// nested `If` node; both are handled uniformly here.
    fn analyze_block_or_branch(&mut self, node: &'a Node<'a>, scope: ScopeId, return_type: Type<'a>, in_loop: bool) {
        match &node.kind {
            NodeKind::Block(_) => self.analyze_block(node, scope, return_type, in_loop),
            NodeKind::If { .. } => self.analyze_stmt(node, scope, return_type, in_loop),
            _ => {}
        }
    }

    fn analyze_expr(&mut self, node: &'a Node<'a>, scope: ScopeId) -> Type<'a> {
        let ty = self.analyze_expr_inner(node, scope);
        node.set_ty(ty);
        ty
    }

    fn analyze_expr_inner(&mut self, node: &'a Node<'a>, scope: ScopeId) -> Type<'a> {
        match &node.kind {
            NodeKind::IntLiteral(_) => Type::I64,
            NodeKind::FloatLiteral(_) => Type::F64,
            NodeKind::BoolLiteral(_) => Type::Bool,
            NodeKind::StringLiteral(_) => Type::Slice(self.arena.alloc_type(Type::U8)),
            NodeKind::Identifier(name) => match self.scopes.resolve(scope, *name) {
                Some(entry) => entry.ty,
                None => {
                    self.error(node.span, AnalysisErrorKind::UndefinedName(self.name(*name)));
                    Type::Unknown
                }
            },
            NodeKind::Assign { target, value } => {
                let value_ty = self.analyze_expr(value, scope);
                let target_ty = self.analyze_expr(target, scope);
                if let NodeKind::Identifier(name) = &target.kind {
                    if let Some(entry) = self.scopes.resolve(scope, *name) {
                        if !entry.mutable {
                            self.error(target.span, AnalysisErrorKind::AssignToImmutable(self.name(*name)));
                        }
                    }
                }
                if !target_ty.is_unknown() && !value_ty.is_unknown() && target_ty != value_ty {
                    self.error(
                        node.span,
                        AnalysisErrorKind::TypeMismatch {
                            expected: target_ty.to_string(),
                            found: value_ty.to_string(),
                        },
                    );
                }
                target_ty
            }
            NodeKind::Binary { op, lhs, rhs } => self.analyze_binary(node.span, *op, lhs, rhs, scope),
            NodeKind::Unary { op, operand } => self.analyze_unary(node.span, *op, operand, scope),
            NodeKind::Cast { expr, target } => {
                self.analyze_expr(expr, scope);
                self.resolve_type(*target, node.span)
            }
            NodeKind::Call { callee, args } => self.analyze_call(node.span, callee, args, scope),
            NodeKind::Member { base, field } => self.analyze_member(node.span, base, *field, scope),
            NodeKind::Index { base, index } => {
                let base_ty = self.analyze_expr(base, scope);
                self.analyze_expr(index, scope);
                match base_ty {
                    Type::Array(elem, _) | Type::Slice(elem) => *elem,
                    Type::Unknown => Type::Unknown,
                    _ => {
                        self.error(node.span, AnalysisErrorKind::IndexOnNonArray);
                        Type::Unknown
                    }
                }
            }
            NodeKind::StructInit { name, fields } => self.analyze_struct_init(node.span, *name, fields, scope),
            NodeKind::ArrayInit(elements) => {
                let mut elem_ty = Type::Unknown;
                for (i, e) in elements.iter().enumerate() {
                    let t = self.analyze_expr(e, scope);
                    if i == 0 {
                        elem_ty = t;
                    }
                }
                Type::Array(self.arena.alloc_type(elem_ty), elements.len() as u32)
            }
            NodeKind::EnumVariant { enum_name, variant_name } => {
                if let Some(variants) = self.enums.get(enum_name) {
                    if variants.iter().any(|(v, _)| v == variant_name) {
                        Type::Enum(*enum_name)
                    } else {
                        self.error(
                            node.span,
                            AnalysisErrorKind::UnknownVariant {
                                enum_name: self.name(*enum_name),
                                variant: self.name(*variant_name),
                            },
                        );
                        Type::Unknown
                    }
                } else {
                    self.error(node.span, AnalysisErrorKind::UndefinedEnum(self.name(*enum_name)));
                    Type::Unknown
                }
            }
            _ => Type::Unknown,
        }
    }

    fn analyze_binary(
        &mut self,
        span: Span,
        op: BinaryOp,
        lhs: &'a Node<'a>,
        rhs: &'a Node<'a>,
        scope: ScopeId,
    ) -> Type<'a> {
        let lhs_ty = self.analyze_expr(lhs, scope);
        let rhs_ty = self.analyze_expr(rhs, scope);
        if lhs_ty.is_unknown() || rhs_ty.is_unknown() {
            return if op.is_comparison() || op.is_logical() {
                Type::Bool
            } else {
                Type::Unknown
            };
        }
        if op.is_logical() {
            if lhs_ty != Type::Bool || rhs_ty != Type::Bool {
                self.error(
                    span,
                    AnalysisErrorKind::InvalidOperand {
                        op: if op == BinaryOp::And { "and" } else { "or" },
                        ty: if lhs_ty != Type::Bool { lhs_ty.to_string() } else { rhs_ty.to_string() },
                    },
                );
            }
            return Type::Bool;
        }
        if op.is_comparison() {
            if lhs_ty != rhs_ty {
                self.error(
                    span,
                    AnalysisErrorKind::TypeMismatch {
                        expected: lhs_ty.to_string(),
                        found: rhs_ty.to_string(),
                    },
                );
            }
            return Type::Bool;
        }
        // arithmetic/bitwise/shift
        if lhs_ty != rhs_ty {
            self.error(
                span,
                AnalysisErrorKind::TypeMismatch {
                    expected: lhs_ty.to_string(),
                    found: rhs_ty.to_string(),
                },
            );
            return Type::Unknown;
        }
        if op.is_bitwise_or_shift() && !lhs_ty.is_integer() {
            self.error(
                span,
                AnalysisErrorKind::InvalidOperand { op: "bitwise", ty: lhs_ty.to_string() },
            );
        } else if !lhs_ty.is_numeric() {
            self.error(
                span,
                AnalysisErrorKind::InvalidOperand { op: "arithmetic", ty: lhs_ty.to_string() },
            );
        }
        lhs_ty
    }

    fn analyze_unary(&mut self, span: Span, op: UnaryOp, operand: &'a Node<'a>, scope: ScopeId) -> Type<'a> {
        let ty = self.analyze_expr(operand, scope);
        if ty.is_unknown() {
            return Type::Unknown;
        }
        match op {
            UnaryOp::Neg => {
                if !ty.is_numeric() {
                    self.error(span, AnalysisErrorKind::InvalidOperand { op: "-", ty: ty.to_string() });
                }
                ty
            }
            UnaryOp::Not => {
                if ty != Type::Bool {
                    self.error(span, AnalysisErrorKind::InvalidOperand { op: "not", ty: ty.to_string() });
                }
                Type::Bool
            }
            UnaryOp::BitNot => {
                if !ty.is_integer() {
                    self.error(span, AnalysisErrorKind::InvalidOperand { op: "~", ty: ty.to_string() });
                }
                ty
            }
            UnaryOp::AddrOf => Type::Ptr(self.arena.alloc_type(ty)),
            UnaryOp::Deref => match ty {
                Type::Ptr(inner) => *inner,
                _ => {
                    self.error(span, AnalysisErrorKind::InvalidOperand { op: "*", ty: ty.to_string() });
                    Type::Unknown
                }
            },
        }
    }

    fn analyze_call(&mut self, span: Span, callee: &'a Node<'a>, args: &'a [&'a Node<'a>], scope: ScopeId) -> Type<'a> {
        let arg_types: Vec<Type<'a>> = args.iter().map(|a| self.analyze_expr(a, scope)).collect();

        // `Module.name(...)`: the base identifier names an imported module,
        // not a value in scope, so there is nothing here to resolve. Module
        // members are left for the IR builder to mangle and match against
        // the declared externs (Open Question 2) — the Analyzer only steps
        // out of the way once it is sure `base` isn't actually an undefined
        // variable the user meant to write a plain call against.
        if let NodeKind::Member { base, .. } = &callee.kind {
            if let NodeKind::Identifier(name) = &base.kind {
                if self.scopes.resolve(scope, *name).is_none() {
                    callee.set_ty(Type::Unknown);
                    return Type::Unknown;
                }
            }
        }

        let callee_ty = self.analyze_expr(callee, scope);
        match callee_ty {
            Type::Function(ret, params) => {
                if params.len() != arg_types.len() {
                    self.error(
                        span,
                        AnalysisErrorKind::WrongArgCount { expected: params.len(), found: arg_types.len() },
                    );
                } else {
                    for (p, a) in params.iter().zip(arg_types.iter()) {
                        if !p.is_unknown() && !a.is_unknown() && p != a {
                            self.error(
                                span,
                                AnalysisErrorKind::TypeMismatch { expected: p.to_string(), found: a.to_string() },
                            );
                        }
                    }
                }
                *ret
            }
            Type::Unknown => Type::Unknown,
            _ => {
                self.error(span, AnalysisErrorKind::NotCallable);
                Type::Unknown
            }
        }
    }

    fn analyze_member(&mut self, span: Span, base: &'a Node<'a>, field: Symbol, scope: ScopeId) -> Type<'a> {
        let base_ty = self.analyze_expr(base, scope);
        match base_ty {
            Type::Struct(name) => {
                let fields = self.structs.get(&name).copied();
                match fields.and_then(|fs| fs.iter().find(|(f, _)| *f == field)) {
                    Some((_, ty)) => *ty,
                    None => {
                        self.error(
                            span,
                            AnalysisErrorKind::UnknownField { struct_name: self.name(name), field: self.name(field) },
                        );
                        Type::Unknown
                    }
                }
            }
            Type::Unknown => Type::Unknown,
            other => {
                self.error(span, AnalysisErrorKind::NotAStruct(other.to_string()));
                Type::Unknown
            }
        }
    }

    fn analyze_struct_init(
        &mut self,
        span: Span,
        name: Symbol,
        fields: &'a [(Symbol, &'a Node<'a>)],
        scope: ScopeId,
    ) -> Type<'a> {
        let Some(declared) = self.structs.get(&name).copied() else {
            self.error(span, AnalysisErrorKind::UndefinedStruct(self.name(name)));
            for (_, v) in fields.iter() {
                self.analyze_expr(v, scope);
            }
            return Type::Unknown;
        };
        for (field_name, value) in fields.iter() {
            let value_ty = self.analyze_expr(value, scope);
            match declared.iter().find(|(f, _)| f == field_name) {
                Some((_, declared_ty)) => {
                    if !declared_ty.is_unknown() && !value_ty.is_unknown() && *declared_ty != value_ty {
                        self.error(
                            span,
                            AnalysisErrorKind::TypeMismatch {
                                expected: declared_ty.to_string(),
                                found: value_ty.to_string(),
                            },
                        );
                    }
                }
                None => self.error(
                    span,
                    AnalysisErrorKind::UnknownField { struct_name: self.name(name), field: self.name(*field_name) },
                ),
            }
        }
        Type::Struct(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_base::Interner;
    use nullc_lang::arena_ctx::AstStorage;
    use nullc_lang::lexer::Lexer;
    use nullc_lang::parser::Parser;

    fn analyze(src: &str) -> Result<(), Vec<AnalysisError>> {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut interner).tokenize();
        let storage: AstStorage = AstStorage::new();
        let ctx = storage.context();
        let parser = Parser::new(&tokens, ctx);
        let (program, parse_errors) = parser.parse_program();
        assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
        let analyzer = Analyzer::new(ctx, &interner);
        analyzer.analyze(program).map(|_| ())
    }

    #[test]
    fn well_typed_program_analyzes_cleanly() {
        let src = "fn main() -> i32 do let x :: i64 = 1 ret 0 end\n";
        assert!(analyze(src).is_ok());
    }

    #[test]
    fn undefined_name_is_an_error() {
        let src = "fn main() -> i32 do let x :: i64 = y ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.kind, AnalysisErrorKind::UndefinedName(_))));
    }

    #[test]
    fn duplicate_declaration_in_same_scope_is_an_error() {
        let src = "fn main() -> i32 do let x :: i64 = 1\n let x :: i64 = 2\n ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, AnalysisErrorKind::DuplicateDeclaration(_))));
    }

    #[test]
    fn assigning_to_let_binding_is_rejected() {
        let src = "fn main() -> i32 do let x :: i64 = 1\n x = 2\n ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, AnalysisErrorKind::AssignToImmutable(_))));
    }

    #[test]
    fn assigning_to_mut_binding_is_accepted() {
        let src = "fn main() -> i32 do mut x :: i64 = 1\n x = 2\n ret 0 end\n";
        assert!(analyze(src).is_ok());
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let src = "fn main() -> i32 do break\n ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.kind, AnalysisErrorKind::BreakOutsideLoop)));
    }

    #[test]
    fn break_inside_while_is_accepted() {
        let src = "fn main() -> i32 do while true do break end\n ret 0 end\n";
        assert!(analyze(src).is_ok());
    }

    #[test]
    fn struct_init_field_order_does_not_matter() {
        let src = "struct Point do x :: i64\n y :: i64\n end\n\
                    fn main() -> i32 do let p = Point { y = 2, x = 1 }\n ret 0 end\n";
        assert!(analyze(src).is_ok());
    }

    #[test]
    fn unknown_struct_field_is_an_error() {
        let src = "struct Point do x :: i64\n end\n\
                    fn main() -> i32 do let p = Point { z = 1 }\n ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.kind, AnalysisErrorKind::UnknownField { .. })));
    }

    #[test]
    fn module_qualified_call_is_not_validated() {
        let src = "@extern do\n fn Math_add(a :: i64, b :: i64) -> i64 end\n end\n\
                    fn main() -> i32 do let x = Math.add(1, 2)\n ret 0 end\n";
        assert!(analyze(src).is_ok());
    }

    #[test]
    fn calling_function_with_wrong_arity_is_rejected() {
        let src = "fn add(a :: i64, b :: i64) -> i64 do ret a + b end\n\
                    fn main() -> i32 do let x = add(1)\n ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, AnalysisErrorKind::WrongArgCount { .. })));
    }

    #[test]
    fn forward_reference_to_later_function_resolves() {
        let src = "fn main() -> i32 do ret helper() end\n fn helper() -> i32 do ret 1 end\n";
        assert!(analyze(src).is_ok());
    }

    #[test]
    fn and_or_require_boolean_operands() {
        let src = "fn main() -> i32 do let x :: bool = 1 and true\n ret 0 end\n";
        let errors = analyze(src).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e.kind, AnalysisErrorKind::InvalidOperand { .. })));
    }
}
