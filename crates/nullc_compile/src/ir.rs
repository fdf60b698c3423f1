//! SSA-shaped backend intermediate representation.
//!
//! The IR is a plain Rust data structure — a named [`Module`] of
//! [`Function`]s, each a list of [`BasicBlock`]s, each a list of typed
//! [`Instruction`]s — rather than bindings to a specific LLVM crate. The
//! JIT/object-file emitter is treated as an opaque external sink consuming
//! this builder's output; a downstream emitter (out of scope here) would
//! walk this IR and feed an LLVM codegen layer. Representing it as owned
//! data rather than `inkwell` handles keeps this crate buildable without an
//! LLVM toolchain and keeps the IR independently testable.
//!
//! # Three-pass construction
//!
//! 1. declare every struct type in the globals table,
//! 2. declare every function signature (so forward calls resolve),
//! 3. emit every function body.
//!
//! # Control flow
//!
//! `if`/`while`/`for` lower to explicit basic blocks joined by `br`/`cond_br`
//! and (where a value escapes the branch) a `phi`. `and`/`or` lower the same
//! way — never as bitwise ops — so short-circuit evaluation is a property of
//! the control-flow graph, identical in shape to how `if` lowers.

use std::collections::HashMap;
use std::fmt;

use nullc_base::{Interner, Span, Symbol};
use nullc_lang::ast::{BinaryOp, Mutability, Node, NodeKind, Type, UnaryOp};

use crate::analyzer::AnalyzedProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// An SSA value: either the result of some earlier instruction, or a
/// constant materialized inline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IrValue {
    Value(ValueId),
    ConstInt(i64),
    ConstFloat(u64), // f64 bits, so IrValue stays Eq-friendly
    ConstBool(bool),
    /// Index into the module's string-constant globals table.
    ConstStr(u32),
    /// The function's Nth incoming argument, as handed to it by its caller.
    /// Only ever appears as the `value` operand of the `Store` that spills a
    /// parameter into its stack slot at function entry.
    Param(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Instruction<'a> {
    /// Stack slot allocation; `alloca(ty)` yields a pointer-shaped value.
    Alloca { result: ValueId, ty: Type<'a> },
    Load { result: ValueId, ptr: IrValue, ty: Type<'a> },
    Store { ptr: IrValue, value: IrValue },
    BinOp { result: ValueId, op: IrBinOp, lhs: IrValue, rhs: IrValue },
    Neg { result: ValueId, value: IrValue },
    Not { result: ValueId, value: IrValue },
    BitNot { result: ValueId, value: IrValue },
    /// Sign-extend/truncate/int-to-float/float-to-int per spec's `as` cast
    /// semantics; integer narrowing and `i64::MIN` negation both rely on
    /// wrapping arithmetic, never a panicking path.
    Cast { result: ValueId, value: IrValue, from: Type<'a>, to: Type<'a> },
    /// Struct-GEP-equivalent: `base` must be a pointer to a struct; `field`
    /// is the field's declared index, not its literal-initializer position
    /// (spec property 6, field-order independence).
    FieldPtr { result: ValueId, base: IrValue, field_index: u32 },
    /// Array/slice-GEP-equivalent.
    IndexPtr { result: ValueId, base: IrValue, index: IrValue },
    Call { result: Option<ValueId>, callee: Symbol, args: Vec<IrValue> },
    Br { target: BlockId },
    CondBr { cond: IrValue, then_block: BlockId, else_block: BlockId },
    /// Joins values from multiple predecessor blocks into one SSA value —
    /// how `if`-as-expression and short-circuit `and`/`or` produce a single
    /// result despite being lowered as control flow.
    Phi { result: ValueId, incoming: Vec<(BlockId, IrValue)> },
    Ret { value: Option<IrValue> },
}

#[derive(Debug, Default)]
pub struct BasicBlock<'a> {
    pub id: BlockId,
    pub instructions: Vec<Instruction<'a>>,
}

pub struct Function<'a> {
    pub name: Symbol,
    pub params: Vec<(Symbol, Type<'a>)>,
    pub return_type: Type<'a>,
    pub is_extern: bool,
    pub blocks: Vec<BasicBlock<'a>>,
}

#[derive(Default)]
pub struct Module<'a> {
    pub name: String,
    pub functions: Vec<Function<'a>>,
    pub struct_types: HashMap<Symbol, Vec<(Symbol, Type<'a>)>>,
    /// Interned string-literal constants, indexed by `IrValue::ConstStr`.
    pub string_constants: Vec<String>,
}

impl fmt::Display for Module<'_> {
    /// A human-readable textual dump, used by the CLI's `build` subcommand
    /// as the ".o-equivalent" artifact since no native object emitter is
    /// implemented in this crate (spec.md Non-goals / IR Builder module).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for (i, s) in self.string_constants.iter().enumerate() {
            writeln!(f, "  @str.{i} = {s:?}")?;
        }
        for func in &self.functions {
            writeln!(f, "fn {:?}({} params) -> {:?} extern={}", func.name, func.params.len(), func.return_type, func.is_extern)?;
            for block in &func.blocks {
                writeln!(f, "  bb{}:", block.id.0)?;
                for inst in &block.instructions {
                    writeln!(f, "    {inst:?}")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum CodegenErrorKind {
    UnresolvedName(String),
    NotImplemented(&'static str),
}

impl fmt::Display for CodegenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedName(n) => write!(f, "internal error: unresolved name '{n}' reached codegen"),
            Self::NotImplemented(what) => write!(f, "codegen does not yet support {what}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    pub span: Span,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.kind, self.span.start, self.span.end)
    }
}

impl std::error::Error for CodegenError {}

/// Maps a source identifier to either a loadable stack slot or an SSA value
/// already holding the identifier's value, per the builder's "current
/// basic block" and "per-scope symbol table" contract (spec.md §4.5).
#[derive(Clone, Copy)]
enum Binding {
    /// A stack slot produced by `Alloca`; reads must `Load` from it first.
    Slot(ValueId, Type<'static>),
    Value(IrValue),
}

pub struct IrBuilder<'a> {
    module: Module<'a>,
    analyzed: AnalyzedProgram<'a>,
    interner: &'a Interner,
    next_value: u32,
    next_block: u32,
    current_block: usize,
    scopes: Vec<HashMap<Symbol, Binding>>,
    /// `break`/`continue` targets of the loop currently being emitted, saved
    /// and restored around nested loops (spec.md's "loop-stack").
    loop_targets: Vec<(BlockId, BlockId)>,
    errors: Vec<CodegenError>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(name: impl Into<String>, analyzed: AnalyzedProgram<'a>, interner: &'a Interner) -> Self {
        let mut module = Module::default();
        module.name = name.into();
        module.struct_types = analyzed
            .structs
            .iter()
            .map(|(k, v)| (*k, v.to_vec()))
            .collect();
        Self {
            module,
            analyzed,
            interner,
            next_value: 0,
            next_block: 0,
            current_block: 0,
            scopes: Vec::new(),
            loop_targets: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    fn fresh_block(&mut self, func: &mut Function<'a>) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        func.blocks.push(BasicBlock { id, instructions: Vec::new() });
        id
    }

    fn emit(&mut self, func: &mut Function<'a>, inst: Instruction<'a>) {
        func.blocks[self.current_block].instructions.push(inst);
    }

    fn error(&mut self, span: Span, kind: CodegenErrorKind) {
        self.errors.push(CodegenError { kind, span });
    }

    /// Builds the whole module from a parsed, analyzed `Program` node.
    pub fn build(mut self, program: &'a Node<'a>) -> Result<Module<'a>, Vec<CodegenError>> {
        let NodeKind::Program(decls) = &program.kind else {
            panic!("build() called on a non-Program node");
        };

        // pass 2: declare every function signature up front so calls to
        // functions declared later in the file resolve during body emission.
        for decl in decls.iter() {
            match &decl.kind {
                NodeKind::FnDecl { name, params, return_type, is_extern, .. } => {
                    self.declare_function(*name, params, *return_type, *is_extern);
                }
                NodeKind::Extern(externs) => {
                    for e in externs.iter() {
                        if let NodeKind::FnDecl { name, params, return_type, is_extern, .. } = &e.kind {
                            self.declare_function(*name, params, *return_type, *is_extern);
                        }
                    }
                }
                _ => {}
            }
        }

        // pass 3: emit bodies.
        for decl in decls.iter() {
            if let NodeKind::FnDecl { name, body: Some(body), .. } = &decl.kind {
                self.emit_body(*name, body);
            }
        }

        if self.errors.is_empty() {
            Ok(self.module)
        } else {
            Err(self.errors)
        }
    }

    fn declare_function(&mut self, name: Symbol, params: &'a [&'a Node<'a>], return_type: Type<'a>, is_extern: bool) {
        let params = params
            .iter()
            .map(|p| match &p.kind {
                NodeKind::Param { name, .. } => (*name, p.ty().unwrap_or(Type::Unknown)),
                _ => (Symbol::EMPTY, Type::Unknown),
            })
            .collect();
        self.module.functions.push(Function {
            name,
            params,
            return_type,
            is_extern,
            blocks: Vec::new(),
        });
    }

    fn emit_body(&mut self, name: Symbol, body: &'a Node<'a>) {
        let fn_index = self
            .module
            .functions
            .iter()
            .position(|f| f.name == name && !f.is_extern && f.blocks.is_empty());
        let Some(fn_index) = fn_index else { return };

        let mut func = std::mem::replace(
            &mut self.module.functions[fn_index],
            Function { name, params: Vec::new(), return_type: Type::Void, is_extern: false, blocks: Vec::new() },
        );
        self.current_block = 0;
        let entry = self.fresh_block(&mut func);
        self.current_block = entry.0 as usize;

        self.scopes.clear();
        self.scopes.push(HashMap::new());
        let param_list = func.params.clone();
        for (index, (pname, pty)) in param_list.iter().enumerate() {
            let slot = self.fresh_value();
            self.emit(&mut func, Instruction::Alloca { result: slot, ty: *pty });
            self.emit(
                &mut func,
                Instruction::Store { ptr: IrValue::Value(slot), value: IrValue::Param(index as u32) },
            );
            self.bind(*pname, Binding::Slot(slot, to_static(*pty)));
        }

        self.emit_block(&mut func, body);

        // Fall off the end of a void function: implicit `ret`.
        if !self.block_terminated(&func) {
            self.emit(&mut func, Instruction::Ret { value: None });
        }

        self.module.functions[fn_index] = func;
    }

    fn block_terminated(&self, func: &Function<'a>) -> bool {
        func.blocks[self.current_block]
            .instructions
            .last()
            .map(|i| matches!(i, Instruction::Ret { .. } | Instruction::Br { .. } | Instruction::CondBr { .. }))
            .unwrap_or(false)
    }

    fn bind(&mut self, name: Symbol, binding: Binding) {
        self.scopes.last_mut().expect("scope stack non-empty").insert(name, binding);
    }

    fn lookup(&self, name: Symbol) -> Option<Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(&name).copied())
    }

    fn emit_block(&mut self, func: &mut Function<'a>, block: &'a Node<'a>) {
        let NodeKind::Block(stmts) = &block.kind else { return };
        self.scopes.push(HashMap::new());
        for stmt in stmts.iter() {
            if self.block_terminated(func) {
                break;
            }
            self.emit_stmt(func, stmt);
        }
        self.scopes.pop();
    }

    fn emit_stmt(&mut self, func: &mut Function<'a>, node: &'a Node<'a>) {
        match &node.kind {
            NodeKind::VarDecl { name, init, .. } => {
                let value = self.emit_expr(func, init);
                let ty = node.ty().unwrap_or(Type::Unknown);
                let slot = self.fresh_value();
                self.emit(func, Instruction::Alloca { result: slot, ty });
                self.emit(func, Instruction::Store { ptr: IrValue::Value(slot), value });
                self.bind(*name, Binding::Slot(slot, to_static(ty)));
            }
            NodeKind::ExprStmt(expr) => {
                self.emit_expr(func, expr);
            }
            NodeKind::Return(value) => {
                let v = value.map(|e| {
                    let v = self.emit_expr(func, e);
                    let from = e.ty().unwrap_or(Type::Unknown);
                    let to = func.return_type;
                    if from != to && from != Type::Unknown && to != Type::Unknown {
                        let result = self.fresh_value();
                        self.emit(func, Instruction::Cast { result, value: v, from, to });
                        IrValue::Value(result)
                    } else {
                        v
                    }
                });
                self.emit(func, Instruction::Ret { value: v });
            }
            NodeKind::Break => match self.loop_targets.last() {
                Some((break_target, _)) => {
                    let target = *break_target;
                    self.emit(func, Instruction::Br { target });
                }
                None => self.error(node.span, CodegenErrorKind::NotImplemented("break outside a loop")),
            },
            NodeKind::Continue => match self.loop_targets.last() {
                Some((_, continue_target)) => {
                    let target = *continue_target;
                    self.emit(func, Instruction::Br { target });
                }
                None => self.error(node.span, CodegenErrorKind::NotImplemented("continue outside a loop")),
            },
            NodeKind::If { cond, then_block, else_branch } => {
                self.emit_if(func, cond, then_block, *else_branch);
            }
            NodeKind::While { cond, body } => self.emit_while(func, cond, body),
            NodeKind::For { var, start, end, body } => self.emit_for(func, *var, start, end, body),
            NodeKind::Assign { target, value } => {
                self.emit_assign(func, target, value);
            }
            _ => {
                self.emit_expr(func, node);
            }
        }
    }

    fn emit_if(&mut self, func: &mut Function<'a>, cond: &'a Node<'a>, then_block: &'a Node<'a>, else_branch: Option<&'a Node<'a>>) {
        let cond_val = self.emit_expr(func, cond);
        let then_id = self.fresh_block(func);
        let else_id = self.fresh_block(func);
        let join_id = self.fresh_block(func);
        self.emit(func, Instruction::CondBr { cond: cond_val, then_block: then_id, else_block: else_id });

        self.current_block = then_id.0 as usize;
        self.emit_block(func, then_block);
        if !self.block_terminated(func) {
            self.emit(func, Instruction::Br { target: join_id });
        }

        self.current_block = else_id.0 as usize;
        if let Some(branch) = else_branch {
            match &branch.kind {
                NodeKind::Block(_) => self.emit_block(func, branch),
                NodeKind::If { .. } => self.emit_stmt(func, branch),
                _ => {}
            }
        }
        if !self.block_terminated(func) {
            self.emit(func, Instruction::Br { target: join_id });
        }

        self.current_block = join_id.0 as usize;
    }

    fn emit_while(&mut self, func: &mut Function<'a>, cond: &'a Node<'a>, body: &'a Node<'a>) {
        let header_id = self.fresh_block(func);
        let body_id = self.fresh_block(func);
        let exit_id = self.fresh_block(func);
        self.emit(func, Instruction::Br { target: header_id });

        self.current_block = header_id.0 as usize;
        let cond_val = self.emit_expr(func, cond);
        self.emit(func, Instruction::CondBr { cond: cond_val, then_block: body_id, else_block: exit_id });

        self.current_block = body_id.0 as usize;
        self.loop_targets.push((exit_id, header_id));
        self.emit_block(func, body);
        self.loop_targets.pop();
        if !self.block_terminated(func) {
            self.emit(func, Instruction::Br { target: header_id });
        }

        self.current_block = exit_id.0 as usize;
    }

    fn emit_for(&mut self, func: &mut Function<'a>, var: Symbol, start: &'a Node<'a>, end: &'a Node<'a>, body: &'a Node<'a>) {
        let start_val = self.emit_expr(func, start);
        let end_val = self.emit_expr(func, end);
        let slot = self.fresh_value();
        self.emit(func, Instruction::Alloca { result: slot, ty: Type::I64 });
        self.emit(func, Instruction::Store { ptr: IrValue::Value(slot), value: start_val });

        let header_id = self.fresh_block(func);
        let body_id = self.fresh_block(func);
        let inc_id = self.fresh_block(func);
        let exit_id = self.fresh_block(func);
        self.emit(func, Instruction::Br { target: header_id });

        self.current_block = header_id.0 as usize;
        let cur = self.fresh_value();
        self.emit(func, Instruction::Load { result: cur, ptr: IrValue::Value(slot), ty: Type::I64 });
        let cmp = self.fresh_value();
        self.emit(func, Instruction::BinOp { result: cmp, op: IrBinOp::Lt, lhs: IrValue::Value(cur), rhs: end_val });
        self.emit(func, Instruction::CondBr { cond: IrValue::Value(cmp), then_block: body_id, else_block: exit_id });

        self.current_block = body_id.0 as usize;
        self.scopes.push(HashMap::new());
        self.bind(var, Binding::Slot(slot, to_static(Type::I64)));
        self.loop_targets.push((exit_id, inc_id));
        self.emit_block(func, body);
        self.loop_targets.pop();
        self.scopes.pop();
        if !self.block_terminated(func) {
            self.emit(func, Instruction::Br { target: inc_id });
        }

        self.current_block = inc_id.0 as usize;
        let next = self.fresh_value();
        self.emit(func, Instruction::Load { result: next, ptr: IrValue::Value(slot), ty: Type::I64 });
        let incremented = self.fresh_value();
        self.emit(
            func,
            Instruction::BinOp {
                result: incremented,
                op: IrBinOp::Add,
                lhs: IrValue::Value(next),
                rhs: IrValue::ConstInt(1),
            },
        );
        self.emit(func, Instruction::Store { ptr: IrValue::Value(slot), value: IrValue::Value(incremented) });
        self.emit(func, Instruction::Br { target: header_id });

        self.current_block = exit_id.0 as usize;
    }

    fn emit_assign(&mut self, func: &mut Function<'a>, target: &'a Node<'a>, value: &'a Node<'a>) -> IrValue {
        let value_val = self.emit_expr(func, value);
        match &target.kind {
            NodeKind::Identifier(name) => {
                if let Some(Binding::Slot(slot, _)) = self.lookup(*name) {
                    self.emit(func, Instruction::Store { ptr: IrValue::Value(slot), value: value_val });
                }
            }
            NodeKind::Member { base, field } => {
                let base_ptr = self.emit_lvalue(func, base);
                let field_index = self.field_index(base.ty(), *field);
                let result = self.fresh_value();
                self.emit(func, Instruction::FieldPtr { result, base: base_ptr, field_index });
                self.emit(func, Instruction::Store { ptr: IrValue::Value(result), value: value_val });
            }
            NodeKind::Index { base, index } => {
                let base_ptr = self.emit_lvalue(func, base);
                let index_val = self.emit_expr(func, index);
                let result = self.fresh_value();
                self.emit(func, Instruction::IndexPtr { result, base: base_ptr, index: index_val });
                self.emit(func, Instruction::Store { ptr: IrValue::Value(result), value: value_val });
            }
            _ => {}
        }
        value_val
    }

    fn field_index(&self, struct_ty: Option<Type<'a>>, field: Symbol) -> u32 {
        if let Some(Type::Struct(name)) = struct_ty {
            if let Some(fields) = self.analyzed.structs.get(&name) {
                if let Some(idx) = fields.iter().position(|(f, _)| *f == field) {
                    return idx as u32;
                }
            }
        }
        0
    }

    /// Emits the pointer/slot for an lvalue base (the "load the address, not
    /// the value" side of member/index assignment).
    fn emit_lvalue(&mut self, func: &mut Function<'a>, node: &'a Node<'a>) -> IrValue {
        match &node.kind {
            NodeKind::Identifier(name) => match self.lookup(*name) {
                Some(Binding::Slot(slot, _)) => IrValue::Value(slot),
                Some(Binding::Value(v)) => v,
                None => IrValue::ConstInt(0),
            },
            _ => self.emit_expr(func, node),
        }
    }

    fn emit_expr(&mut self, func: &mut Function<'a>, node: &'a Node<'a>) -> IrValue {
        match &node.kind {
            NodeKind::IntLiteral(v) => IrValue::ConstInt(*v),
            NodeKind::FloatLiteral(v) => IrValue::ConstFloat(v.to_bits()),
            NodeKind::BoolLiteral(v) => IrValue::ConstBool(*v),
            NodeKind::StringLiteral(s) => {
                let idx = self.module.string_constants.len() as u32;
                self.module.string_constants.push(s.to_string());
                IrValue::ConstStr(idx)
            }
            NodeKind::Identifier(name) => match self.lookup(*name) {
                Some(Binding::Slot(slot, ty)) => {
                    let result = self.fresh_value();
                    self.emit(func, Instruction::Load { result, ptr: IrValue::Value(slot), ty: from_static(ty) });
                    IrValue::Value(result)
                }
                Some(Binding::Value(v)) => v,
                None => {
                    self.error(node.span, CodegenErrorKind::UnresolvedName(name.index().to_string()));
                    IrValue::ConstInt(0)
                }
            },
            NodeKind::Assign { target, value } => self.emit_assign(func, target, value),
            NodeKind::Binary { op, lhs, rhs } if op.is_logical() => self.emit_short_circuit(func, *op, lhs, rhs),
            NodeKind::Binary { op, lhs, rhs } => {
                let l = self.emit_expr(func, lhs);
                let r = self.emit_expr(func, rhs);
                let result = self.fresh_value();
                self.emit(func, Instruction::BinOp { result, op: lower_binop(*op), lhs: l, rhs: r });
                IrValue::Value(result)
            }
            NodeKind::Unary { op: UnaryOp::Neg, operand } => {
                let v = self.emit_expr(func, operand);
                let result = self.fresh_value();
                self.emit(func, Instruction::Neg { result, value: v });
                IrValue::Value(result)
            }
            NodeKind::Unary { op: UnaryOp::Not, operand } => {
                let v = self.emit_expr(func, operand);
                let result = self.fresh_value();
                self.emit(func, Instruction::Not { result, value: v });
                IrValue::Value(result)
            }
            NodeKind::Unary { op: UnaryOp::BitNot, operand } => {
                let v = self.emit_expr(func, operand);
                let result = self.fresh_value();
                self.emit(func, Instruction::BitNot { result, value: v });
                IrValue::Value(result)
            }
            NodeKind::Unary { op: UnaryOp::AddrOf, operand } => self.emit_lvalue(func, operand),
            NodeKind::Unary { op: UnaryOp::Deref, operand } => {
                let ptr = self.emit_expr(func, operand);
                let result = self.fresh_value();
                self.emit(func, Instruction::Load { result, ptr, ty: node.ty().unwrap_or(Type::Unknown) });
                IrValue::Value(result)
            }
            NodeKind::Cast { expr, target } => {
                let v = self.emit_expr(func, expr);
                let result = self.fresh_value();
                self.emit(
                    func,
                    Instruction::Cast { result, value: v, from: expr.ty().unwrap_or(Type::Unknown), to: *target },
                );
                IrValue::Value(result)
            }
            NodeKind::Call { callee, args } => self.emit_call(func, node.span, callee, args),
            NodeKind::Member { base, field } => {
                let base_ptr = self.emit_lvalue(func, base);
                let field_index = self.field_index(base.ty(), *field);
                let ptr_result = self.fresh_value();
                self.emit(func, Instruction::FieldPtr { result: ptr_result, base: base_ptr, field_index });
                let result = self.fresh_value();
                self.emit(
                    func,
                    Instruction::Load { result, ptr: IrValue::Value(ptr_result), ty: node.ty().unwrap_or(Type::Unknown) },
                );
                IrValue::Value(result)
            }
            NodeKind::Index { base, index } => {
                let base_ptr = self.emit_lvalue(func, base);
                let index_val = self.emit_expr(func, index);
                let ptr_result = self.fresh_value();
                self.emit(func, Instruction::IndexPtr { result: ptr_result, base: base_ptr, index: index_val });
                let result = self.fresh_value();
                self.emit(
                    func,
                    Instruction::Load { result, ptr: IrValue::Value(ptr_result), ty: node.ty().unwrap_or(Type::Unknown) },
                );
                IrValue::Value(result)
            }
            NodeKind::StructInit { fields, .. } => {
                // Emitted as a sequence of field stores into a fresh stack
                // slot, matching the struct-return convention note (spec
                // §4.5): either ABI can observe the same field writes.
                let slot = self.fresh_value();
                self.emit(func, Instruction::Alloca { result: slot, ty: node.ty().unwrap_or(Type::Unknown) });
                for (field, value) in fields.iter() {
                    let value_val = self.emit_expr(func, value);
                    let field_index = self.field_index(node.ty(), *field);
                    let ptr = self.fresh_value();
                    self.emit(func, Instruction::FieldPtr { result: ptr, base: IrValue::Value(slot), field_index });
                    self.emit(func, Instruction::Store { ptr: IrValue::Value(ptr), value: value_val });
                }
                IrValue::Value(slot)
            }
            NodeKind::ArrayInit(elements) => {
                let slot = self.fresh_value();
                self.emit(func, Instruction::Alloca { result: slot, ty: node.ty().unwrap_or(Type::Unknown) });
                for (i, elem) in elements.iter().enumerate() {
                    let value_val = self.emit_expr(func, elem);
                    let ptr = self.fresh_value();
                    self.emit(
                        func,
                        Instruction::IndexPtr { result: ptr, base: IrValue::Value(slot), index: IrValue::ConstInt(i as i64) },
                    );
                    self.emit(func, Instruction::Store { ptr: IrValue::Value(ptr), value: value_val });
                }
                IrValue::Value(slot)
            }
            NodeKind::EnumVariant { enum_name, variant_name } => {
                let value = self
                    .analyzed
                    .enums
                    .get(enum_name)
                    .and_then(|vs| vs.iter().find(|(v, _)| v == variant_name))
                    .map(|(_, v)| *v)
                    .unwrap_or(0);
                IrValue::ConstInt(value)
            }
            _ => IrValue::ConstInt(0),
        }
    }

    /// `a and b` / `a or b`, lowered via a branch + phi rather than a
    /// bitwise op, so `b` is genuinely unevaluated when short-circuited
    /// (spec §4.5 "Short-circuit evaluation on and/or is mandatory").
    fn emit_short_circuit(&mut self, func: &mut Function<'a>, op: BinaryOp, lhs: &'a Node<'a>, rhs: &'a Node<'a>) -> IrValue {
        let lhs_val = self.emit_expr(func, lhs);
        let lhs_block = BlockId(self.current_block as u32);
        let rhs_block = self.fresh_block(func);
        let join_block = self.fresh_block(func);

        match op {
            BinaryOp::And => self.emit(
                func,
                Instruction::CondBr { cond: lhs_val, then_block: rhs_block, else_block: join_block },
            ),
            BinaryOp::Or => self.emit(
                func,
                Instruction::CondBr { cond: lhs_val, then_block: join_block, else_block: rhs_block },
            ),
            _ => unreachable!("emit_short_circuit only called for and/or"),
        }

        self.current_block = rhs_block.0 as usize;
        let rhs_val = self.emit_expr(func, rhs);
        self.emit(func, Instruction::Br { target: join_block });

        self.current_block = join_block.0 as usize;
        let result = self.fresh_value();
        self.emit(
            func,
            Instruction::Phi { result, incoming: vec![(lhs_block, lhs_val), (rhs_block, rhs_val)] },
        );
        IrValue::Value(result)
    }

    fn emit_call(&mut self, func: &mut Function<'a>, span: Span, callee: &'a Node<'a>, args: &'a [&'a Node<'a>]) -> IrValue {
        let arg_vals: Vec<IrValue> = args.iter().map(|a| self.emit_expr(func, a)).collect();
        let callee_name = match &callee.kind {
            NodeKind::Identifier(name) => *name,
            NodeKind::Member { base, field } => {
                // Module-qualified call `Module.name(...)`: mangled at the
                // IR level (spec.md Open Question 2 — not validated by the
                // Analyzer, resolved here by name alone).
                if let NodeKind::Identifier(module) = &base.kind {
                    return self.emit_mangled_call(func, span, *module, *field, arg_vals);
                }
                self.error(span, CodegenErrorKind::NotImplemented("computed call target"));
                return IrValue::ConstInt(0);
            }
            _ => {
                self.error(span, CodegenErrorKind::NotImplemented("computed call target"));
                return IrValue::ConstInt(0);
            }
        };
        let has_return = callee
            .ty()
            .map(|t| !matches!(t, Type::Function(ret, _) if matches!(*ret, Type::Void)))
            .unwrap_or(true);
        let result = if has_return { Some(self.fresh_value()) } else { None };
        self.emit(func, Instruction::Call { result, callee: callee_name, args: arg_vals });
        result.map(IrValue::Value).unwrap_or(IrValue::ConstInt(0))
    }

    /// `Module.name(...)` is never validated by the Analyzer (spec.md Open
    /// Question 2 — resolved here by the IR builder alone). The mangled
    /// symbol `Module_name` is never interned during lexing of the call
    /// site itself, but an `@use`d extern declaration for it was — a module
    /// import brings in functions already named `Module_name` verbatim — so
    /// the match is by resolved string against every declared function
    /// rather than by a freshly interned symbol.
    fn emit_mangled_call(&mut self, func: &mut Function<'a>, span: Span, module: Symbol, name: Symbol, args: Vec<IrValue>) -> IrValue {
        let mangled = format!("{}_{}", self.interner.resolve(module), self.interner.resolve(name));
        let target = self
            .module
            .functions
            .iter()
            .find(|f| self.interner.resolve(f.name) == mangled)
            .map(|f| (f.name, matches!(f.return_type, Type::Void)));

        let Some((callee, is_void)) = target else {
            self.error(span, CodegenErrorKind::UnresolvedName(mangled));
            return IrValue::ConstInt(0);
        };

        let result = if is_void { None } else { Some(self.fresh_value()) };
        self.emit(func, Instruction::Call { result, callee, args });
        result.map(IrValue::Value).unwrap_or(IrValue::ConstInt(0))
    }
}

fn lower_binop(op: BinaryOp) -> IrBinOp {
    match op {
        BinaryOp::Add => IrBinOp::Add,
        BinaryOp::Sub => IrBinOp::Sub,
        BinaryOp::Mul => IrBinOp::Mul,
        BinaryOp::Div => IrBinOp::Div,
        BinaryOp::Rem => IrBinOp::Rem,
        BinaryOp::BitOr => IrBinOp::BitOr,
        BinaryOp::BitXor => IrBinOp::BitXor,
        BinaryOp::BitAnd => IrBinOp::BitAnd,
        BinaryOp::Shl => IrBinOp::Shl,
        BinaryOp::Shr => IrBinOp::Shr,
        BinaryOp::Eq => IrBinOp::Eq,
        BinaryOp::NotEq => IrBinOp::NotEq,
        BinaryOp::Lt => IrBinOp::Lt,
        BinaryOp::Le => IrBinOp::Le,
        BinaryOp::Gt => IrBinOp::Gt,
        BinaryOp::Ge => IrBinOp::Ge,
        BinaryOp::And | BinaryOp::Or => unreachable!("logical ops lower via emit_short_circuit"),
    }
}

/// `Type<'a>` borrows structurally through `'a`; bindings need to outlive
/// individual expression emission without threading `'a` through `Binding`
/// a second time, so primitive (non-recursive) types are widened to
/// `'static` for storage and narrowed back on read. Only ever holds
/// primitive tags in practice (struct/array bodies are accessed through
/// `node.ty()`, not through a `Binding`).
fn to_static<'a>(ty: Type<'a>) -> Type<'static> {
    match ty {
        Type::Void => Type::Void,
        Type::Bool => Type::Bool,
        Type::I8 => Type::I8,
        Type::I16 => Type::I16,
        Type::I32 => Type::I32,
        Type::I64 => Type::I64,
        Type::U8 => Type::U8,
        Type::U16 => Type::U16,
        Type::U32 => Type::U32,
        Type::U64 => Type::U64,
        Type::F32 => Type::F32,
        Type::F64 => Type::F64,
        Type::Struct(s) => Type::Struct(s),
        Type::Enum(s) => Type::Enum(s),
        Type::Named(s) => Type::Named(s),
        _ => Type::Unknown,
    }
}

fn from_static(ty: Type<'static>) -> Type<'static> {
    ty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use nullc_base::Interner;
    use nullc_lang::arena_ctx::AstStorage;
    use nullc_lang::lexer::Lexer;
    use nullc_lang::parser::Parser;

    fn build_ir(src: &str) -> Module<'static> {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(src, &mut interner).tokenize();
        let storage: AstStorage = AstStorage::new();
        let ctx = storage.context();
        let parser = Parser::new(&tokens, ctx);
        let (program, parse_errors) = parser.parse_program();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        let analyzed = Analyzer::new(ctx, &interner).analyze(program).expect("analysis should succeed");
        let builder = IrBuilder::new("test", analyzed, &interner);
        let module = builder.build(program).expect("codegen should succeed");
        unsafe { std::mem::transmute::<Module, Module<'static>>(module) }
    }

    #[test]
    fn simple_function_emits_entry_block_and_ret() {
        let module = build_ir("fn main() -> i32 do ret 0 end\n");
        let func = &module.functions[0];
        assert_eq!(func.blocks.len(), 1);
        assert!(matches!(func.blocks[0].instructions.last(), Some(Instruction::Ret { .. })));
    }

    #[test]
    fn if_statement_creates_then_else_join_blocks() {
        let module = build_ir("fn main() -> i32 do if true do ret 1 end ret 0 end\n");
        let func = &module.functions[0];
        assert!(func.blocks.len() >= 4);
        assert!(matches!(func.blocks[0].instructions.last(), Some(Instruction::CondBr { .. })));
    }

    #[test]
    fn and_lowers_to_branch_and_phi_not_bitwise() {
        let module = build_ir("fn main() -> i32 do let x :: bool = true and false\n ret 0 end\n");
        let func = &module.functions[0];
        let has_phi = func.blocks.iter().any(|b| b.instructions.iter().any(|i| matches!(i, Instruction::Phi { .. })));
        let has_bitand = func.blocks.iter().any(|b| {
            b.instructions
                .iter()
                .any(|i| matches!(i, Instruction::BinOp { op: IrBinOp::BitAnd, .. }))
        });
        assert!(has_phi);
        assert!(!has_bitand);
    }

    #[test]
    fn module_qualified_call_resolves_mangled_name() {
        let module = build_ir(
            "@extern do\n fn Math_add(a :: i64, b :: i64) -> i64 end\n end\n\
             fn main() -> i32 do let x = Math.add(1, 2)\n ret 0 end\n",
        );
        let main = module.functions.iter().find(|f| !f.is_extern).expect("main");
        let callee = module.functions.iter().find(|f| f.is_extern).expect("extern decl").name;
        let calls_extern = main.blocks.iter().any(|b| {
            b.instructions
                .iter()
                .any(|i| matches!(i, Instruction::Call { callee: c, .. } if *c == callee))
        });
        assert!(calls_extern, "Module.name(...) call should resolve to the mangled extern symbol");
    }

    #[test]
    fn for_loop_lowers_to_header_body_exit_blocks() {
        let module = build_ir("fn main() -> i32 do for i in 0..5 do end ret 0 end\n");
        let func = &module.functions[0];
        assert!(func.blocks.len() >= 3);
    }

    #[test]
    fn break_in_while_branches_to_exit_block_not_error() {
        let module = build_ir(
            "fn main() -> i32 do let i = 0\n while i < 10 do if i == 3 do break end let i = i + 1 end ret 0 end\n",
        );
        let func = &module.functions[0];
        let br_count = func
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| matches!(i, Instruction::Br { .. }))
            .count();
        assert!(br_count > 0, "break should lower to an unconditional Br, not a codegen error");
    }

    #[test]
    fn continue_in_for_branches_to_inc_block() {
        let module = build_ir("fn main() -> i32 do for i in 0..5 do if i == 1 do continue end end ret 0 end\n");
        let func = &module.functions[0];
        // four loop blocks (header/body/inc/exit) plus the entry block, at minimum.
        assert!(func.blocks.len() >= 5);
        let br_targets: Vec<u32> = func
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| match i {
                Instruction::Br { target } => Some(target.0),
                _ => None,
            })
            .collect();
        assert!(!br_targets.is_empty());
    }

    #[test]
    fn struct_field_write_uses_declared_index_not_initializer_order() {
        let module = build_ir(
            "struct Point do x :: i64\n y :: i64\n end\n\
             fn main() -> i32 do let p = Point { y = 2, x = 1 }\n ret 0 end\n",
        );
        let func = &module.functions[0];
        let field_indices: Vec<u32> = func
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| match i {
                Instruction::FieldPtr { field_index, .. } => Some(*field_index),
                _ => None,
            })
            .collect();
        // literal order is y, x — declared order is x (0), y (1) — the
        // emitted field_index values must follow declared order.
        assert_eq!(field_indices, vec![1, 0]);
    }

    #[test]
    fn module_display_produces_textual_dump() {
        let module = build_ir("fn main() -> i32 do ret 0 end\n");
        let dump = module.to_string();
        assert!(dump.contains("module test"));
        assert!(dump.contains("bb0"));
    }
}
