//! Tree-walking evaluator.
//!
//! A second back end that interprets the typed AST directly rather than
//! lowering it to the SSA IR. It exists so the pipeline has a fast,
//! dependency-free execution path and a differential oracle to check the IR
//! builder's semantics against: for every program that type-checks and has
//! no runtime undefined behavior, this evaluator and the lowered
//! [`crate::ir`] output must return the same integer exit value.
//!
//! Control flow within a single function body is three flags rather than a
//! propagated signal: `has_return`, `has_break`, `has_continue`, checked at
//! every statement-list boundary so execution unwinds promptly. `exit()` is
//! the one control transfer that must cross function boundaries, so it
//! alone travels as an [`EvalFlow::Exit`] through the ordinary `Result`
//! channel instead.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use nullc_base::{Interner, Symbol};
use nullc_lang::ast::{BinaryOp, Mutability, Node, NodeKind, Type, UnaryOp};

use crate::analyzer::AnalyzedProgram;

/// A runtime value. Arrays and structs are reference-counted so that member
/// and index *assignment* (spec: "must work as statements *and* as
/// expressions yielding `v`") can mutate shared storage the way a stack slot
/// would in the IR backend, without the evaluator growing its own notion of
/// pointers.
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(Rc<std::cell::RefCell<Vec<Value>>>),
    Struct(Rc<std::cell::RefCell<HashMap<Symbol, Value>>>),
}

impl Value {
    fn truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    fn as_int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            Value::Bool(b) => *b as i64,
            other => panic!("evaluator: expected int, found {other:?}"),
        }
    }

    fn as_float(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            Value::Int(v) => *v as f64,
            other => panic!("evaluator: expected float, found {other:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Struct(fields) => write!(f, "<struct, {} fields>", fields.borrow().len()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RuntimeErrorKind {
    UndefinedVariable(String),
    InvalidArrayIndex(i64),
    InvalidMemberAccess(String),
    BreakOutsideLoop,
    ContinueOutsideLoop,
    NotCallable(String),
    DivisionByZero,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedVariable(n) => write!(f, "undefined variable '{n}'"),
            Self::InvalidArrayIndex(i) => write!(f, "array index {i} out of bounds"),
            Self::InvalidMemberAccess(n) => write!(f, "no such field '{n}'"),
            Self::BreakOutsideLoop => write!(f, "break outside loop"),
            Self::ContinueOutsideLoop => write!(f, "continue outside loop"),
            Self::NotCallable(n) => write!(f, "'{n}' is not callable"),
            Self::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime error: {}", self.kind)
    }
}

impl std::error::Error for RuntimeError {}

/// Everything that can interrupt evaluation other than the three in-function
/// flags: a genuine error, or a process-wide `exit(code)` unwinding straight
/// out of the whole call stack.
enum EvalFlow {
    Error(RuntimeError),
    Exit(i32),
}

impl From<RuntimeError> for EvalFlow {
    fn from(e: RuntimeError) -> Self {
        EvalFlow::Error(e)
    }
}

type EvalResult<T> = Result<T, EvalFlow>;

fn err<T>(kind: RuntimeErrorKind) -> EvalResult<T> {
    Err(EvalFlow::Error(RuntimeError { kind }))
}

/// A lexical scope mapping names to mutable value slots. Mutability is
/// enforced here too (spec: "variable mutability is enforced at the
/// evaluator level as well"), independent of whatever the Analyzer already
/// checked — the evaluator does not trust the analyzer ran.
struct EvalScope {
    vars: HashMap<Symbol, (Value, bool)>,
}

impl EvalScope {
    fn new() -> Self {
        Self { vars: HashMap::new() }
    }
}

/// The built-in host bindings the evaluator recognizes before resolving
/// against user-declared functions. The IR backend links the same names
/// against the C runtime; here they are implemented directly.
const BUILTIN_NAMES: &[&str] = &[
    "puts",
    "print",
    "io_print",
    "printf",
    "print_raw",
    "print_int",
    "println",
    "putchar",
    "getchar",
    "exit",
];

pub struct Evaluator<'a> {
    analyzed: &'a AnalyzedProgram<'a>,
    interner: &'a Interner,
    functions: HashMap<Symbol, &'a Node<'a>>,
    scopes: Vec<EvalScope>,
    has_return: bool,
    has_break: bool,
    has_continue: bool,
    return_value: Value,
    stdout: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(analyzed: &'a AnalyzedProgram<'a>, interner: &'a Interner, program: &'a Node<'a>) -> Self {
        let mut functions = HashMap::new();
        let NodeKind::Program(decls) = &program.kind else {
            panic!("Evaluator::new called on a non-Program node");
        };
        for decl in decls.iter() {
            collect_functions(decl, &mut functions);
        }
        Self {
            analyzed,
            interner,
            functions,
            scopes: vec![EvalScope::new()],
            has_return: false,
            has_break: false,
            has_continue: false,
            return_value: Value::Void,
            stdout: String::new(),
        }
    }

    /// Output the evaluated program wrote via `puts`/`print`/`println` etc.
    /// Exposed so tests and the CLI can read it without the evaluator
    /// writing straight to the real process stream (keeps it unit-testable,
    /// and lets the CLI flush it only once the run actually succeeds).
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Runs `main` (or, failing that, `__repl_main__`, used by the REPL
    /// front end) and returns its integer return value, 0 if it returned
    /// non-integer or void.
    pub fn run_entry(&mut self) -> Result<i32, RuntimeError> {
        let main_sym = self.interner.lookup("main");
        let repl_sym = self.interner.lookup("__repl_main__");
        let entry = main_sym
            .and_then(|s| self.functions.get(&s).copied())
            .or_else(|| repl_sym.and_then(|s| self.functions.get(&s).copied()));

        let Some(entry) = entry else {
            return Ok(0);
        };
        match self.call_function(entry, Vec::new()) {
            Ok(v) => Ok(match v {
                Value::Int(i) => i as i32,
                _ => 0,
            }),
            Err(EvalFlow::Error(e)) => Err(e),
            Err(EvalFlow::Exit(code)) => Ok(code),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(EvalScope::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: Symbol, value: Value, mutable: bool) {
        self.scopes.last_mut().unwrap().vars.insert(name, (value, mutable));
    }

    fn lookup(&self, name: Symbol) -> Option<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some((v, _)) = scope.vars.get(&name) {
                return Some(v.clone());
            }
        }
        None
    }

    fn assign_var(&mut self, name: Symbol, value: Value) -> EvalResult<()> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.vars.get_mut(&name) {
                slot.0 = value;
                return Ok(());
            }
        }
        err(RuntimeErrorKind::UndefinedVariable(self.interner.resolve(name).to_string()))
    }

    fn call_function(&mut self, decl: &'a Node<'a>, args: Vec<Value>) -> EvalResult<Value> {
        let NodeKind::FnDecl { params, body, .. } = &decl.kind else {
            unreachable!("functions table only ever holds FnDecl nodes");
        };
        let Some(body) = body else {
            // `@extern` declaration with no interpretable body. Reaching
            // here means a user program called a non-builtin extern
            // function directly under `interp` — not meaningful without a
            // host ABI, so it evaluates to void rather than erroring.
            return Ok(Value::Void);
        };

        self.push_scope();
        for (param, arg) in params.iter().zip(args.into_iter()) {
            if let NodeKind::Param { name, .. } = &param.kind {
                self.declare(*name, arg, true);
            }
        }

        let prior_return = std::mem::replace(&mut self.has_return, false);
        let prior_return_value = std::mem::replace(&mut self.return_value, Value::Void);

        let result = self.exec_block_stmts(block_stmts(body));

        let returned = std::mem::replace(&mut self.return_value, prior_return_value);
        self.has_return = prior_return;
        self.pop_scope();

        result?;
        Ok(returned)
    }

    fn exec_block_stmts(&mut self, stmts: &'a [&'a Node<'a>]) -> EvalResult<()> {
        for stmt in stmts.iter() {
            self.exec_stmt(stmt)?;
            if self.has_return || self.has_break || self.has_continue {
                break;
            }
        }
        Ok(())
    }

    fn exec_stmt(&mut self, node: &'a Node<'a>) -> EvalResult<()> {
        match &node.kind {
            NodeKind::VarDecl { name, init, .. } => {
                let value = self.eval_expr(init)?;
                let mutable = matches!(var_mutability(node), Mutability::Mut);
                self.declare(*name, value, mutable);
            }
            NodeKind::Block(stmts) => {
                self.push_scope();
                let r = self.exec_block_stmts(stmts);
                self.pop_scope();
                r?;
            }
            NodeKind::Return(value) => {
                self.return_value = match value {
                    Some(v) => self.eval_expr(v)?,
                    None => Value::Void,
                };
                self.has_return = true;
            }
            NodeKind::Break => self.has_break = true,
            NodeKind::Continue => self.has_continue = true,
            NodeKind::If { cond, then_block, else_branch } => {
                if self.eval_expr(cond)?.truthy() {
                    self.exec_stmt(then_block)?;
                } else if let Some(else_node) = else_branch {
                    self.exec_stmt(else_node)?;
                }
            }
            NodeKind::While { cond, body } => {
                while self.eval_expr(cond)?.truthy() {
                    self.exec_stmt(body)?;
                    if self.has_return {
                        break;
                    }
                    if self.has_break {
                        self.has_break = false;
                        break;
                    }
                    if self.has_continue {
                        self.has_continue = false;
                    }
                }
            }
            NodeKind::For { var, start, end, body } => {
                let start_v = self.eval_expr(start)?.as_int();
                let end_v = self.eval_expr(end)?.as_int();
                self.push_scope();
                self.declare(*var, Value::Int(start_v), true);
                let mut i = start_v;
                while i < end_v {
                    self.assign_var(*var, Value::Int(i))?;
                    self.exec_stmt(body)?;
                    if self.has_return {
                        break;
                    }
                    if self.has_break {
                        self.has_break = false;
                        break;
                    }
                    if self.has_continue {
                        self.has_continue = false;
                    }
                    i += 1;
                }
                self.pop_scope();
            }
            NodeKind::ExprStmt(expr) => {
                self.eval_expr(expr)?;
            }
            NodeKind::Assign { target, value } => {
                let v = self.eval_expr(value)?;
                self.eval_assign(target, v)?;
            }
            other => unreachable!("not a statement node: {other:?}"),
        }
        Ok(())
    }

    fn eval_assign(&mut self, target: &'a Node<'a>, value: Value) -> EvalResult<Value> {
        match &target.kind {
            NodeKind::Identifier(name) => {
                self.assign_var(*name, value.clone())?;
                Ok(value)
            }
            NodeKind::Member { base, field } => {
                let Value::Struct(fields) = self.eval_expr(base)? else {
                    return err(RuntimeErrorKind::InvalidMemberAccess(self.interner.resolve(*field).to_string()));
                };
                fields.borrow_mut().insert(*field, value.clone());
                Ok(value)
            }
            NodeKind::Index { base, index } => {
                let Value::Array(items) = self.eval_expr(base)? else {
                    return err(RuntimeErrorKind::InvalidArrayIndex(0));
                };
                let idx = self.eval_expr(index)?.as_int();
                let mut items = items.borrow_mut();
                if idx < 0 || idx as usize >= items.len() {
                    return err(RuntimeErrorKind::InvalidArrayIndex(idx));
                }
                items[idx as usize] = value.clone();
                Ok(value)
            }
            other => unreachable!("not a valid assignment target: {other:?}"),
        }
    }

    fn eval_expr(&mut self, node: &'a Node<'a>) -> EvalResult<Value> {
        match &node.kind {
            NodeKind::IntLiteral(v) => Ok(Value::Int(*v)),
            NodeKind::FloatLiteral(v) => Ok(Value::Float(*v)),
            NodeKind::BoolLiteral(v) => Ok(Value::Bool(*v)),
            NodeKind::StringLiteral(s) => Ok(Value::Str(Rc::from(*s))),
            NodeKind::Identifier(name) => match self.lookup(*name) {
                Some(v) => Ok(v),
                None => err(RuntimeErrorKind::UndefinedVariable(self.interner.resolve(*name).to_string())),
            },
            NodeKind::Assign { target, value } => {
                let v = self.eval_expr(value)?;
                self.eval_assign(target, v)
            }
            NodeKind::Unary { op, operand } => self.eval_unary(*op, operand),
            NodeKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            NodeKind::Cast { expr, target } => self.eval_cast(expr, *target),
            NodeKind::Call { callee, args } => self.eval_call(callee, args),
            NodeKind::Member { base, field } => {
                let v = self.eval_expr(base)?;
                match v {
                    Value::Struct(fields) => match fields.borrow().get(field).cloned() {
                        Some(v) => Ok(v),
                        None => err(RuntimeErrorKind::InvalidMemberAccess(self.interner.resolve(*field).to_string())),
                    },
                    _ => err(RuntimeErrorKind::InvalidMemberAccess(self.interner.resolve(*field).to_string())),
                }
            }
            NodeKind::Index { base, index } => {
                let v = self.eval_expr(base)?;
                let idx = self.eval_expr(index)?.as_int();
                match v {
                    Value::Array(items) => {
                        let items = items.borrow();
                        if idx < 0 || idx as usize >= items.len() {
                            return err(RuntimeErrorKind::InvalidArrayIndex(idx));
                        }
                        Ok(items[idx as usize].clone())
                    }
                    _ => err(RuntimeErrorKind::InvalidArrayIndex(idx)),
                }
            }
            NodeKind::StructInit { fields, .. } => {
                let mut map = HashMap::new();
                for (name, expr) in fields.iter() {
                    let v = self.eval_expr(expr)?;
                    map.insert(*name, v);
                }
                Ok(Value::Struct(Rc::new(std::cell::RefCell::new(map))))
            }
            NodeKind::ArrayInit(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for e in elements.iter() {
                    items.push(self.eval_expr(e)?);
                }
                Ok(Value::Array(Rc::new(std::cell::RefCell::new(items))))
            }
            NodeKind::EnumVariant { enum_name, variant_name } => {
                let variants = self.analyzed.enums.get(enum_name);
                let value = variants
                    .and_then(|vs| vs.iter().find(|(n, _)| n == variant_name))
                    .map(|(_, v)| *v)
                    .unwrap_or(0);
                Ok(Value::Int(value))
            }
            other => unreachable!("not an expression node: {other:?}"),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &'a Node<'a>) -> EvalResult<Value> {
        let v = self.eval_expr(operand)?;
        Ok(match op {
            UnaryOp::Neg => match v {
                Value::Int(i) => Value::Int(i.wrapping_neg()),
                Value::Float(f) => Value::Float(-f),
                _ => v,
            },
            UnaryOp::Not => Value::Bool(!v.truthy()),
            UnaryOp::BitNot => Value::Int(!v.as_int()),
            // `&`/`*` have no observable effect on the evaluator's
            // by-value runtime model; they exist for the IR backend's
            // pointer-shaped slots. The evaluator passes the operand value
            // through unchanged so both back ends agree on the program's
            // final integer result even though they disagree on what a
            // pointer *is*.
            UnaryOp::AddrOf | UnaryOp::Deref => v,
        })
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &'a Node<'a>, rhs: &'a Node<'a>) -> EvalResult<Value> {
        // Short-circuit: evaluating `false and e` must never evaluate `e`,
        // and `true or e` must never evaluate `e` either.
        if op == BinaryOp::And {
            let l = self.eval_expr(lhs)?;
            if !l.truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(self.eval_expr(rhs)?.truthy()));
        }
        if op == BinaryOp::Or {
            let l = self.eval_expr(lhs)?;
            if l.truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(self.eval_expr(rhs)?.truthy()));
        }

        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        self.apply_binary(op, l, r)
    }

    fn apply_binary(&self, op: BinaryOp, l: Value, r: Value) -> EvalResult<Value> {
        let is_float = matches!(l, Value::Float(_)) || matches!(r, Value::Float(_));
        if is_float && matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div) {
            let (a, b) = (l.as_float(), r.as_float());
            return Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => unreachable!(),
            }));
        }
        if is_float && op.is_comparison() {
            let (a, b) = (l.as_float(), r.as_float());
            return Ok(Value::Bool(match op {
                BinaryOp::Eq => a == b,
                BinaryOp::NotEq => a != b,
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => unreachable!(),
            }));
        }
        if let (Value::Str(a), Value::Str(b)) = (&l, &r) {
            return match op {
                BinaryOp::Eq => Ok(Value::Bool(a == b)),
                BinaryOp::NotEq => Ok(Value::Bool(a != b)),
                BinaryOp::Add => Ok(Value::Str(Rc::from(format!("{a}{b}").as_str()))),
                _ => err(RuntimeErrorKind::NotCallable("string operator".into())),
            };
        }

        let (a, b) = (l.as_int(), r.as_int());
        Ok(match op {
            BinaryOp::Add => Value::Int(a.wrapping_add(b)),
            BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
            BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
            BinaryOp::Div => {
                if b == 0 {
                    return err(RuntimeErrorKind::DivisionByZero);
                }
                Value::Int(a.wrapping_div(b))
            }
            BinaryOp::Rem => {
                if b == 0 {
                    return err(RuntimeErrorKind::DivisionByZero);
                }
                Value::Int(a.wrapping_rem(b))
            }
            BinaryOp::BitOr => Value::Int(a | b),
            BinaryOp::BitXor => Value::Int(a ^ b),
            BinaryOp::BitAnd => Value::Int(a & b),
            BinaryOp::Shl => Value::Int(a.wrapping_shl(b as u32)),
            BinaryOp::Shr => Value::Int(a.wrapping_shr(b as u32)),
            BinaryOp::Eq => Value::Bool(a == b),
            BinaryOp::NotEq => Value::Bool(a != b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled by eval_binary's short-circuit path"),
        })
    }

    fn eval_cast(&mut self, expr: &'a Node<'a>, target: Type<'a>) -> EvalResult<Value> {
        let v = self.eval_expr(expr)?;
        Ok(match target {
            Type::F32 | Type::F64 => Value::Float(v.as_float()),
            Type::Bool => Value::Bool(v.truthy()),
            _ if target.is_integer() => Value::Int(v.as_int()),
            _ => v,
        })
    }

    fn eval_call(&mut self, callee: &'a Node<'a>, args: &'a [&'a Node<'a>]) -> EvalResult<Value> {
        let mut values = Vec::with_capacity(args.len());
        for a in args.iter() {
            values.push(self.eval_expr(a)?);
        }

        // A `Module.name(...)` call resolves by its final segment only —
        // mirroring the IR builder's `Module_name` mangling. The analyzer
        // deliberately leaves calls via `Module.name` unvalidated.
        let name = match &callee.kind {
            NodeKind::Identifier(name) => *name,
            NodeKind::Member { field, .. } => *field,
            _ => return err(RuntimeErrorKind::NotCallable("<expr>".into())),
        };

        if let Some(builtin) = self.try_builtin(name, &values)? {
            return Ok(builtin);
        }

        let Some(decl) = self.functions.get(&name).copied() else {
            return err(RuntimeErrorKind::NotCallable(self.interner.resolve(name).to_string()));
        };
        self.call_function(decl, values)
    }

    /// Returns `Ok(Some(value))` if `name` is a recognized builtin,
    /// `Ok(None)` if it isn't (so the caller falls through to user-function
    /// resolution), or `Err(EvalFlow::Exit(code))` for `exit`.
    fn try_builtin(&mut self, name: Symbol, args: &[Value]) -> EvalResult<Option<Value>> {
        let resolved = self.interner.resolve(name);
        if !BUILTIN_NAMES.contains(&resolved) {
            return Ok(None);
        }
        Ok(Some(match resolved {
            "puts" | "print" | "io_print" | "println" => {
                if let Some(v) = args.first() {
                    self.stdout.push_str(&v.to_string());
                }
                if resolved != "print" {
                    self.stdout.push('\n');
                }
                Value::Int(0)
            }
            "printf" | "print_raw" => {
                if let Some(v) = args.first() {
                    self.stdout.push_str(&v.to_string());
                }
                Value::Int(0)
            }
            "print_int" => {
                if let Some(Value::Int(i)) = args.first() {
                    self.stdout.push_str(&i.to_string());
                }
                Value::Int(0)
            }
            "putchar" => {
                if let Some(v) = args.first() {
                    let code = v.as_int();
                    if let Some(c) = char::from_u32(code as u32) {
                        self.stdout.push(c);
                    }
                }
                Value::Int(0)
            }
            "getchar" => Value::Int(-1),
            "exit" => {
                let code = args.first().map(|v| v.as_int() as i32).unwrap_or(0);
                return Err(EvalFlow::Exit(code));
            }
            _ => Value::Void,
        }))
    }
}

fn var_mutability(node: &Node) -> Mutability {
    match &node.kind {
        NodeKind::VarDecl { mutability, .. } => *mutability,
        _ => Mutability::Let,
    }
}

fn block_stmts<'a>(node: &'a Node<'a>) -> &'a [&'a Node<'a>] {
    match &node.kind {
        NodeKind::Block(stmts) => stmts,
        _ => &[],
    }
}

fn collect_functions<'a>(node: &'a Node<'a>, out: &mut HashMap<Symbol, &'a Node<'a>>) {
    match &node.kind {
        NodeKind::FnDecl { name, .. } => {
            out.insert(*name, node);
        }
        NodeKind::Extern(decls) => {
            for d in decls.iter() {
                collect_functions(d, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_base::Interner;
    use nullc_lang::arena_ctx::AstStorage;
    use nullc_lang::lexer::Lexer;
    use nullc_lang::parser::Parser;

    fn run(source: &str) -> (i32, String) {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new(source, &mut interner).tokenize();
        let storage: AstStorage = AstStorage::new();
        let ctx = storage.context();
        let parser = Parser::new(&tokens, ctx);
        let (program, errors) = parser.parse_program();
        assert!(errors.is_empty(), "parse errors: {errors:?}");

        let analyzer = crate::analyzer::Analyzer::new(ctx, &interner);
        let analyzed = analyzer.analyze(program).expect("analysis errors");

        let mut evaluator = Evaluator::new(&analyzed, &interner, program);
        let code = evaluator.run_entry().expect("runtime error");
        (code, evaluator.stdout().to_string())
    }

    #[test]
    fn value_display_formats_primitives() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Void.to_string(), "void");
    }

    #[test]
    fn truthy_only_true_on_bool_true() {
        assert!(Value::Bool(true).truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Int(1).truthy());
    }

    #[test]
    fn for_range_is_half_open() {
        let (code, _) = run("fn main() -> i32 do mut s :: i64 = 0 for i in 0..5 do s = s + i end ret s end");
        assert_eq!(code, 10);
    }

    #[test]
    fn short_circuit_and_skips_rhs() {
        let src = "fn trap() -> bool do ret (1/0) == 0 end\nfn main() -> i32 do if false and trap() do ret 1 end ret 0 end";
        let (code, _) = run(src);
        assert_eq!(code, 0);
    }

    #[test]
    fn struct_field_order_is_by_declared_name() {
        let src = "struct Point do x :: i64 y :: i64 end\nfn main() -> i32 do let p = Point { y = 10, x = 5 } ret (p.x - 5) + (p.y - 10) end";
        let (code, _) = run(src);
        assert_eq!(code, 0);
    }
}
