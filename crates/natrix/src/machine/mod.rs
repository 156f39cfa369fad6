//! The CSE (Control–Stash–Environment) machine.
//!
//! A small-step evaluator over three structures: the Control stack of
//! pending work (AST nodes and instructions), the Stash stack of produced
//! values, and the chain of lexical frames. One iteration of the main
//! loop processes exactly one control item; scheduling is single-threaded
//! and cooperative, with an optional step budget.

pub(crate) mod control;
pub(crate) mod environment;
pub(crate) mod operators;

use std::rc::Rc;

use self::{
    control::{BinOp, BranchTarget, ControlItem, Instruction},
    environment::{Closure, ClosureBody, ClosureId, Closures, EnvId, Environments},
};
use crate::{
    ast::{Block, BoolOperator, Expr, ExprRef, Identifier, Module, Stmt, StmtKind, local_declarations},
    builtins,
    errors::{Error, ErrorKind, EvalResult},
    io::IoHandler,
    modules::{ForeignFunctions, marshal_from_host, marshal_to_host},
    run::EvalOptions,
    token::CodeRange,
    value::Value,
};

/// Persistent interpreter state: the environment, closure, and foreign
/// function arenas, the active frame stack, and the step counter.
///
/// A context outlives individual chunks, which is how a REPL session
/// accumulates definitions.
#[derive(Debug)]
pub(crate) struct Context {
    pub envs: Environments,
    pub closures: Closures,
    pub foreigns: ForeignFunctions,
    /// Active frames; the top is the current lexical frame and the
    /// bottom is always the global frame.
    pub env_stack: Vec<EnvId>,
    pub global_env: EnvId,
    /// Machine steps executed so far (prelude chunks excluded).
    pub steps: u64,
}

impl Context {
    /// Creates a context whose global frame is seeded with the builtins
    /// and the `math_*` constants.
    pub fn new() -> Self {
        let mut envs = Environments::new();
        let global_env = envs.new_frame("<module>", None, None, None);
        for (name, value) in builtins::global_bindings() {
            envs.get_mut(global_env).bindings.insert(name.to_owned(), value);
        }
        Self {
            envs,
            closures: Closures::default(),
            foreigns: ForeignFunctions::default(),
            env_stack: vec![global_env],
            global_env,
            steps: 0,
        }
    }

    pub fn current_env(&self) -> EnvId {
        *self.env_stack.last().expect("environment stack is never empty")
    }

    /// Names visible in the global frame, for resolving later chunks.
    pub fn global_names(&self) -> Vec<String> {
        self.envs.get(self.global_env).bindings.keys().cloned().collect()
    }

    /// Drops any frames left active by an aborted chunk.
    pub fn unwind_to_global(&mut self) {
        self.env_stack.truncate(1);
    }
}

/// One chunk's evaluation: borrows the persistent context, an IO handler,
/// and the options; owns the Control and Stash.
pub(crate) struct Machine<'a, Io: IoHandler> {
    ctx: &'a mut Context,
    io: &'a mut Io,
    options: &'a EvalOptions,
    control: Vec<ControlItem>,
    stash: Vec<Value>,
}

impl<'a, Io: IoHandler> Machine<'a, Io> {
    pub fn new(ctx: &'a mut Context, io: &'a mut Io, options: &'a EvalOptions) -> Self {
        Self {
            ctx,
            io,
            options,
            control: Vec::new(),
            stash: Vec::new(),
        }
    }

    /// Runs a resolved module to completion.
    ///
    /// The returned value is the stash top after the control drains: the
    /// value of the chunk's final expression statement, or `Undefined`.
    pub fn run(&mut self, module: &Module) -> EvalResult<Value> {
        self.push_block(&module.body, true);
        while let Some(item) = self.control.pop() {
            self.count_step(&item)?;
            match item {
                ControlItem::Stmt(stmt) => self.step_stmt(&stmt)?,
                ControlItem::Expr(expr) => self.step_expr(&expr)?,
                ControlItem::Instr(instr) => self.step_instr(instr)?,
            }
        }
        Ok(self.stash.pop().unwrap_or(Value::Undefined))
    }

    /// Counts one step against the budget, unless this is a prelude run.
    fn count_step(&mut self, item: &ControlItem) -> EvalResult<()> {
        if self.options.is_prelude {
            return Ok(());
        }
        self.ctx.steps += 1;
        if self.options.step_limit > 0 && self.ctx.steps > self.options.step_limit {
            return Err(Error::new(
                ErrorKind::StepLimitExceededError,
                "Step limit exceeded",
                item_range(item),
            ));
        }
        Ok(())
    }

    // === statement dispatch ===

    fn step_stmt(&mut self, stmt: &Rc<Stmt>) -> EvalResult<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.control.push(ControlItem::Expr(Rc::clone(expr))),
            StmtKind::Assign { name, value } | StmtKind::AnnAssign { name, value, .. } => {
                self.control.push(ControlItem::Instr(Instruction::Assign {
                    name: name.name.clone(),
                    range: name.range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(value)));
            }
            StmtKind::FunctionDef { name, params, body } => {
                // Definition is immediate: build the closure over the
                // current frame and bind its name, no instruction needed.
                let closure_id = self.make_closure(&name.name, params, ClosureBody::Block(body.clone()));
                let env = self.ctx.current_env();
                self.ctx
                    .envs
                    .get_mut(env)
                    .bindings
                    .insert(name.name.clone(), Value::Closure(closure_id));
            }
            StmtKind::Return(value) => {
                self.pop_to_function_boundary(stmt.range)?;
                match value {
                    Some(expr) => self.control.push(ControlItem::Expr(Rc::clone(expr))),
                    None => self.stash.push(Value::Undefined),
                }
            }
            StmtKind::If { test, body, orelse } => {
                self.control.push(ControlItem::Instr(Instruction::Branch {
                    consequent: BranchTarget::Block(body.clone()),
                    alternate: orelse.clone().map(BranchTarget::Block),
                    range: stmt.range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(test)));
            }
            StmtKind::While { test, body } => {
                self.control.push(ControlItem::Instr(Instruction::WhileLoop {
                    test: Rc::clone(test),
                    body: body.clone(),
                    range: stmt.range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(test)));
            }
            StmtKind::For { iter, .. } => {
                self.control
                    .push(ControlItem::Instr(Instruction::ForLoop { range: stmt.range }));
                self.control.push(ControlItem::Expr(Rc::clone(iter)));
            }
            StmtKind::Pass | StmtKind::FromImport { .. } => {}
            StmtKind::Break => self.pop_to_loop(stmt.range)?,
            StmtKind::Continue => self.pop_to_loop_marker(stmt.range)?,
            StmtKind::Assert(expr) => {
                self.control
                    .push(ControlItem::Instr(Instruction::Assert { range: stmt.range }));
                self.control.push(ControlItem::Expr(Rc::clone(expr)));
            }
            StmtKind::Global(name) => {
                let env = self.ctx.current_env();
                self.ctx.envs.get_mut(env).globals.insert(name.name.clone());
            }
            StmtKind::NonLocal(name) => {
                let env = self.ctx.current_env();
                self.ctx.envs.get_mut(env).nonlocals.insert(name.name.clone());
            }
        }
        Ok(())
    }

    // === expression dispatch ===

    fn step_expr(&mut self, expr: &ExprRef) -> EvalResult<()> {
        match &expr.expr {
            Expr::None => self.stash.push(Value::Undefined),
            Expr::Bool(b) => self.stash.push(Value::Bool(*b)),
            Expr::Float(f) => self.stash.push(Value::Float(*f)),
            Expr::Int(i) => self.stash.push(Value::Int(i.clone())),
            Expr::Complex(z) => self.stash.push(Value::Complex(*z)),
            Expr::Str(s) => self.stash.push(Value::Str(Rc::from(s.as_str()))),
            Expr::Name(ident) => {
                let value = self.lookup_name(ident)?;
                self.stash.push(value);
            }
            Expr::Grouping(inner) => self.control.push(ControlItem::Expr(Rc::clone(inner))),
            Expr::Unary { op, operand } => {
                self.control.push(ControlItem::Instr(Instruction::UnaryOp {
                    op: *op,
                    range: expr.range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(operand)));
            }
            Expr::Binary {
                left,
                op,
                op_range,
                right,
            } => {
                self.control.push(ControlItem::Instr(Instruction::BinaryOp {
                    op: BinOp::Arith(*op),
                    range: *op_range,
                }));
                // Right beneath the instruction, left on top: left first.
                self.control.push(ControlItem::Expr(Rc::clone(right)));
                self.control.push(ControlItem::Expr(Rc::clone(left)));
            }
            Expr::Compare {
                left,
                op,
                op_range,
                right,
            } => {
                self.control.push(ControlItem::Instr(Instruction::BinaryOp {
                    op: BinOp::Cmp(*op),
                    range: *op_range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(right)));
                self.control.push(ControlItem::Expr(Rc::clone(left)));
            }
            Expr::BoolOp { left, op, right } => {
                // Short-circuit: only the left operand is scheduled; the
                // instruction holds the right one unevaluated.
                self.control.push(ControlItem::Instr(Instruction::BoolOp {
                    op: *op,
                    right: Rc::clone(right),
                    range: expr.range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(left)));
            }
            Expr::Ternary { test, body, orelse } => {
                self.control.push(ControlItem::Instr(Instruction::Branch {
                    consequent: BranchTarget::Expr(Rc::clone(body)),
                    alternate: Some(BranchTarget::Expr(Rc::clone(orelse))),
                    range: expr.range,
                }));
                self.control.push(ControlItem::Expr(Rc::clone(test)));
            }
            Expr::Call { callee, args } => {
                self.control.push(ControlItem::Instr(Instruction::Apply {
                    argc: args.len(),
                    range: expr.range,
                }));
                // Callee evaluates first, then arguments left to right.
                for arg in args.iter().rev() {
                    self.control.push(ControlItem::Expr(Rc::clone(arg)));
                }
                self.control.push(ControlItem::Expr(Rc::clone(callee)));
            }
            Expr::Lambda { params, body } => {
                let closure_id = self.make_closure("<lambda>", params, ClosureBody::Expr(Rc::clone(body)));
                self.stash.push(Value::Closure(closure_id));
            }
        }
        Ok(())
    }

    /// Resolves a name against the frame chain.
    ///
    /// A name the owning closure assigns somewhere but which is missing
    /// from the current frame is an `UnboundLocalError` even when an
    /// outer frame binds it; that is Python's assigned-later rule.
    fn lookup_name(&self, ident: &Identifier) -> EvalResult<Value> {
        let current = self.ctx.current_env();
        let frame = self.ctx.envs.get(current);
        if let Some(closure_id) = frame.closure {
            let closure = self.ctx.closures.get(closure_id);
            if closure.local_variables.contains(&ident.name)
                && !frame.bindings.contains_key(&ident.name)
                && !frame.globals.contains(&ident.name)
                && !frame.nonlocals.contains(&ident.name)
            {
                return Err(Error::new(
                    ErrorKind::UnboundLocalError,
                    format!(
                        "cannot access local variable '{}' where it is not associated with a value",
                        ident.name
                    ),
                    ident.range,
                ));
            }
        }
        match self.ctx.envs.lookup(current, &ident.name) {
            Some(value) => Ok(value.clone()),
            None => Err(Error::new(
                ErrorKind::NameError,
                format!("name '{}' is not defined", ident.name),
                ident.range,
            )),
        }
    }

    // === instruction dispatch ===

    fn step_instr(&mut self, instr: Instruction) -> EvalResult<()> {
        match instr {
            Instruction::UnaryOp { op, range } => {
                let value = self.pop_stash();
                let result = operators::unary_op(op, &value, range)?;
                self.stash.push(result);
            }
            Instruction::BinaryOp { op, range } => {
                let right = self.pop_stash();
                let left = self.pop_stash();
                let result = operators::binary_op(op, &left, &right, range)?;
                self.stash.push(result);
            }
            Instruction::BoolOp { op, right, .. } => {
                let left = self.pop_stash();
                let decided = match op {
                    BoolOperator::Or => left.is_truthy(),
                    BoolOperator::And => !left.is_truthy(),
                };
                if decided {
                    self.stash.push(left);
                } else {
                    self.control.push(ControlItem::Expr(right));
                }
            }
            Instruction::Assign { name, range } => {
                let value = self.pop_stash();
                self.assign(&name, value, range)?;
            }
            Instruction::Apply { argc, range } => self.apply(argc, range)?,
            Instruction::Branch {
                consequent,
                alternate,
                ..
            } => {
                let condition = self.pop_stash();
                if condition.is_truthy() {
                    self.push_target(consequent);
                } else if let Some(alternate) = alternate {
                    self.push_target(alternate);
                }
            }
            Instruction::Reset => {
                self.ctx.env_stack.pop();
            }
            Instruction::EndOfFunctionBody => self.stash.push(Value::Undefined),
            Instruction::Pop => {
                self.stash.pop();
            }
            Instruction::WhileLoop { test, body, range } => {
                let condition = self.pop_stash();
                if condition.is_truthy() {
                    self.control.push(ControlItem::Instr(Instruction::WhileLoop {
                        test: Rc::clone(&test),
                        body: body.clone(),
                        range,
                    }));
                    self.control.push(ControlItem::Expr(test));
                    self.control.push(ControlItem::Instr(Instruction::LoopMarker));
                    self.push_block(&body, false);
                }
            }
            Instruction::ForLoop { range } => {
                let iterable = self.pop_stash();
                return Err(Error::new(
                    ErrorKind::UnsupportedOperandTypeError,
                    format!("'{}' object is not iterable", iterable.type_name()),
                    range,
                ));
            }
            Instruction::LoopMarker => {}
            Instruction::Assert { range } => {
                let value = self.pop_stash();
                if !value.is_truthy() {
                    return Err(Error::new(ErrorKind::AssertionError, "assertion failed", range));
                }
            }
        }
        Ok(())
    }

    /// Applies a callable to `argc` evaluated arguments.
    ///
    /// Stash contract: the top `argc` values are the arguments (last on
    /// top) with the callee beneath them.
    fn apply(&mut self, argc: usize, range: CodeRange) -> EvalResult<()> {
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop_stash());
        }
        args.reverse();
        let callee = self.pop_stash();

        match callee {
            Value::Closure(id) => self.apply_closure(id, args, range),
            Value::Builtin(builtin) => {
                let result = builtin.call(self.ctx, self.io, &args, range)?;
                self.stash.push(result);
                Ok(())
            }
            Value::Foreign(id) => {
                let mut host_args = Vec::with_capacity(args.len());
                for arg in &args {
                    host_args.push(marshal_to_host(arg, range)?);
                }
                let foreign = self.ctx.foreigns.get(id);
                let name = foreign.name.clone();
                let func = Rc::clone(&foreign.func);
                let result = func(&host_args).map_err(|msg| {
                    Error::new(
                        ErrorKind::ModuleInternalError,
                        format!("host function '{name}' failed: {msg}"),
                        range,
                    )
                })?;
                let value = marshal_from_host(result, range)?;
                self.stash.push(value);
                Ok(())
            }
            other => Err(Error::new(
                ErrorKind::UnsupportedOperandTypeError,
                format!("'{}' object is not callable", other.type_name()),
                range,
            )),
        }
    }

    fn apply_closure(&mut self, id: ClosureId, args: Vec<Value>, range: CodeRange) -> EvalResult<()> {
        let closure = self.ctx.closures.get(id);
        if closure.params.len() != args.len() {
            return Err(Error::new(
                ErrorKind::UnsupportedArgumentError,
                format!(
                    "{}() takes {} positional argument{} but {} {} given",
                    closure.name,
                    closure.params.len(),
                    if closure.params.len() == 1 { "" } else { "s" },
                    args.len(),
                    if args.len() == 1 { "was" } else { "were" },
                ),
                range,
            ));
        }
        let name = closure.name.clone();
        let params = closure.params.clone();
        let body = closure.body.clone();
        let defining_env = closure.env;

        self.control.push(ControlItem::Instr(Instruction::Reset));
        if matches!(body, ClosureBody::Block(_)) {
            self.control.push(ControlItem::Instr(Instruction::EndOfFunctionBody));
        }

        let frame = self.ctx.envs.new_frame(name, Some(defining_env), Some(id), Some(range));
        for (param, value) in params.into_iter().zip(args) {
            self.ctx.envs.get_mut(frame).bindings.insert(param, value);
        }
        self.ctx.env_stack.push(frame);

        match body {
            ClosureBody::Block(block) => self.push_block(&block, false),
            ClosureBody::Expr(expr) => self.control.push(ControlItem::Expr(expr)),
        }
        Ok(())
    }

    /// Binds a name according to the frame's `global`/`nonlocal`
    /// declarations, defaulting to the current frame.
    fn assign(&mut self, name: &str, value: Value, range: CodeRange) -> EvalResult<()> {
        let current = self.ctx.current_env();
        let (is_nonlocal, is_global) = {
            let frame = self.ctx.envs.get(current);
            (frame.nonlocals.contains(name), frame.globals.contains(name))
        };
        if is_nonlocal {
            if self.ctx.envs.rebind_in_ancestor(current, name, value) {
                return Ok(());
            }
            return Err(Error::new(
                ErrorKind::NameError,
                format!("no binding for nonlocal '{name}' found"),
                range,
            ));
        }
        let target = if is_global { self.ctx.global_env } else { current };
        self.ctx.envs.get_mut(target).bindings.insert(name.to_owned(), value);
        Ok(())
    }

    // === control plumbing ===

    fn make_closure(&mut self, name: &str, params: &[Identifier], body: ClosureBody) -> ClosureId {
        let local_variables = match &body {
            ClosureBody::Block(block) => local_declarations(block),
            ClosureBody::Expr(_) => ahash::AHashSet::new(),
        };
        self.ctx.closures.alloc(Closure {
            name: name.to_owned(),
            params: params.iter().map(|p| p.name.clone()).collect(),
            body,
            env: self.ctx.current_env(),
            local_variables,
        })
    }

    /// Pushes a block's statements so the first runs next. Expression
    /// statements are followed by a `Pop` to keep the stash balanced,
    /// except the last one of a value-producing (top-level) block.
    fn push_block(&mut self, block: &Block, keep_last_value: bool) {
        for (i, stmt) in block.iter().enumerate().rev() {
            let keep = keep_last_value && i == block.len() - 1;
            if matches!(stmt.kind, StmtKind::Expr(_)) && !keep {
                self.control.push(ControlItem::Instr(Instruction::Pop));
            }
            self.control.push(ControlItem::Stmt(Rc::clone(stmt)));
        }
    }

    fn push_target(&mut self, target: BranchTarget) {
        match target {
            BranchTarget::Block(block) => self.push_block(&block, false),
            BranchTarget::Expr(expr) => self.control.push(ControlItem::Expr(expr)),
        }
    }

    /// Pops control items until a `Reset` is on top, leaving it there.
    fn pop_to_function_boundary(&mut self, range: CodeRange) -> EvalResult<()> {
        loop {
            match self.control.last() {
                Some(ControlItem::Instr(Instruction::Reset)) => return Ok(()),
                Some(_) => {
                    self.control.pop();
                }
                None => {
                    return Err(Error::new(
                        ErrorKind::GenericUnexpectedSyntaxError,
                        "'return' outside function",
                        range,
                    ));
                }
            }
        }
    }

    /// `break`: discards control items up to and including the innermost
    /// loop instruction, never crossing a function boundary.
    fn pop_to_loop(&mut self, range: CodeRange) -> EvalResult<()> {
        loop {
            match self.control.last() {
                Some(ControlItem::Instr(Instruction::WhileLoop { .. } | Instruction::ForLoop { .. })) => {
                    self.control.pop();
                    return Ok(());
                }
                Some(ControlItem::Instr(Instruction::Reset | Instruction::EndOfFunctionBody)) | None => {
                    return Err(Error::new(
                        ErrorKind::GenericUnexpectedSyntaxError,
                        "'break' outside loop",
                        range,
                    ));
                }
                Some(_) => {
                    self.control.pop();
                }
            }
        }
    }

    /// `continue`: discards control items up to and including the
    /// innermost loop marker, leaving the loop's test and instruction.
    fn pop_to_loop_marker(&mut self, range: CodeRange) -> EvalResult<()> {
        loop {
            match self.control.last() {
                Some(ControlItem::Instr(Instruction::LoopMarker)) => {
                    self.control.pop();
                    return Ok(());
                }
                Some(ControlItem::Instr(Instruction::Reset | Instruction::EndOfFunctionBody)) | None => {
                    return Err(Error::new(
                        ErrorKind::GenericUnexpectedSyntaxError,
                        "'continue' outside loop",
                        range,
                    ));
                }
                Some(_) => {
                    self.control.pop();
                }
            }
        }
    }

    fn pop_stash(&mut self) -> Value {
        self.stash.pop().expect("stash discipline: instruction popped missing value")
    }
}

fn item_range(item: &ControlItem) -> CodeRange {
    match item {
        ControlItem::Stmt(stmt) => stmt.range,
        ControlItem::Expr(expr) => expr.range,
        ControlItem::Instr(instr) => match instr {
            Instruction::UnaryOp { range, .. }
            | Instruction::BinaryOp { range, .. }
            | Instruction::BoolOp { range, .. }
            | Instruction::Assign { range, .. }
            | Instruction::Apply { range, .. }
            | Instruction::Branch { range, .. }
            | Instruction::WhileLoop { range, .. }
            | Instruction::ForLoop { range }
            | Instruction::Assert { range } => *range,
            Instruction::Reset | Instruction::EndOfFunctionBody | Instruction::Pop | Instruction::LoopMarker => {
                CodeRange::default()
            }
        },
    }
}
