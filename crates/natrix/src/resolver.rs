//! Static name resolution.
//!
//! A two-pass visitor over each scope: pass one declares every top-level
//! `def` name as a redefinable placeholder (so sibling functions can call
//! each other), then hoists every name the scope assigns; pass two visits
//! statements in order, finalizing definitions and checking every name
//! reference against the frame chain.
//!
//! Scopes are the module and each function/lambda body. Hoisting is what
//! lets `print(x)` before `x = 5` pass resolution and fail at runtime
//! with `UnboundLocalError` instead.

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    ast::{Block, Expr, ExprLoc, Identifier, Module, StmtKind, local_declarations},
    errors::{Error, ErrorKind, EvalResult},
};

/// Suggestions farther than this edit distance are suppressed.
const MAX_SUGGESTION_DISTANCE: usize = 4;

/// Resolves every name in `module` against the given builtin names.
///
/// Resolution is deterministic: frames iterate in insertion order, so the
/// same source and builtin set always reports the same error.
pub fn resolve(module: &Module, builtin_names: &[&str]) -> EvalResult<()> {
    resolve_with_globals(module, builtin_names, &[])
}

/// Resolves a chunk against builtins plus the global names accumulated by
/// earlier chunks of the same session.
pub fn resolve_with_globals(module: &Module, builtin_names: &[&str], predefined: &[String]) -> EvalResult<()> {
    let mut resolver = Resolver::new(builtin_names);
    resolver.predefined = predefined;
    resolver.scope(&module.body, &[], FrameKind::Module)
}

/// How a name is bound within a resolver frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// A hoisted `def` name; may be finalized once.
    Placeholder,
    /// A name the scope assigns somewhere; visible from scope entry.
    Hoisted,
    /// A finalized definition: parameter, `def`, import, or builtin.
    Defined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Builtin,
    Module,
    Function,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Insertion-ordered so suggestion scanning is deterministic.
    bindings: IndexMap<String, Binding>,
    /// Names declared `global` in this scope.
    globals: AHashSet<String>,
    /// Names declared `nonlocal` in this scope.
    nonlocals: AHashSet<String>,
    /// Nesting depth of `while`/`for` bodies being visited.
    loop_depth: u32,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            bindings: IndexMap::new(),
            globals: AHashSet::new(),
            nonlocals: AHashSet::new(),
            loop_depth: 0,
        }
    }
}

struct Resolver<'a> {
    frames: Vec<Frame>,
    /// Global names defined by earlier chunks of the same session.
    predefined: &'a [String],
}

impl<'a> Resolver<'a> {
    fn new(builtin_names: &[&str]) -> Self {
        let mut builtins = Frame::new(FrameKind::Builtin);
        for name in builtin_names {
            builtins.bindings.insert((*name).to_owned(), Binding::Defined);
        }
        Self {
            frames: vec![builtins],
            predefined: &[],
        }
    }

    /// Resolves one scope: seeds parameters, runs both passes, pops.
    fn scope(&mut self, body: &Block, params: &[Identifier], kind: FrameKind) -> EvalResult<()> {
        self.frames.push(Frame::new(kind));
        if kind == FrameKind::Module {
            for name in self.predefined {
                self.frames
                    .last_mut()
                    .expect("frame just pushed")
                    .bindings
                    .insert(name.clone(), Binding::Defined);
            }
        }

        for param in params {
            if self.current().bindings.contains_key(&param.name) {
                self.frames.pop();
                return Err(Error::new(
                    ErrorKind::NameReassignmentError,
                    format!("duplicate parameter '{}'", param.name),
                    param.range,
                ));
            }
            self.current().bindings.insert(param.name.clone(), Binding::Defined);
        }

        // Pass 1: placeholders for sibling functions, then hoisted names.
        for stmt in body {
            if let StmtKind::FunctionDef { name, .. } = &stmt.kind
                && !self.current().bindings.contains_key(&name.name)
            {
                self.current().bindings.insert(name.name.clone(), Binding::Placeholder);
            }
        }
        for name in local_declarations(body) {
            if !self.current().bindings.contains_key(&name) {
                self.current().bindings.insert(name, Binding::Hoisted);
            }
        }

        // Pass 2: visit in order.
        let result = self.block(body);
        self.frames.pop();
        result
    }

    fn block(&mut self, body: &Block) -> EvalResult<()> {
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &crate::ast::Stmt) -> EvalResult<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Assert(expr) => self.expression(expr),
            StmtKind::Return(value) => {
                if self.current().kind != FrameKind::Function {
                    return Err(Error::new(
                        ErrorKind::GenericUnexpectedSyntaxError,
                        "'return' outside function",
                        stmt.range,
                    ));
                }
                if let Some(value) = value {
                    self.expression(value)?;
                }
                Ok(())
            }
            StmtKind::Assign { name, value } => {
                self.expression(value)?;
                self.check_assignment(name)
            }
            StmtKind::AnnAssign { name, value, .. } => {
                // The annotation is parsed but deliberately not resolved:
                // it has no runtime meaning and the builtin set has no
                // type names.
                self.expression(value)?;
                self.check_assignment(name)
            }
            StmtKind::FunctionDef { name, params, body } => {
                self.define(name)?;
                self.scope(body, params, FrameKind::Function)
            }
            StmtKind::If { test, body, orelse } => {
                self.expression(test)?;
                self.block(body)?;
                if let Some(orelse) = orelse {
                    self.block(orelse)?;
                }
                Ok(())
            }
            StmtKind::While { test, body } => {
                self.expression(test)?;
                self.current().loop_depth += 1;
                let result = self.block(body);
                self.current().loop_depth -= 1;
                result
            }
            StmtKind::For { target, iter, body } => {
                self.expression(iter)?;
                self.check_assignment(target)?;
                self.current().loop_depth += 1;
                let result = self.block(body);
                self.current().loop_depth -= 1;
                result
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.current().loop_depth == 0 {
                    let what = if matches!(stmt.kind, StmtKind::Break) {
                        "break"
                    } else {
                        "continue"
                    };
                    return Err(Error::new(
                        ErrorKind::GenericUnexpectedSyntaxError,
                        format!("'{what}' outside loop"),
                        stmt.range,
                    ));
                }
                Ok(())
            }
            StmtKind::Pass => Ok(()),
            StmtKind::FromImport { names, .. } => {
                for name in names {
                    self.define(name)?;
                }
                Ok(())
            }
            StmtKind::Global(name) => {
                self.current().globals.insert(name.name.clone());
                Ok(())
            }
            StmtKind::NonLocal(name) => {
                if !self.enclosing_function_binds(&name.name) {
                    return Err(Error::new(
                        ErrorKind::NameNotFoundError,
                        format!("no binding for nonlocal '{}' found", name.name),
                        name.range,
                    ));
                }
                self.current().nonlocals.insert(name.name.clone());
                Ok(())
            }
        }
    }

    fn expression(&mut self, expr: &ExprLoc) -> EvalResult<()> {
        match &expr.expr {
            Expr::None
            | Expr::Bool(_)
            | Expr::Float(_)
            | Expr::Int(_)
            | Expr::Complex(_)
            | Expr::Str(_) => Ok(()),
            Expr::Name(name) => self.reference(name),
            Expr::Grouping(inner) => self.expression(inner),
            Expr::Unary { operand, .. } => self.expression(operand),
            Expr::Binary { left, right, .. }
            | Expr::BoolOp { left, right, .. }
            | Expr::Compare { left, right, .. } => {
                self.expression(left)?;
                self.expression(right)
            }
            Expr::Call { callee, args } => {
                self.expression(callee)?;
                for arg in args {
                    self.expression(arg)?;
                }
                Ok(())
            }
            Expr::Ternary { test, body, orelse } => {
                self.expression(test)?;
                self.expression(body)?;
                self.expression(orelse)
            }
            Expr::Lambda { params, body } => {
                self.frames.push(Frame::new(FrameKind::Function));
                for param in params {
                    if self.current().bindings.contains_key(&param.name) {
                        self.frames.pop();
                        return Err(Error::new(
                            ErrorKind::NameReassignmentError,
                            format!("duplicate parameter '{}'", param.name),
                            param.range,
                        ));
                    }
                    self.current().bindings.insert(param.name.clone(), Binding::Defined);
                }
                let result = self.expression(body);
                self.frames.pop();
                result
            }
        }
    }

    /// Checks a name reference against the whole frame chain.
    fn reference(&mut self, name: &Identifier) -> EvalResult<()> {
        if self.frames.iter().any(|f| f.bindings.contains_key(&name.name)) {
            return Ok(());
        }
        let mut err = Error::new(
            ErrorKind::NameNotFoundError,
            format!("name '{}' is not defined", name.name),
            name.range,
        );
        if let Some(suggestion) = self.suggest(&name.name) {
            err = err.with_suggestion(suggestion);
        }
        Err(err)
    }

    /// Finds the closest visible name by Levenshtein distance; distances
    /// of [`MAX_SUGGESTION_DISTANCE`] or more suppress the suggestion.
    fn suggest(&self, name: &str) -> Option<String> {
        let mut best: Option<(usize, &str)> = None;
        for frame in self.frames.iter().rev() {
            for candidate in frame.bindings.keys() {
                let distance = strsim::levenshtein(name, candidate);
                if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                    best = Some((distance, candidate));
                }
            }
        }
        match best {
            Some((distance, candidate)) if distance < MAX_SUGGESTION_DISTANCE => Some(candidate.to_owned()),
            _ => None,
        }
    }

    /// Finalizes a definition (`def` or import) in the current frame.
    ///
    /// A placeholder or hoisted binding upgrades to defined; finalizing an
    /// already-defined name is the reassignment error.
    fn define(&mut self, name: &Identifier) -> EvalResult<()> {
        match self.current().bindings.get(&name.name) {
            Some(Binding::Defined) => Err(Error::new(
                ErrorKind::NameReassignmentError,
                format!("name '{}' has already been defined in this scope", name.name),
                name.range,
            )),
            _ => {
                self.current().bindings.insert(name.name.clone(), Binding::Defined);
                Ok(())
            }
        }
    }

    /// Checks an assignment target.
    ///
    /// Plain rebinding within the current scope is allowed (the machine's
    /// assignment instruction rebinds freely); what is rejected is
    /// assigning to a name bound by an *enclosing function* without a
    /// `nonlocal` declaration, which would otherwise silently shadow a
    /// closed-over variable.
    fn check_assignment(&mut self, name: &Identifier) -> EvalResult<()> {
        let current = self.frames.len() - 1;
        if self.frames[current].globals.contains(&name.name) || self.frames[current].nonlocals.contains(&name.name) {
            return Ok(());
        }
        if self.frames[current].kind == FrameKind::Function {
            for frame in self.frames[..current].iter().rev() {
                if frame.kind != FrameKind::Function {
                    break;
                }
                if frame.bindings.contains_key(&name.name) {
                    return Err(Error::new(
                        ErrorKind::NameReassignmentError,
                        format!(
                            "cannot assign to '{}' bound in an enclosing function; declare it nonlocal",
                            name.name
                        ),
                        name.range,
                    ));
                }
            }
        }
        Ok(())
    }

    /// True when a strict ancestor *function* frame binds `name`.
    fn enclosing_function_binds(&self, name: &str) -> bool {
        let current = self.frames.len() - 1;
        self.frames[..current]
            .iter()
            .rev()
            .take_while(|f| f.kind == FrameKind::Function)
            .any(|f| f.bindings.contains_key(name))
    }

    fn current(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("resolver frame stack is never empty")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{lexer::tokenize, parser::parse};

    const BUILTINS: &[&str] = &["print", "abs", "max", "min", "round", "str", "_int", "input"];

    fn resolve_source(source: &str) -> EvalResult<()> {
        let module = parse(tokenize(source).unwrap()).unwrap();
        resolve(&module, BUILTINS)
    }

    fn error_of(source: &str) -> Error {
        resolve_source(source).expect_err("expected resolver error")
    }

    #[test]
    fn builtins_resolve() {
        assert_eq!(resolve_source("print(1)\n"), Ok(()));
    }

    #[test]
    fn unknown_name_with_suggestion() {
        let err = error_of("x_value = 1\nprint(x_valu)\n");
        assert_eq!(err.kind, ErrorKind::NameNotFoundError);
        assert_eq!(err.suggestion.as_deref(), Some("x_value"));
    }

    #[test]
    fn distant_names_get_no_suggestion() {
        let err = error_of("zzzzzzqqqq\n");
        assert_eq!(err.kind, ErrorKind::NameNotFoundError);
        assert_eq!(err.suggestion, None);
    }

    #[test]
    fn sibling_functions_may_mutually_recurse() {
        let source = "def even(n):\n    return n == 0 or odd(n - 1)\ndef odd(n):\n    return n != 0 and even(n - 1)\neven(10)\n";
        assert_eq!(resolve_source(source), Ok(()));
    }

    #[test]
    fn forward_reference_to_assigned_local_is_static_ok() {
        // Runtime raises UnboundLocalError; the resolver must not reject.
        assert_eq!(resolve_source("def g():\n    print(x)\n    x = 5\ng()\n"), Ok(()));
    }

    #[test]
    fn duplicate_def_is_reassignment() {
        let err = error_of("def f():\n    pass\ndef f():\n    pass\n");
        assert_eq!(err.kind, ErrorKind::NameReassignmentError);
    }

    #[test]
    fn assigning_enclosing_local_requires_nonlocal() {
        let source = "def outer():\n    x = 1\n    def inner():\n        x = 2\n    return inner\nouter()\n";
        assert_eq!(error_of(source).kind, ErrorKind::NameReassignmentError);
        let fixed = "def outer():\n    x = 1\n    def inner():\n        nonlocal x\n        x = 2\n    return inner\nouter()\n";
        assert_eq!(resolve_source(fixed), Ok(()));
    }

    #[test]
    fn nonlocal_without_binding_fails() {
        let source = "def f():\n    nonlocal x\n    x = 1\nf()\n";
        assert_eq!(error_of(source).kind, ErrorKind::NameNotFoundError);
    }

    #[test]
    fn nonlocal_cannot_target_module_scope() {
        let source = "x = 1\ndef f():\n    nonlocal x\n    x = 2\nf()\n";
        assert_eq!(error_of(source).kind, ErrorKind::NameNotFoundError);
    }

    #[test]
    fn module_globals_may_be_shadowed_in_functions() {
        assert_eq!(resolve_source("x = 1\ndef f():\n    x = 2\n    return x\nf()\n"), Ok(()));
    }

    #[test]
    fn break_outside_loop_fails() {
        assert_eq!(error_of("break\n").kind, ErrorKind::GenericUnexpectedSyntaxError);
        assert_eq!(
            resolve_source("while True:\n    break\n"),
            Ok(())
        );
    }

    #[test]
    fn return_outside_function_fails() {
        assert_eq!(error_of("return 1\n").kind, ErrorKind::GenericUnexpectedSyntaxError);
    }

    #[test]
    fn duplicate_parameters_fail() {
        assert_eq!(
            error_of("def f(a, a):\n    return a\n").kind,
            ErrorKind::NameReassignmentError
        );
    }

    #[test]
    fn loop_depth_does_not_leak_into_functions() {
        let source = "while True:\n    def f():\n        break\n    break\n";
        assert_eq!(error_of(source).kind, ErrorKind::GenericUnexpectedSyntaxError);
    }
}
