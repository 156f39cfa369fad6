//! The typed abstract syntax tree produced by the parser.
//!
//! Nodes are immutable once built. Child expressions and statements are
//! `Rc`-shared so runtime closures can keep their bodies alive across
//! chunks without cloning subtrees. Every node carries the [`CodeRange`]
//! spanning its first through last token.

use std::rc::Rc;

use ahash::AHashSet;
use num_bigint::BigInt;

use crate::{complex::PyComplex, token::CodeRange};

/// A shared expression node.
pub type ExprRef = Rc<ExprLoc>;
/// A block of statements, shared per statement.
pub type Block = Vec<Rc<Stmt>>;

/// An identifier occurrence with its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub range: CodeRange,
}

impl Identifier {
    #[must_use]
    pub fn new(name: impl Into<String>, range: CodeRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `not` (or its `!` spelling).
    Not,
    /// `-`
    Minus,
    /// `+`
    Plus,
}

impl UnaryOperator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Minus => "-",
            Self::Plus => "+",
        }
    }
}

/// Arithmetic binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    Pow,
    FloorDiv,
}

impl BinaryOperator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::FloorDiv => "//",
        }
    }
}

/// Boolean connectives. Defined separately because they short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Comparison operators. Defined separately since they always produce a bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// An expression with its source range.
#[derive(Debug, Clone)]
pub struct ExprLoc {
    pub range: CodeRange,
    pub expr: Expr,
}

impl ExprLoc {
    #[must_use]
    pub fn new(range: CodeRange, expr: Expr) -> Self {
        Self { range, expr }
    }
}

/// An expression in the AST.
#[derive(Debug, Clone)]
pub enum Expr {
    /// The `None` literal.
    None,
    Bool(bool),
    Float(f64),
    /// An integer literal of any width; the lexeme (including `0x`/`0o`/
    /// `0b` prefixes) is parsed once at parse time.
    Int(BigInt),
    Complex(PyComplex),
    Str(String),
    Name(Identifier),
    /// A parenthesized expression. Kept as a node so carets can point at
    /// the parentheses.
    Grouping(ExprRef),
    Unary {
        op: UnaryOperator,
        operand: ExprRef,
    },
    Binary {
        left: ExprRef,
        op: BinaryOperator,
        /// The operator token's own range; operand-type faults point
        /// their caret here.
        op_range: CodeRange,
        right: ExprRef,
    },
    /// `and` / `or`. The right operand is only evaluated when the left
    /// value does not decide the result.
    BoolOp {
        left: ExprRef,
        op: BoolOperator,
        right: ExprRef,
    },
    Compare {
        left: ExprRef,
        op: CmpOperator,
        /// The operator token's own range, for caret placement.
        op_range: CodeRange,
        right: ExprRef,
    },
    /// A call; chained calls (`f()()`) nest left-associatively in `callee`.
    Call {
        callee: ExprRef,
        args: Vec<ExprRef>,
    },
    /// Conditional expression: `body if test else orelse`.
    Ternary {
        test: ExprRef,
        body: ExprRef,
        orelse: ExprRef,
    },
    /// `lambda params: body` — an anonymous single-expression function.
    Lambda {
        params: Vec<Identifier>,
        body: ExprRef,
    },
}

/// A statement with its source range.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub range: CodeRange,
    pub kind: StmtKind,
}

impl Stmt {
    #[must_use]
    pub fn new(range: CodeRange, kind: StmtKind) -> Self {
        Self { range, kind }
    }
}

/// A statement in the AST.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// A bare expression statement.
    Expr(ExprRef),
    Assign {
        name: Identifier,
        value: ExprRef,
    },
    /// An annotated assignment `name: annotation = value`. The annotation
    /// is parsed and resolved but carries no runtime meaning.
    AnnAssign {
        name: Identifier,
        annotation: ExprRef,
        value: ExprRef,
    },
    FunctionDef {
        name: Identifier,
        params: Vec<Identifier>,
        body: Block,
    },
    Return(Option<ExprRef>),
    /// `if`/`elif`/`else`. An `elif` chain nests as another `If` inside
    /// `orelse`; the grammar guarantees `orelse` on user `if` statements.
    If {
        test: ExprRef,
        body: Block,
        orelse: Option<Block>,
    },
    While {
        test: ExprRef,
        body: Block,
    },
    For {
        target: Identifier,
        iter: ExprRef,
        body: Block,
    },
    Pass,
    Break,
    Continue,
    Assert(ExprRef),
    /// `from module import name, …`
    FromImport {
        module: Identifier,
        names: Vec<Identifier>,
    },
    Global(Identifier),
    NonLocal(Identifier),
}

/// The root of a parsed chunk.
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Block,
    pub range: CodeRange,
}

/// Collects the names a function body binds locally.
///
/// Scans assignment targets, `for` targets, and nested `def` names
/// without recursing into nested function bodies, then removes names the
/// body declares `global` or `nonlocal`. The machine uses the result to
/// distinguish `UnboundLocalError` from `NameError`.
#[must_use]
pub fn local_declarations(body: &[Rc<Stmt>]) -> AHashSet<String> {
    let mut assigned = AHashSet::new();
    let mut declared_elsewhere = AHashSet::new();
    scan_block(body, &mut assigned, &mut declared_elsewhere);
    for name in &declared_elsewhere {
        assigned.remove(name);
    }
    assigned
}

fn scan_block(body: &[Rc<Stmt>], assigned: &mut AHashSet<String>, declared_elsewhere: &mut AHashSet<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Assign { name, .. } | StmtKind::AnnAssign { name, .. } => {
                assigned.insert(name.name.clone());
            }
            StmtKind::FunctionDef { name, .. } => {
                // Nested bodies are their own scope; only the name binds here.
                assigned.insert(name.name.clone());
            }
            StmtKind::For { target, body, .. } => {
                assigned.insert(target.name.clone());
                scan_block(body, assigned, declared_elsewhere);
            }
            StmtKind::If { body, orelse, .. } => {
                scan_block(body, assigned, declared_elsewhere);
                if let Some(orelse) = orelse {
                    scan_block(orelse, assigned, declared_elsewhere);
                }
            }
            StmtKind::While { body, .. } => scan_block(body, assigned, declared_elsewhere),
            StmtKind::Global(name) | StmtKind::NonLocal(name) => {
                declared_elsewhere.insert(name.name.clone());
            }
            StmtKind::FromImport { names, .. } => {
                for name in names {
                    assigned.insert(name.name.clone());
                }
            }
            _ => {}
        }
    }
}
