use std::rc::Rc;

use crate::expr::Expr;

/// A function body together with its signature. Shared between the AST and
/// every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for anonymous functions.
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Name used in `<fn …>` rendering and diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("lambda")
    }
}

/// **Abstract‑Syntax‑Tree node** for *statements*. A program is a sequence of
/// these nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    Print { expr: Expr, line: usize },

    /// `"var" IDENT ("=" initializer)? ";"`
    Var {
        name: String,
        initializer: Option<Expr>,
        line: usize,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block { statements: Vec<Stmt>, line: usize },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        line: usize,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        line: usize,
    },

    /// The initializer runs in a scope of its own that encloses the loop.
    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
        line: usize,
    },

    /// Named function declaration.
    Function(Rc<FunctionDecl>),

    /// Absent value ⇒ `nil` is returned.
    Return { value: Option<Expr>, line: usize },

    Break { line: usize },

    Continue { line: usize },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Expression(expr) => expr.line(),

            Stmt::Function(decl) => decl.line,

            Stmt::Print { line, .. }
            | Stmt::Var { line, .. }
            | Stmt::Block { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line } => *line,
        }
    }
}
