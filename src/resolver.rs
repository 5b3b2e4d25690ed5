//! Static resolver pass for **Sky**.
//!
//! One walk over a parsed program, before it runs:
//! 1. Mirror the scopes the interpreter will create (blocks, `for` loops,
//!    function bodies) as a stack of `HashMap<&str, bool>`
//!    (`false` = declared, `true` = defined).
//! 2. Report static errors, currently reading a local in its own initializer.
//! 3. Tell the interpreter, for *each* variable occurrence, whether it is a
//!    local (and how many scopes out) or a global. A closure therefore sees
//!    the binding that was in scope where it was written, never one declared
//!    later in an enclosing block.
//!
//! Redeclaring a name in the same scope is allowed and overwrites it, and
//! `return` at top level is left for the interpreter to reject.

use std::collections::HashMap;
use std::io::Write;

use log::{debug, info, trace};

use crate::error::SkyError;
use crate::expr::Expr;
use crate::interpreter::Interpreter;
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{FunctionDecl, Stmt};

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances by calling back into the interpreter.
pub struct Resolver<'a, 'i, W: Write> {
    interpreter: &'i mut Interpreter<W>,
    scopes: Vec<HashMap<&'a str, bool>>,
    errors: Vec<SkyError>,
}

impl<'a, 'i, W: Write> Resolver<'a, 'i, W> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'i mut Interpreter<W>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements. Every static error is reported.
    pub fn resolve(&mut self, statements: &'a [Stmt]) -> Result<(), Vec<SkyError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt) {
        trace!("Resolving statement on line {}", stmt.line());

        ensure_sufficient_stack(|| match stmt {
            Stmt::Expression(expr) | Stmt::Print { expr, .. } => self.resolve_expr(expr),

            Stmt::Var {
                name, initializer, ..
            } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Block { statements, .. } => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // One scope holds the loop variable; a block body opens its own.
                self.begin_scope();
                if let Some(init) = initializer.as_deref() {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = condition {
                    self.resolve_expr(cond);
                }
                if let Some(inc) = increment {
                    self.resolve_expr(inc);
                }
                self.resolve_stmt(body);
                self.end_scope();
            }

            Stmt::Function(decl) => {
                // The name is visible inside its own body, for recursion.
                let name: &'a str = decl.display_name();
                self.declare(name);
                self.define(name);
                self.resolve_function(decl);
            }

            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }

            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr) {
        ensure_sufficient_stack(|| match expr {
            Expr::Literal { .. } => {}

            Expr::Grouping { expr: inner, .. } => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { name, line } => {
                let in_own_initializer: bool = self
                    .scopes
                    .last()
                    .is_some_and(|scope| scope.get(name.as_str()) == Some(&false));

                if in_own_initializer {
                    self.errors.push(SkyError::resolve(
                        *line,
                        name.as_str(),
                        "Cannot read local variable in its own initializer.",
                    ));
                }

                self.resolve_local(expr, name);
            }

            Expr::Assign { name, value, .. } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(expr, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Lambda(decl) => self.resolve_function(decl),
        })
    }

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, decl: &'a FunctionDecl) {
        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Globals are not tracked. A name already defined in this scope stays
    /// defined, so `var a = a;` after an earlier `var a` reads the old binding.
    fn declare(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.entry(name).or_insert(false);
        }
    }

    fn define(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// Record this variable occurrence as a local `depth` scopes out, or as a
    /// global when no enclosing scope declares it.
    fn resolve_local(&mut self, expr: &Expr, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);
                self.interpreter.note_local(expr, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
        self.interpreter.note_global(expr);
    }
}
