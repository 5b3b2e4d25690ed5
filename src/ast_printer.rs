use crate::expr::{Expr, LiteralValue};
use crate::stmt::{FunctionDecl, Stmt};

/// Renders parsed programs in a parenthesised prefix form, one line per
/// top‑level statement. Used by the `parse` subcommand and by tests that
/// check tree shape (precedence, associativity, `else` binding).
pub struct AstPrinter;

impl AstPrinter {
    pub fn print_program(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(Self::print_stmt)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", Self::print(expr)),

            Stmt::Print { expr, .. } => format!("(print {})", Self::print(expr)),

            Stmt::Var {
                name, initializer, ..
            } => match initializer {
                Some(init) => format!("(var {} {})", name, Self::print(init)),
                None => format!("(var {})", name),
            },

            Stmt::Block { statements, .. } => Self::block("block", statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch)
                ),
            },

            Stmt::While {
                condition, body, ..
            } => format!(
                "(while {} {})",
                Self::print(condition),
                Self::print_stmt(body)
            ),

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => format!(
                "(for {} {} {} {})",
                initializer
                    .as_deref()
                    .map_or_else(|| "_".to_string(), Self::print_stmt),
                condition
                    .as_ref()
                    .map_or_else(|| "_".to_string(), Self::print),
                increment
                    .as_ref()
                    .map_or_else(|| "_".to_string(), Self::print),
                Self::print_stmt(body)
            ),

            Stmt::Function(decl) => Self::function("fun", decl),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print(value)),
                None => "(return)".to_string(),
            },

            Stmt::Break { .. } => "(break)".to_string(),

            Stmt::Continue { .. } => "(continue)".to_string(),
        }
    }

    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal { value, .. } => match value {
                LiteralValue::Bool(b) => b.to_string(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => format!("{:?}", s),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3 → 3.0
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            Expr::Grouping { expr, .. } => format!("(group {})", Self::print(expr)),

            Expr::Unary {
                operator, right, ..
            } => format!("({} {})", operator, Self::print(right)),

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => format!(
                "({} {} {})",
                operator,
                Self::print(left),
                Self::print(right)
            ),

            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => format!(
                "({} {} {})",
                operator,
                Self::print(left),
                Self::print(right)
            ),

            Expr::Variable { name, .. } => name.clone(),

            Expr::Assign { name, value, .. } => format!("(= {} {})", name, Self::print(value)),

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }

            Expr::Lambda(decl) => Self::function("lambda", decl),
        }
    }

    fn function(head: &str, decl: &FunctionDecl) -> String {
        let mut s = format!("({}", head);

        if let Some(name) = &decl.name {
            s.push(' ');
            s.push_str(name);
        }

        s.push_str(&format!(" ({})", decl.params.join(" ")));
        s.push(' ');
        s.push_str(&Self::block("block", &decl.body));
        s.push(')');
        s
    }

    fn block(head: &str, statements: &[Stmt]) -> String {
        let mut s = format!("({}", head);
        for stmt in statements {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }
}
