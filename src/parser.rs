/*!
Recursive‑descent parser for Sky.

Consumes the token slice produced by the [`Scanner`](crate::scanner::Scanner)
with one token of lookahead and builds an owned AST ([`Stmt`] / [`Expr`]).

Time & Space
------------
Each token is consumed once via `advance()`, so parsing is Θ(n) in the number
of tokens; error recovery (`synchronize`) only skips tokens forward. Call‑stack
depth grows with syntactic nesting.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| `synchronize`                | `debug`| Which tokens were discarded on recovery.  |

Grammar (EBNF)
--------------

```text
program     → declaration* EOF ;
declaration → funDecl | varDecl | statement ;
funDecl     → "fun" IDENT "(" parameters? ")" block ;
varDecl     → "var" IDENT ( "=" expression )? ";" ;
statement   → exprStmt | printStmt | ifStmt | whileStmt | forStmt
            | returnStmt | breakStmt | continueStmt | block ;
forStmt     → "for" "(" ( varDecl | exprStmt | ";" )
              expression? ";" expression? ")" statement ;
ifStmt      → "if" "(" expression ")" statement ( "else" statement )? ;
block       → "{" declaration* "}" ;
parameters  → IDENT ( "," IDENT )* ;
expression  → assignment ;
assignment  → IDENT "=" assignment | logic_or ;
logic_or    → logic_and ( "or" logic_and )* ;
logic_and   → equality  ( "and" equality )* ;
equality    → comparison ( ( "!=" | "==" ) comparison )* ;
comparison  → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term        → factor ( ( "-" | "+" ) factor )* ;
factor      → unary ( ( "/" | "*" ) unary )* ;
unary       → ( "!" | "-" ) unary | call ;
call        → primary ( "(" arguments? ")" )* ;
arguments   → expression ( "," expression )* ;
primary     → NUMBER | STRING | "true" | "false" | "nil" | IDENT
            | "(" expression ")" | "fun" "(" parameters? ")" block ;
```

The `else` of an `if` is consumed by the innermost `if_statement` still on
the stack, which binds it to the nearest unmatched `if`.
*/

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Result, SkyError};
use crate::expr::{BinaryOp, Expr, LiteralValue, LogicalOp, UnaryOp};
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

use log::{debug, info};

/// Upper bound on parameters and call arguments.
pub const MAX_ARITY: usize = 255;

/// Upper bound on nested statements and expressions.
pub const MAX_NESTING: usize = 1000;

/// Stands in for the `EOF` token once the slice is exhausted, so an empty
/// slice or one missing its trailing `EOF` still terminates cleanly.
static END: Token<'static> = Token {
    token_type: TokenType::EOF,
    lexeme: "",
    line: 0,
};

/// Top‑level parser over an immutable slice of tokens, normally the output
/// of the scanner ending in `EOF`.
pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    current: usize,

    /// Statements and expressions currently being parsed inside one another.
    nesting: usize,

    /// Number of enclosing loops in the function being parsed; `break` and
    /// `continue` are only valid when non‑zero.
    loop_depth: usize,

    /// Errors recorded during recovery and not yet handed out.
    errors: VecDeque<SkyError>,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            nesting: 0,
            loop_depth: 0,
            errors: VecDeque::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program. On failure returns every syntax error found,
    /// in source order.
    pub fn parse(&mut self) -> std::result::Result<Vec<Stmt>, Vec<SkyError>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();
        let mut errors: Vec<SkyError> = Vec::new();

        for result in self.by_ref() {
            match result {
                Ok(stmt) => statements.push(stmt),
                Err(e) => errors.push(e),
            }
        }

        info!(
            "Parsed {} statement(s) with {} error(s)",
            statements.len(),
            errors.len()
        );

        if errors.is_empty() {
            Ok(statements)
        } else {
            Err(errors)
        }
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Parse one declaration. On a syntax error the error is recorded, the
    /// parser resynchronizes at the next statement boundary and `None` is
    /// returned, so an enclosing block keeps parsing its remaining statements.
    fn declaration(&mut self) -> Option<Stmt> {
        debug!("Entering declaration at {}", self.peek().describe());

        match self.try_declaration() {
            Ok(stmt) => Some(stmt),

            Err(e) => {
                self.errors.push_back(e);
                self.synchronize();

                None
            }
        }
    }

    fn try_declaration(&mut self) -> Result<Stmt> {
        // `fun` followed by `(` starts an anonymous function expression.
        if self.check(TokenType::FUN) && !self.check_next(TokenType::LEFT_PAREN) {
            self.advance();
            self.function().map(|decl| Stmt::Function(Rc::new(decl)))
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn function(&mut self) -> Result<FunctionDecl> {
        let name: &Token<'_> = self.consume(TokenType::IDENTIFIER, "Expected function name.")?;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after function name.")?;

        let (params, body) = self.function_tail()?;

        Ok(FunctionDecl {
            name: Some(name.lexeme.to_string()),
            params,
            body,
            line: name.line,
        })
    }

    /// Parameters (after the opening `(`) and the braced body of a function.
    fn function_tail(&mut self) -> Result<(Vec<String>, Vec<Stmt>)> {
        let mut params: Vec<String> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    return Err(self.error_at_current("Can't have more than 255 parameters."));
                }

                let param: &Token<'_> =
                    self.consume(TokenType::IDENTIFIER, "Expected parameter name.")?;
                params.push(param.lexeme.to_string());

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters.")?;
        self.consume(TokenType::LEFT_BRACE, "Expected '{' before function body.")?;

        // Loops outside the function do not make `break` legal inside it.
        let enclosing_loops: usize = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.block();
        self.loop_depth = enclosing_loops;

        Ok((params, body?))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: &Token<'_> = self.consume(TokenType::IDENTIFIER, "Expected variable name.")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after variable declaration.",
        )?;

        Ok(Stmt::Var {
            name: name.lexeme.to_string(),
            initializer,
            line: name.line,
        })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        self.nested("Statement nesting too deep.", Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt> {
        debug!("Entering statement at {}", self.peek().describe());

        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::BREAK) {
            self.loop_jump(TokenType::BREAK)
        } else if self.matches(TokenType::CONTINUE) {
            self.loop_jump(TokenType::CONTINUE)
        } else if self.matches(TokenType::LEFT_BRACE) {
            let line: usize = self.previous().line;

            Ok(Stmt::Block {
                statements: self.block()?,
                line,
            })
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let line: usize = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'for'.")?;

        let initializer: Option<Box<Stmt>> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expected ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after for clauses.")?;

        let body: Box<Stmt> = Box::new(self.loop_body()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            line,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let line: usize = self.previous().line;
        let expr: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expected ';' after value.")?;

        Ok(Stmt::Print { expr, line })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expected ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let line: usize = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            line,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let line: usize = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition.")?;

        let body: Box<Stmt> = Box::new(self.loop_body()?);

        Ok(Stmt::While {
            condition,
            body,
            line,
        })
    }

    /// Parse a loop body with `break`/`continue` enabled.
    fn loop_body(&mut self) -> Result<Stmt> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;

        body
    }

    fn loop_jump(&mut self, kind: TokenType) -> Result<Stmt> {
        let keyword: &Token<'_> = self.previous();

        if self.loop_depth == 0 {
            return Err(SkyError::parse(
                keyword.line,
                keyword.describe(),
                format!("Can't use '{}' outside of a loop.", keyword.lexeme),
            ));
        }

        self.consume(TokenType::SEMICOLON, "Expected ';' after loop jump.")?;

        let line: usize = keyword.line;

        Ok(match kind {
            TokenType::BREAK => Stmt::Break { line },
            _ => Stmt::Continue { line },
        })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let line: usize = self.previous().line;
        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after return value.")?;

        Ok(Stmt::Return { value, line })
    }

    /// Declarations up to the closing `}`. The `{` is already consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.nested("Expression nesting too deep.", Self::assignment)
    }

    /// Run one level of a recursive rule, failing once `MAX_NESTING` levels
    /// are open.
    fn nested<T>(&mut self, message: &str, rule: fn(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error_at_current(message));
        }

        self.nesting += 1;
        let result = ensure_sufficient_stack(|| rule(self));
        self.nesting -= 1;

        result
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals: &Token<'_> = self.previous();
            let value: Expr = self.assignment()?;

            return match expr {
                Expr::Variable { name, line } => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    line,
                }),

                _ => Err(SkyError::parse(
                    equals.line,
                    equals.describe(),
                    "Invalid assignment target.",
                )),
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let line: usize = self.previous().line;
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let line: usize = self.previous().line;
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    /// One left‑associative precedence level: `next ( op next )*`.
    fn binary_level(
        &mut self,
        operators: &[(TokenType, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr: Expr = next(self)?;

        while let Some(operator) = self.match_operator(operators) {
            let line: usize = self.previous().line;
            let right: Expr = next(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::BANG_EQUAL, BinaryOp::NotEqual),
                (TokenType::EQUAL_EQUAL, BinaryOp::Equal),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::GREATER, BinaryOp::Greater),
                (TokenType::GREATER_EQUAL, BinaryOp::GreaterEqual),
                (TokenType::LESS, BinaryOp::Less),
                (TokenType::LESS_EQUAL, BinaryOp::LessEqual),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::MINUS, BinaryOp::Subtract),
                (TokenType::PLUS, BinaryOp::Add),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::SLASH, BinaryOp::Divide),
                (TokenType::STAR, BinaryOp::Multiply),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let operator: Option<UnaryOp> = if self.matches(TokenType::BANG) {
            Some(UnaryOp::Not)
        } else if self.matches(TokenType::MINUS) {
            Some(UnaryOp::Negate)
        } else {
            None
        };

        if let Some(operator) = operator {
            let line: usize = self.previous().line;
            let right: Expr = self.nested("Expression nesting too deep.", Self::unary)?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
                line,
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        while self.matches(TokenType::LEFT_PAREN) {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    return Err(self.error_at_current("Can't have more than 255 arguments."));
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: &Token<'_> =
            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
            line: paren.line,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let token: &Token<'_> = self.peek();
        let line: usize = token.line;

        let value: Option<LiteralValue> = match &token.token_type {
            TokenType::FALSE => Some(LiteralValue::Bool(false)),
            TokenType::TRUE => Some(LiteralValue::Bool(true)),
            TokenType::NIL => Some(LiteralValue::Nil),
            TokenType::NUMBER(n) => Some(LiteralValue::Number(*n)),
            TokenType::STRING(s) => Some(LiteralValue::Str(s.clone())),
            _ => None,
        };

        if let Some(value) = value {
            self.advance();
            return Ok(Expr::Literal { value, line });
        }

        if self.matches(TokenType::IDENTIFIER) {
            return Ok(Expr::Variable {
                name: token.lexeme.to_string(),
                line,
            });
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr: Expr = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after expression.")?;

            return Ok(Expr::Grouping {
                expr: Box::new(expr),
                line,
            });
        }

        if self.matches(TokenType::FUN) {
            self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'fun'.")?;
            let (params, body) = self.function_tail()?;

            return Ok(Expr::Lambda(Rc::new(FunctionDecl {
                name: None,
                params,
                body,
                line,
            })));
        }

        Err(self.error_at_current("Expected expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    fn match_operator<T: Copy>(&mut self, table: &[(TokenType, T)]) -> Option<T> {
        let found = table
            .iter()
            .find(|(ttype, _)| self.check(ttype.clone()))
            .map(|(_, op)| *op);

        if found.is_some() {
            self.advance();
        }

        found
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'a Token<'a>> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        Err(self.error_at_current(message))
    }

    fn error_at_current(&self, message: &str) -> SkyError {
        let token: &Token<'_> = self.peek();

        SkyError::parse(token.line, token.describe(), message)
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    /// Like [`check`](Self::check), one token further ahead.
    #[inline(always)]
    fn check_next(&self, ttype: TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|t| t.token_type == ttype)
    }

    #[inline(always)]
    fn advance(&mut self) -> &'a Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'a Token<'a> {
        self.tokens.get(self.current).unwrap_or(&END)
    }

    #[inline(always)]
    fn previous(&self) -> &'a Token<'a> {
        self.tokens
            .get(self.current.saturating_sub(1))
            .unwrap_or(&END)
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        let from: usize = self.current;

        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                break;
            }

            match self.peek().token_type {
                TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => break,
                _ => {}
            }

            self.advance();
        }

        debug!(
            "Synchronized: discarded {} token(s)",
            self.current - from
        );
    }
}

impl Iterator for Parser<'_> {
    type Item = Result<Stmt>;

    /// Parse the next top‑level declaration. Errors are yielded in source
    /// order; a declaration that needed recovery inside it is dropped in favour
    /// of its errors.
    fn next(&mut self) -> Option<Self::Item> {
        if self.errors.is_empty() && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                if self.errors.is_empty() {
                    return Some(Ok(stmt));
                }
            }
        }

        self.errors.pop_front().map(Err)
    }
}
