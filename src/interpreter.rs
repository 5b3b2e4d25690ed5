use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info, trace};

use crate::environment::Environment;
use crate::error::{Result, SkyError};
use crate::expr::{BinaryOp, Expr, LiteralValue, LogicalOp, UnaryOp};
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{FunctionDecl, Stmt};
use crate::value::{Callable, NativeFunction, SkyFunction, Value};

/// Default bound on nested calls before "Stack overflow." is reported.
pub const DEFAULT_CALL_LIMIT: usize = 200;

/// How a statement finished. Anything but `Normal` unwinds enclosing blocks
/// until a loop (`Break`, `Continue`) or a call (`Return`) consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Tree‑walking evaluator.
///
/// All state is explicit: the global scope, the scope currently in effect,
/// resolved binding distances, the output sink for `print`, and the depth of
/// active calls. Independent interpreters share nothing.
///
/// Programs are expected to have gone through the
/// [`Resolver`](crate::resolver::Resolver) first; a variable it did not
/// record as local is looked up in the global scope.
pub struct Interpreter<W: Write = io::Stdout> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,

    /// Scope distance of each local variable occurrence, keyed by the
    /// address of its `Variable`/`Assign` node.
    locals: HashMap<*const Expr, usize>,
    out: W,
    depth: usize,
    call_limit: usize,
}

impl Interpreter<io::Stdout> {
    /// Interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter writing `print` output to `out`, with native
    /// functions such as `clock` predefined.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        for native in natives() {
            debug!("Defining native function '{}'", native.name);

            globals
                .borrow_mut()
                .define(native.name, Value::Callable(Rc::new(Callable::Native(native))));
        }

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
            depth: 0,
            call_limit: DEFAULT_CALL_LIMIT,
        }
    }

    /// Bound the number of nested calls.
    pub fn with_call_limit(mut self, limit: usize) -> Self {
        self.call_limit = limit;
        self
    }

    /// Record that `expr` refers to a binding `depth` scopes out.
    pub fn note_local(&mut self, expr: &Expr, depth: usize) {
        self.locals.insert(expr as *const Expr, depth);
    }

    /// Record that `expr` refers to a global. Clears anything noted for a
    /// node that previously lived at the same address.
    pub fn note_global(&mut self, expr: &Expr) {
        self.locals.remove(&(expr as *const Expr));
    }

    pub fn globals(&self) -> &Rc<RefCell<Environment>> {
        &self.globals
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Interprets a list of statements (a "program"), stopping at the first
    /// runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        // Top level is never inside a call or a loop, so the parser and
        // `Stmt::Return` guarantee nothing but `Normal` arrives here.
        let result: Result<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(|_| ()));

        match result {
            Ok(()) => self.out.flush()?,

            // Output produced before a runtime error is still delivered, but
            // the runtime error is what gets reported.
            Err(e) => {
                let _ = self.out.flush();
                return Err(e);
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        trace!("Executing statement on line {}", stmt.line());

        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Print { expr, .. } => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);

                Ok(Flow::Normal)
            }

            Stmt::Var {
                name, initializer, ..
            } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name, value);
                self.environment.borrow_mut().define(name, value);

                Ok(Flow::Normal)
            }

            Stmt::Block { statements, .. } => {
                let scope = Environment::nested(&self.environment);

                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                let scope = Environment::nested(&self.environment);

                self.with_environment(scope, |this| {
                    if let Some(init) = initializer {
                        this.execute(init)?;
                    }

                    loop {
                        if let Some(cond) = condition {
                            if !this.evaluate(cond)?.is_truthy() {
                                break;
                            }
                        }

                        match this.execute(body)? {
                            Flow::Break => break,
                            Flow::Normal | Flow::Continue => {}
                            ret @ Flow::Return(_) => return Ok(ret),
                        }

                        if let Some(incr) = increment {
                            this.evaluate(incr)?;
                        }
                    }

                    Ok(Flow::Normal)
                })
            }

            Stmt::Function(decl) => {
                let name: &str = decl.display_name();

                debug!("Defining function '{}' with {} parameters", name, decl.arity());

                let function: Value = self.closure(decl);
                self.environment.borrow_mut().define(name, function);

                Ok(Flow::Normal)
            }

            Stmt::Return { value, line } => {
                if self.depth == 0 {
                    return Err(SkyError::runtime(*line, "Can't return from top-level code."));
                }

                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Continue { .. } => Ok(Flow::Continue),
        }
    }

    /// Run `statements` in `scope`, restoring the previous scope afterwards
    /// whether they succeed or fail.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        scope: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        self.with_environment(scope, |this| {
            for stmt in statements {
                match this.execute(stmt)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }

            Ok(Flow::Normal)
        })
    }

    fn with_environment<T>(
        &mut self,
        scope: Rc<RefCell<Environment>>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.environment, scope);
        let result = f(self);
        self.environment = previous;

        result
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping { expr, .. } => self.evaluate(expr),

            Expr::Variable { name, line } => match self.locals.get(&(expr as *const Expr)) {
                Some(&distance) => Environment::get_at(&self.environment, distance, name, *line),
                None => self.globals.borrow().get(name, *line),
            },

            Expr::Assign { name, value, line } => {
                let assigned: Value = self.evaluate(value)?;

                match self.locals.get(&(expr as *const Expr)) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        name,
                        assigned.clone(),
                        *line,
                    )?,
                    None => self
                        .globals
                        .borrow_mut()
                        .assign(name, assigned.clone(), *line)?,
                }

                Ok(assigned)
            }

            Expr::Unary {
                operator,
                right,
                line,
            } => {
                let right: Value = self.evaluate(right)?;

                match (operator, right) {
                    (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
                    (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Negate, value) => Err(SkyError::runtime(
                        *line,
                        format!("Operand of '-' must be a number, got {}.", value.type_name()),
                    )),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
                line,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(*operator, left, right, *line)
            }

            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => {
                let left: Value = self.evaluate(left)?;

                let decided = match operator {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Call {
                callee,
                arguments,
                line,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call(&callee, &args, *line)
            }

            Expr::Lambda(decl) => Ok(self.closure(decl)),
        }
    }

    /// A function value closing over the current scope.
    fn closure(&self, decl: &Rc<FunctionDecl>) -> Value {
        Value::Callable(Rc::new(Callable::Function(SkyFunction {
            decl: Rc::clone(decl),
            closure: Rc::clone(&self.environment),
        })))
    }

    /// Invokes a callable (native or user-defined function).
    fn call(&mut self, callee: &Value, args: &[Value], line: usize) -> Result<Value> {
        let Value::Callable(callable) = callee else {
            return Err(SkyError::runtime(
                line,
                format!("Can only call functions, got {}.", callee.type_name()),
            ));
        };

        if args.len() != callable.arity() {
            return Err(SkyError::runtime(
                line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    args.len()
                ),
            ));
        }

        match callable.as_ref() {
            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);

                (native.func)(args).map_err(|msg| SkyError::runtime(line, msg))
            }

            Callable::Function(function) => {
                debug!("Calling user-defined function '{}'", callable.name());

                if self.depth >= self.call_limit {
                    return Err(SkyError::runtime(line, "Stack overflow."));
                }

                let scope = Environment::nested(&function.closure);

                for (param, arg) in function.decl.params.iter().zip(args) {
                    scope.borrow_mut().define(param, arg.clone());
                }

                self.depth += 1;
                let result = self.execute_block(&function.decl.body, scope);
                self.depth -= 1;

                match result? {
                    Flow::Return(value) => Ok(value),
                    // Loop jumps cannot leave a function body; the parser
                    // rejects them outside loops.
                    Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Nil),
                }
            }
        }
    }
}

fn binary(operator: BinaryOp, left: Value, right: Value, line: usize) -> Result<Value> {
    use crate::value::Value::{Number, String as Str};

    let value = match (operator, &left, &right) {
        (BinaryOp::Equal, _, _) => Value::Bool(left == right),
        (BinaryOp::NotEqual, _, _) => Value::Bool(left != right),

        (BinaryOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinaryOp::Add, Str(a), Str(b)) => Value::from(format!("{}{}", a, b)),
        (BinaryOp::Add, _, _) => {
            return Err(operand_error(
                operator,
                "two numbers or two strings",
                &left,
                &right,
                line,
            ))
        }

        (BinaryOp::Subtract, Number(a), Number(b)) => Number(a - b),
        (BinaryOp::Multiply, Number(a), Number(b)) => Number(a * b),
        (BinaryOp::Divide, Number(_), Number(b)) if *b == 0.0 => {
            return Err(SkyError::runtime(line, "Division by zero."));
        }
        (BinaryOp::Divide, Number(a), Number(b)) => Number(a / b),
        (BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide, _, _) => {
            return Err(operand_error(operator, "numbers", &left, &right, line));
        }

        (_, Number(a), Number(b)) => Value::Bool(compare(operator, a.partial_cmp(b))),
        (_, Str(a), Str(b)) => Value::Bool(compare(operator, Some(a.cmp(b)))),
        (_, _, _) => {
            return Err(operand_error(
                operator,
                "two numbers or two strings",
                &left,
                &right,
                line,
            ))
        }
    };

    trace!("{} {} {} => {}", left, operator, right, value);

    Ok(value)
}

/// Apply a comparison operator to an ordering; `None` (NaN) compares false.
fn compare(operator: BinaryOp, ordering: Option<Ordering>) -> bool {
    match (operator, ordering) {
        (_, None) => false,
        (BinaryOp::Less, Some(o)) => o == Ordering::Less,
        (BinaryOp::LessEqual, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Greater, Some(o)) => o == Ordering::Greater,
        (BinaryOp::GreaterEqual, Some(o)) => o != Ordering::Less,
        (_, Some(_)) => false,
    }
}

fn operand_error(
    operator: BinaryOp,
    expected: &str,
    left: &Value,
    right: &Value,
    line: usize,
) -> SkyError {
    SkyError::runtime(
        line,
        format!(
            "Operands of '{}' must be {}, got {} and {}.",
            operator,
            expected,
            left.type_name(),
            right.type_name()
        ),
    )
}

/// Host functions available in every global scope.
fn natives() -> Vec<NativeFunction> {
    vec![NativeFunction {
        name: "clock",
        arity: 0,
        func: |_args: &[Value]| {
            let now = chrono::Utc::now();
            let seconds: f64 = now.timestamp() as f64
                + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0;

            trace!("Native function 'clock' returned: {}", seconds);

            Ok(Value::Number(seconds))
        },
    }]
}
