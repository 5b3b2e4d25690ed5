//! The text → tokens → AST → resolution → evaluation pipeline.
//!
//! A [`Session`] owns one [`Interpreter`], so globals defined by one call to
//! [`Session::run`] stay visible to the next. The REPL feeds it one line at a
//! time; script mode feeds it a whole file once.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::RunError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_all;
use crate::stmt::Stmt;

pub struct Session<W: Write = io::Stdout> {
    interpreter: Interpreter<W>,
}

impl Session<io::Stdout> {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }
}

impl Default for Session<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Session<W> {
    pub fn with_output(out: W) -> Self {
        Self::with_interpreter(Interpreter::with_output(out))
    }

    pub fn with_interpreter(interpreter: Interpreter<W>) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn into_interpreter(self) -> Interpreter<W> {
        self.interpreter
    }

    /// Scan, parse, resolve and execute `source`.
    ///
    /// Syntax errors are all collected and nothing runs; a runtime error stops
    /// execution, keeping whatever was printed before it.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        info!("Running {} bytes of source", source.len());

        let program: Vec<Stmt> = parse(source)?;

        Resolver::new(&mut self.interpreter)
            .resolve(&program)
            .map_err(RunError::Syntax)?;

        debug!("Executing {} statement(s)", program.len());

        self.interpreter
            .interpret(&program)
            .map_err(RunError::Runtime)
    }
}

/// Scan and parse `source` into a program without running it.
pub fn parse(source: &str) -> Result<Vec<Stmt>, RunError> {
    let tokens = scan_all(source).map_err(RunError::Syntax)?;

    Parser::new(&tokens).parse().map_err(RunError::Syntax)
}
