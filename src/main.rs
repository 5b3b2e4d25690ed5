use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use sky::ast_printer::AstPrinter;
use sky::error::{RunError, SkyError};
use sky::scanner::Scanner;
use sky::session::{self, Session};

/// Exit statuses, following the BSD `sysexits` convention.
const EXIT_USAGE: i32 = 64;
const EXIT_DATA: i32 = 65;
const EXIT_SOFTWARE: i32 = 70;
const EXIT_IO: i32 = 74;

#[derive(ClapParser, Debug)]
#[command(
    version,
    about = "Sky language interpreter",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run; starts the interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable debug logging to sky.log
    #[arg(long, global = true)]
    log: bool,

    /// Emit tokens and diagnostics as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize { filename: PathBuf },

    /// Parses a file and prints its syntax tree
    Parse { filename: PathBuf },

    /// Runs a file as a Sky program
    Run { filename: PathBuf },

    /// Starts the interactive prompt
    Repl,
}

/// Reads a whole source file as UTF‑8 text.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut source = String::new();

    let bytes = reader
        .read_to_string(&mut source)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(source)
}

fn init_logger(to_file: bool) -> Result<()> {
    if !to_file {
        // Honour RUST_LOG on stderr; silent by default.
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
        return Ok(());
    }

    let log_file = File::create("sky.log").context("Failed to create sky.log")?;

    // Write to file with module and source line of each record
    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("sky::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to sky.log");
    Ok(())
}

/// Renders diagnostics on stderr, as text or JSON lines.
struct Reporter {
    json: bool,
}

impl Reporter {
    fn report(&self, errors: &[SkyError]) {
        for error in errors {
            debug!("Reporting: {}", error);

            if self.json {
                match serde_json::to_string(&error.diagnostic()) {
                    Ok(line) => eprintln!("{}", line),
                    Err(_) => eprintln!("{}", error),
                }
            } else {
                eprintln!("{}", error);
            }
        }
    }

    fn exit_code(error: &RunError) -> i32 {
        match error {
            RunError::Syntax(_) => EXIT_DATA,
            RunError::Runtime(_) => EXIT_SOFTWARE,
        }
    }
}

fn tokenize(filename: &Path, reporter: &Reporter) -> Result<i32> {
    let source = read_file(filename)?;
    let mut status = 0;

    for item in Scanner::new(&source) {
        match item {
            Ok(token) if reporter.json => println!("{}", serde_json::to_string(&token)?),
            Ok(token) => println!("{}", token),
            Err(e) => {
                status = EXIT_DATA;
                reporter.report(std::slice::from_ref(&e));
            }
        }
    }

    Ok(status)
}

fn parse(filename: &Path, reporter: &Reporter) -> Result<i32> {
    let source = read_file(filename)?;

    match session::parse(&source) {
        Ok(program) => {
            println!("{}", AstPrinter::print_program(&program));
            Ok(0)
        }

        Err(e) => {
            reporter.report(e.errors());
            Ok(Reporter::exit_code(&e))
        }
    }
}

fn run_file(filename: &Path, reporter: &Reporter) -> Result<i32> {
    let source = read_file(filename)?;
    let mut session = Session::new();

    match session.run(&source) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(0)
        }

        Err(e) => {
            reporter.report(e.errors());
            Ok(Reporter::exit_code(&e))
        }
    }
}

fn run_prompt(reporter: &Reporter) -> Result<i32> {
    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    let mut session = Session::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let _ = editor.add_history_entry(line.as_str());

                // Errors are reported and the prompt carries on.
                if let Err(e) = session.run(&line) {
                    reporter.report(e.errors());
                }
            }

            Err(ReadlineError::Interrupted) => continue,

            Err(ReadlineError::Eof) => break,

            Err(e) => return Err(e).context("Failed to read input line"),
        }
    }

    Ok(0)
}

fn main() {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not usage errors.
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    if let Err(e) = init_logger(args.log) {
        eprintln!("{:#}", e);
        process::exit(EXIT_IO);
    }

    info!("CLI arguments: {:?}", args);

    let reporter = Reporter { json: args.json };

    let outcome = match (&args.command, &args.script) {
        (Some(Commands::Tokenize { filename }), _) => tokenize(filename, &reporter),
        (Some(Commands::Parse { filename }), _) => parse(filename, &reporter),
        (Some(Commands::Run { filename }), _) | (None, Some(filename)) => {
            run_file(filename, &reporter)
        }
        (Some(Commands::Repl), _) | (None, None) => run_prompt(&reporter),
    };

    match outcome {
        Ok(0) => {}
        Ok(code) => {
            debug!("Exiting with code {}", code);
            process::exit(code);
        }
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(EXIT_IO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let syntax = RunError::Syntax(vec![SkyError::lex(1, "Unexpected character: $")]);
        let runtime = RunError::Runtime(SkyError::runtime(1, "Division by zero."));

        assert_eq!(Reporter::exit_code(&syntax), EXIT_DATA);
        assert_eq!(Reporter::exit_code(&runtime), EXIT_SOFTWARE);
    }

    #[test]
    fn cli_accepts_script_or_subcommand() {
        let cli = Cli::try_parse_from(["sky", "prog.sky"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.script, Some(PathBuf::from("prog.sky")));

        let cli = Cli::try_parse_from(["sky", "--json", "tokenize", "prog.sky"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::Tokenize { .. })));

        assert!(Cli::try_parse_from(["sky", "a.sky", "b.sky"]).is_err());
    }
}
