mod ast_printer;
mod expr;
mod interpreter;
mod lox_callable;
mod lox_class;
mod lox_function;
mod lox_instance;
mod native;
mod object;
mod parser;
mod scanner;
mod stmt;
mod token;
mod token_type;

use std::{env, fs::File, sync::Arc};

use ast_printer::AstPrinter;
use interpreter::{Interpreter, resolver::Resolver};
use object::Object;
use parser::Parser;
use scanner::Scanner;
use snafu::prelude::*;
use token::Token;
use tracing::{instrument, level_filters::LevelFilter, trace};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let code = match args.len() {
        1 => Lox::new().run_prompt(),
        3 => Lox::new().run_command(&args[1], &args[2]),
        _ => {
            eprintln!("Usage: rlox [tokenize|parse|evaluate|run] <filename>");
            64
        }
    };
    std::process::exit(code);
}

/// Diagnostics and traces go to stderr so stdout carries only program
/// output. `RUST_LOG` turns tracing on; `RLOX_LOG_FILE` adds a JSON trace.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into());
    let mut layers = Vec::new();
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .compact()
        .with_filter(filter)
        .boxed();
    layers.push(stderr);

    if let Ok(path) = env::var("RLOX_LOG_FILE") {
        let file = File::create(&path).expect("Could not create log file");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .without_time()
            .with_writer(Arc::new(file))
            .json()
            .with_span_list(false)
            .flatten_event(true)
            .with_current_span(false)
            .with_filter(LevelFilter::TRACE)
            .boxed();
        layers.push(file_layer);
    }

    tracing_subscriber::Registry::default().with(layers).init();
}

struct Lox {
    had_error: bool,
    had_runtime_error: bool,
    interpreter: Interpreter,
}

impl Lox {
    pub fn new() -> Lox {
        Self {
            had_error: false,
            had_runtime_error: false,
            interpreter: Interpreter::new(),
        }
    }

    pub fn run_command(mut self, command: &str, path: &str) -> i32 {
        let source = match read_source(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("{err}");
                return 64;
            }
        };

        match command {
            "tokenize" => self.tokenize(source),
            "parse" => self.parse_expression(source),
            "evaluate" => self.evaluate_expression(source),
            "run" => self.run_source(source),
            other => {
                eprintln!("Unknown command '{other}'");
                eprintln!("Usage: rlox [tokenize|parse|evaluate|run] <filename>");
                64
            }
        }
    }

    pub fn run_prompt(&mut self) -> i32 {
        let mut rl = rustyline::DefaultEditor::new().expect("Could not build REPL");
        loop {
            match rl.readline("> ") {
                Err(_) => return 0,
                Ok(line) => {
                    let _ = rl.add_history_entry(&line);
                    // Everything already reported; the prompt just moves on
                    let _ = self.run(line);
                }
            }
        }
    }

    fn tokenize(&mut self, source: String) -> i32 {
        let (tokens, had_error) = Scanner::new(source).scan_tokens();
        for token in &tokens {
            println!("{token}");
        }
        if had_error { 65 } else { 0 }
    }

    fn parse_expression(&mut self, source: String) -> i32 {
        match parse_one_expression(source) {
            Ok(expr) => {
                println!("{}", AstPrinter {}.print(&expr));
                0
            }
            Err(err) => {
                report(&err);
                65
            }
        }
    }

    fn evaluate_expression(&mut self, source: String) -> i32 {
        let expr = match parse_one_expression(source) {
            Ok(expr) => expr,
            Err(err) => {
                report(&err);
                return 65;
            }
        };
        match self.interpreter.interpret_expression(&expr) {
            Ok(value) => {
                println!("{value}");
                0
            }
            Err(err) => {
                eprintln!("{err}");
                70
            }
        }
    }

    fn run_source(&mut self, source: String) -> i32 {
        match self.run(source) {
            Ok(()) => 0,
            Err(_) => {
                if self.had_error {
                    65
                } else if self.had_runtime_error {
                    70
                } else {
                    panic!("Error but no error...")
                }
            }
        }
    }

    #[instrument(skip(self, script))]
    fn run(&mut self, script: String) -> Result<()> {
        self.had_error = false;
        self.had_runtime_error = false;

        let (tokens, had_scan_error) = Scanner::new(script).scan_tokens();
        if had_scan_error {
            self.had_error = true;
            return Err(LoxError::Fatal);
        }

        let mut parser = Parser::new(tokens);
        let stmts = match parser.parse() {
            Ok(stmts) => stmts,
            Err(err) => {
                self.had_error = true;
                report(&err);
                return Err(LoxError::Fatal);
            }
        };

        let mut resolver = Resolver::new(&mut self.interpreter);
        trace!("Resolving vars");
        resolver.resolve_all(&stmts).inspect_err(|_| {
            // Individual static errors were already reported
            self.had_error = true;
        })?;

        self.interpreter.interpret(&stmts).inspect_err(|err| {
            self.had_runtime_error = true;
            eprintln!("{err}");
        })?;
        Ok(())
    }
}

fn parse_one_expression(source: String) -> Result<expr::Expr> {
    let (tokens, had_error) = Scanner::new(source).scan_tokens();
    if had_error {
        return Err(LoxError::Fatal);
    }
    Parser::new(tokens).parse_expression()
}

fn read_source(path: &str) -> Result<String> {
    std::fs::read_to_string(path).context(FileSnafu { path })
}

fn report(err: &LoxError) {
    if !matches!(err, LoxError::Fatal) {
        eprintln!("{err}");
    }
}

#[derive(Debug, Snafu)]
pub enum LoxError {
    #[snafu(display("[line {line}] Error: {message}"))]
    Scan { line: usize, message: String },
    #[snafu(display("[line {line}] Error {whence}: {message}"))]
    Parsing { line: usize, whence: String, message: String },
    #[snafu(display("Could not read source file at '{path}'"))]
    File { source: std::io::Error, path: String },
    #[snafu(display("Fatal error, exiting"))]
    Fatal,
    #[snafu(display("{message}\n[line {}]", line.unwrap_or(0)))]
    Runtime { message: String, line: Option<usize> },
    #[snafu(display("Internal error: {message}"))]
    Internal { message: String },
    #[snafu()]
    Return { value: Object },
    #[snafu(whatever, display("Static analysis failed: {message}"))]
    Resolver {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>,  Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl LoxError {
    /// Syntax and static errors point at a token: `[line N] Error at 'x': msg`
    /// (or `at end` when the parser ran out of input).
    pub fn at(token: &Token, message: &str) -> LoxError {
        let message = message.to_string();
        match token.typ {
            token_type::TokenType::Eof => LoxError::Parsing {
                line: token.line,
                whence: "at end".to_string(),
                message,
            },
            _ => LoxError::Parsing {
                line: token.line,
                whence: format!("at '{}'", token.lexeme),
                message,
            },
        }
    }

    /// Fills in the source line on a runtime error raised below the level
    /// that knew it.
    pub fn add_line(self, line: usize) -> LoxError {
        match self {
            LoxError::Runtime { message, line: None } => LoxError::Runtime {
                message,
                line: Some(line),
            },
            other => other,
        }
    }
}

type Result<T> = std::result::Result<T, LoxError>;
