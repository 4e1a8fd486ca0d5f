//! A compiler for the Phase language, targeting PHP.
//!
//! Compilation runs [`lexer::scan`], [`parser::parse`],
//! [`typer::type_program`] and [`code_gen::generate`] in turn. Every stage
//! reports problems through a [`report::ErrorReporter`]. Only the parser
//! stops early, with a [`error::SyntaxError`].

use std::rc::Rc;

use tracing::debug;

use crate::{
    code_gen::GeneratorConfig,
    context::Context,
    error::CompileError,
    report::{CountingReporter, ErrorReporter},
};

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The typer gives every expression of an AST its best-known type.
pub mod typer;

/// The code generator maps a typed AST into PHP source.
pub mod code_gen;

pub mod ast;
pub mod context;
pub mod error;
pub mod report;
pub mod scope;
pub mod synth;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt {
        pub mod tree;
    }
    #[cfg(test)]
    pub(crate) mod test_utils;
}

/// Compiles one source file to PHP.
///
/// Fails on a syntax error, or when any stage reported an error. In the
/// latter case the error still carries the generated PHP.
pub fn compile(
    src: &str,
    file: Rc<str>,
    context: &mut Context,
    config: &GeneratorConfig,
    reporter: &dyn ErrorReporter,
) -> Result<String, CompileError> {
    debug!(%file, bytes = src.len(), "compiling");
    let reporter = CountingReporter::new(reporter);

    let tokens = lexer::scan(src, file, &reporter);
    let stmts = parser::parse(&tokens, &reporter)?;
    let typed = typer::type_program(&stmts, context, &reporter);
    let php = code_gen::generate(&stmts, &typed.table, context, config, &reporter);

    match reporter.count() {
        0 => Ok(php),
        count => Err(CompileError::Reported { count, php }),
    }
}
