use std::path::PathBuf;

use thiserror::Error;

use crate::token::Position;

/// A grammar violation. Parsing of the current file stops at the first one.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("syntax error at {pos}: {message}")]
pub struct SyntaxError {
    pub pos: Position,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Some stage reported errors. The PHP was still generated.
    #[error("compilation failed with {count} reported error(s)")]
    Reported { count: usize, php: String },
}
