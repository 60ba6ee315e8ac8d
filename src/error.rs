use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while interpreting a script.
///
/// Lexical and parser errors carry the line and column of the offending
/// byte in the source text. Positions are derived from byte offsets and may
/// be approximate inside quoted or expanded regions.
#[derive(Debug, Error)]
pub enum Error {
    /// Tokenization failed.
    #[error("lexical error at line {line}, column {column}: {message}")]
    Lexical {
        /// 1-based source line.
        line: usize,
        /// 1-based source column.
        column: usize,
        /// Human-readable description.
        message: String,
    },

    /// The token stream could not be turned into commands.
    #[error("parser error at line {line}, column {column}: {message}")]
    Parser {
        /// 1-based source line.
        line: usize,
        /// 1-based source column.
        column: usize,
        /// Human-readable description.
        message: String,
    },

    /// A command failed to execute, or exited with a non-zero status.
    #[error("{message}")]
    Execution {
        /// Description naming the failing command.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<Error>>,
    },

    /// An I/O error outside of any more specific context.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn lexical(index: usize, text: &str, message: impl Into<String>) -> Error {
        let (line, column) = position(text, index);
        Error::Lexical {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn parser(index: usize, text: &str, message: impl Into<String>) -> Error {
        let (line, column) = position(text, index);
        Error::Parser {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn execution(message: impl Into<String>) -> Error {
        Error::Execution {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn wrap(message: impl Into<String>, source: Error) -> Error {
        Error::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Map a byte offset to a 1-based (line, column) pair.
fn position(text: &str, index: usize) -> (usize, usize) {
    let (mut line, mut column) = (1, 1);
    for (i, c) in text.char_indices() {
        if i >= index {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
