//! Interpretation of POSIX-flavored command lines.
//!
//! The entry point is the [`execute`] function, which takes a block of
//! shell-like source text, tokenizes it, parses it into a forest of command
//! trees, and runs it: built-in commands in-process, everything else as
//! external executables found on `PATH`.
//!
//! The recognized syntax covers sequencing (`;`, newline), conditional
//! chaining (`&&`, `||`), pipelines (`|`), backgrounding (`&`), file
//! redirections (`>`, `>>`, `2>`, `2>>`, `&>`, `&>>`, `<`), stream merges
//! (`2>&1`, `1>&2`), here-documents (`<<`), single and double quotes,
//! escapes, variable expansion (`$NAME`), and command substitution
//! (`$(...)`).
//!
//! # Examples
//!
//! Run a script against the process's own standard streams:
//!
//! ```no_run
//! # fn dummy() -> seashell::Result<()> {
//! seashell::execute("ls | sort > listing.txt")?.wait();
//! # Ok(())
//! # }
//! ```
//!
//! Capture the output of a pipeline instead:
//!
//! ```
//! use seashell::IoProvider;
//!
//! let (iop, stdout, _stderr) = IoProvider::captured("");
//! seashell::execute_with("echo one && echo two", &iop).unwrap().wait();
//! iop.close();
//! assert_eq!(stdout.string(), "one\ntwo\n");
//! ```

#![warn(missing_docs)]

mod builtins;
mod closer;
mod command;
mod dev;
mod error;
mod executor;
mod launch;
mod lexer;
mod lookup;
mod parser;
mod pipe;
mod provider;
mod stream;

pub use self::builtins::{BUILTINS, BuiltinFn};
pub use self::closer::Closer;
pub use self::command::Command;
pub use self::error::{Error, Result};
pub use self::executor::{WaitHandle, execute, execute_with};
pub use self::lexer::{Token, TokenKind, lex};
pub use self::parser::parse;
pub use self::pipe::{PipeReader, PipeWriter, new_pipe};
pub use self::provider::IoProvider;
pub use self::stream::{
    Buffer, InStream, MemReader, OutStream, Reader, ReaderSlot, Resource, Writer, WriterSlot,
};

#[cfg(test)]
mod tests {
    mod execute;
    mod lexer;
    mod parser;
    mod plumbing;
}
