use std::fmt;
use std::sync::{Arc, Mutex};

use crate::provider::IoProvider;
use crate::stream::{Reader, ReaderSlot, Writer, WriterSlot};

// Chains come out of the parser as trees, so this bound is never reached in
// practice; it only guards the recursive Display against pathological
// hand-built values.
const MAX_CHAIN_DEPTH: usize = 64;

/// A single parsed command.
///
/// The three stream positions are aliasable slots: `2>&1` makes the stderr
/// slot *be* the stdout slot, so a later stdout redirection carries stderr
/// along with it. After parsing, every slot holds a concrete stream.
pub struct Command {
    /// Executable or builtin name.
    pub executable: String,
    /// Arguments, in order.
    pub arguments: Vec<String>,
    /// Run concurrently with the remaining commands.
    pub background: bool,
    /// Standard output slot.
    pub stdout: WriterSlot,
    /// Standard error slot.
    pub stderr: WriterSlot,
    /// Standard input slot.
    pub stdin: ReaderSlot,
    /// Successor to run when this command succeeds.
    pub and: Option<Box<Command>>,
    /// Successor to run when this command fails.
    pub or: Option<Box<Command>>,
}

impl Command {
    /// A fresh command wired to the provider's default streams.
    pub fn new(iop: &IoProvider) -> Command {
        Command {
            executable: String::new(),
            arguments: Vec::new(),
            background: false,
            stdout: Arc::new(Mutex::new(iop.default_out.clone())),
            stderr: Arc::new(Mutex::new(iop.default_err.clone())),
            stdin: Arc::new(Mutex::new(iop.default_in.clone())),
            and: None,
            or: None,
        }
    }

    /// Install a new stdout handle, writing through the slot so aliased
    /// streams are redirected too.
    pub fn set_stdout(&self, w: Writer) {
        *self.stdout.lock().unwrap() = w;
    }

    /// Install a new stderr handle.
    pub fn set_stderr(&self, w: Writer) {
        *self.stderr.lock().unwrap() = w;
    }

    /// Install a new stdin handle.
    pub fn set_stdin(&self, r: Reader) {
        *self.stdin.lock().unwrap() = r;
    }

    /// The stream currently installed in the stdout slot.
    pub fn stdout_handle(&self) -> Writer {
        self.stdout.lock().unwrap().clone()
    }

    /// The stream currently installed in the stderr slot.
    pub fn stderr_handle(&self) -> Writer {
        self.stderr.lock().unwrap().clone()
    }

    /// The stream currently installed in the stdin slot.
    pub fn stdin_handle(&self) -> Reader {
        self.stdin.lock().unwrap().clone()
    }

    fn fmt_at_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > MAX_CHAIN_DEPTH {
            return f.write_str("...");
        }
        f.write_str(&self.executable)?;
        for arg in &self.arguments {
            write!(f, " {arg:?}")?;
        }
        if let Some(or) = &self.or {
            f.write_str(" || ")?;
            or.fmt_at_depth(f, depth + 1)?;
        }
        if let Some(and) = &self.and {
            f.write_str(" && ")?;
            and.fmt_at_depth(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at_depth(f, 0)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command {{ {self} }}")
    }
}
