//! Evaluation of parsed command forests.
//!
//! Each top-level command either runs synchronously on the caller's thread
//! or, when backgrounded (explicitly with `&` or implicitly as a pipeline
//! producer), on its own thread recorded in the returned [`WaitHandle`].
//! Once a command finishes, its output streams are closed so downstream
//! pipeline readers observe end of input, and the provider's closer
//! releases the files opened for it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

use crate::builtins;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::launch;
use crate::lexer;
use crate::parser;
use crate::provider::IoProvider;
use crate::stream::{OutStream, Resource};

/// Handle on background work started by an execute call.
///
/// Dropping the handle does not stop or wait for the work; call
/// [`wait`](Self::wait) to block until every background command finishes.
#[derive(Debug)]
pub struct WaitHandle {
    handles: Vec<JoinHandle<()>>,
}

impl WaitHandle {
    /// Block until all background commands have finished.
    pub fn wait(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    /// True if no background work was started.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Run `text` against a provider bound to the process standard streams.
pub fn execute(text: &str) -> Result<WaitHandle> {
    let iop = IoProvider::from_os();
    let result = execute_with(text, &iop);
    iop.close();
    result
}

/// Run `text` against the given provider.
///
/// Returns once every synchronous top-level command has finished; the
/// returned handle tracks the backgrounded ones. A failing synchronous
/// command aborts the commands after it; background failures are reported
/// on the provider's stderr.
pub fn execute_with(text: &str, iop: &Arc<IoProvider>) -> Result<WaitHandle> {
    let tokens = lexer::lex(text, iop)?;
    let commands = parser::parse(text, &tokens, iop)?;

    let mut handles = Vec::new();
    for (i, command) in commands.into_iter().enumerate() {
        if command.background {
            debug!("spawning background command {i}: {command}");
            let iop = Arc::clone(iop);
            handles.push(thread::spawn(move || {
                let result = run_tree(&command, &iop);
                finish_command(&command, &iop);
                if let Err(err) = result {
                    let message =
                        format!("failed to execute command {i}: \"{command}\": {err}\n");
                    let _ = iop.default_err.write_all(message.as_bytes());
                }
            }));
        } else {
            let result = run_tree(&command, iop);
            finish_command(&command, iop);
            if let Err(err) = result {
                let message = format!("failed to execute command {i}: \"{command}\": {err}");
                return Err(Error::wrap(message, err));
            }
        }
    }

    Ok(WaitHandle { handles })
}

// Close the command's output streams so pipeline peers see EOF, then
// release everything registered with the provider for this round.
fn finish_command(command: &Command, iop: &IoProvider) {
    let _ = command.stdout_handle().close();
    let _ = command.stderr_handle().close();
    iop.close();
}

// Evaluate a command and its conditional successors: `or` runs on failure,
// `and` on success. Unconsumed failures propagate to the caller.
fn run_tree(command: &Command, iop: &Arc<IoProvider>) -> Result<()> {
    match run_one(command, iop) {
        Err(err) => match &command.or {
            Some(next) => run_tree(next, iop),
            None => Err(err),
        },
        Ok(()) => match &command.and {
            Some(next) => run_tree(next, iop),
            None => Ok(()),
        },
    }
}

fn run_one(command: &Command, iop: &Arc<IoProvider>) -> Result<()> {
    match builtins::find(&command.executable) {
        Some(builtin) => builtin(command, iop),
        None => launch::run(command),
    }
}
