use std::sync::Arc;

use crate::closer::Closer;
use crate::stream::{self, Buffer, MemReader, Reader, Writer};

/// The bundle of default streams and resources in effect during a parse and
/// execute invocation.
///
/// Freshly parsed commands borrow the provider's default streams until a
/// redirection installs something else. Files opened along the way are
/// registered in the provider's [`Closer`] and released together.
pub struct IoProvider {
    /// Default standard output for new commands.
    pub default_out: Writer,
    /// Default standard error for new commands.
    pub default_err: Writer,
    /// Default standard input for new commands.
    pub default_in: Reader,
    /// Resources opened while wiring commands.
    pub closer: Closer,
}

impl IoProvider {
    /// A provider bound to the process's own standard streams.
    pub fn from_os() -> Arc<IoProvider> {
        Arc::new(IoProvider {
            default_out: Arc::new(stream::Stdout),
            default_err: Arc::new(stream::Stderr),
            default_in: Arc::new(stream::Stdin),
            closer: Closer::new(),
        })
    }

    /// A provider that captures stdout and stderr into in-memory buffers.
    ///
    /// If `stdin` is non-empty, it becomes the default standard input;
    /// otherwise the process's stdin is inherited. Returns the provider and
    /// the two buffers for inspection after execution.
    pub fn captured(stdin: &str) -> (Arc<IoProvider>, Arc<Buffer>, Arc<Buffer>) {
        let out = Arc::new(Buffer::new());
        let err = Arc::new(Buffer::new());
        let default_in: Reader = if stdin.is_empty() {
            Arc::new(stream::Stdin)
        } else {
            Arc::new(MemReader::new(stdin.as_bytes()))
        };
        let iop = Arc::new(IoProvider {
            default_out: out.clone(),
            default_err: err.clone(),
            default_in,
            closer: Closer::new(),
        });
        (iop, out, err)
    }

    /// A provider for command substitution.
    ///
    /// Stderr and stdin are borrowed from the parent; stdout is a fresh
    /// buffer so the captured output can be spliced into the surrounding
    /// token. The subshell gets its own closer.
    pub fn subshell(parent: &IoProvider) -> (Arc<IoProvider>, Arc<Buffer>) {
        let out = Arc::new(Buffer::new());
        let iop = Arc::new(IoProvider {
            default_out: out.clone(),
            default_err: parent.default_err.clone(),
            default_in: parent.default_in.clone(),
            closer: Closer::new(),
        });
        (iop, out)
    }

    /// Release every resource registered with this provider's closer.
    pub fn close(&self) {
        self.closer.close();
    }
}
