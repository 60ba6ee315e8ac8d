//! In-process pipes connecting pipeline stages.
//!
//! A pipe is a single-producer/single-consumer byte conduit. One chunk may
//! sit in the buffer without a reader; past that, writers block until the
//! reader catches up. Closing either end closes the pipe: subsequent writes
//! fail, while reads drain whatever is still buffered and then report end
//! of input.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::stream::{InStream, OutStream, Resource};

// One pending chunk of backpressure, like a buffered channel of size 1.
const MAX_PENDING: usize = 1;

struct State {
    chunks: VecDeque<Vec<u8>>,
    // read offset into the front chunk
    cursor: usize,
    open: bool,
}

struct Inner {
    state: Mutex<State>,
    readable: Condvar,
    writable: Condvar,
}

/// The write end of an in-process pipe.
pub struct PipeWriter {
    inner: Arc<Inner>,
}

/// The read end of an in-process pipe.
pub struct PipeReader {
    inner: Arc<Inner>,
}

/// Create a connected pipe, returning its write and read ends.
pub fn new_pipe() -> (Arc<PipeWriter>, Arc<PipeReader>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State {
            chunks: VecDeque::new(),
            cursor: 0,
            open: true,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        Arc::new(PipeWriter {
            inner: inner.clone(),
        }),
        Arc::new(PipeReader { inner }),
    )
}

fn close_pipe(inner: &Inner) {
    let mut state = inner.state.lock().unwrap();
    state.open = false;
    inner.readable.notify_all();
    inner.writable.notify_all();
}

impl Resource for PipeWriter {
    fn close(&self) -> io::Result<()> {
        close_pipe(&self.inner);
        Ok(())
    }
}

impl OutStream for PipeWriter {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if !state.open {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "write on closed pipe",
                ));
            }
            if state.chunks.len() < MAX_PENDING {
                state.chunks.push_back(buf.to_vec());
                self.inner.readable.notify_one();
                return Ok(buf.len());
            }
            state = self.inner.writable.wait(state).unwrap();
        }
    }
}

impl Resource for PipeReader {
    fn close(&self) -> io::Result<()> {
        close_pipe(&self.inner);
        Ok(())
    }
}

impl InStream for PipeReader {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.inner.state.lock().unwrap();
        loop {
            let served = state.chunks.front().map(|front| {
                let n = buf.len().min(front.len() - state.cursor);
                buf[..n].copy_from_slice(&front[state.cursor..state.cursor + n]);
                (n, state.cursor + n == front.len())
            });
            if let Some((n, exhausted)) = served {
                if exhausted {
                    state.chunks.pop_front();
                    state.cursor = 0;
                    self.inner.writable.notify_one();
                } else {
                    state.cursor += n;
                }
                return Ok(n);
            }
            if !state.open {
                return Ok(0);
            }
            state = self.inner.readable.wait(state).unwrap();
        }
    }
}
