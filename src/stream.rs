//! Stream handles used to wire command standard streams.
//!
//! A handle may wrap an OS standard stream, an open file, an in-memory
//! buffer, a pipe end, or one of the special `/dev` devices. Handles take
//! `&self` for all operations and carry their own synchronization, so they
//! can be shared freely between commands and pipeline threads.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crate::closer::Closer;
use crate::dev;

/// A resource that can be released.
///
/// `close` is idempotent. Handles wrapping OS standard streams implement it
/// as a no-op so that closing a command's streams never tears down the
/// process's own stdio.
pub trait Resource: Send + Sync {
    /// Release the underlying resource. Calling this twice is harmless.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A writable stream handle.
pub trait OutStream: Resource {
    /// Write some bytes, returning how many were accepted.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered output, if any.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Write the entire buffer.
    fn write_all(&self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ));
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// A readable stream handle.
pub trait InStream: Resource {
    /// Read into `buf`, returning the number of bytes read. `Ok(0)` means
    /// end of input.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Shared writable handle.
pub type Writer = Arc<dyn OutStream>;
/// Shared readable handle.
pub type Reader = Arc<dyn InStream>;

/// An aliasable slot holding a writer.
///
/// Two commands (or a command's stdout and stderr) may share one slot, so
/// that installing a new handle through either of them redirects both.
pub type WriterSlot = Arc<Mutex<Writer>>;
/// An aliasable slot holding a reader.
pub type ReaderSlot = Arc<Mutex<Reader>>;

const COPY_BUF: usize = 8192;

/// Pump `r` into `w` until end of input, returning the number of bytes
/// copied.
pub fn copy(r: &dyn InStream, w: &dyn OutStream) -> io::Result<u64> {
    let mut buf = [0u8; COPY_BUF];
    let mut total = 0u64;
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        w.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Read `r` to end of input.
pub fn read_to_end(r: &dyn InStream) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; COPY_BUF];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// The process's standard output. Close is a no-op.
pub struct Stdout;

impl Resource for Stdout {}

impl OutStream for Stdout {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().lock().write(buf)
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// The process's standard error. Close is a no-op.
pub struct Stderr;

impl Resource for Stderr {}

impl OutStream for Stderr {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().lock().write(buf)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().lock().flush()
    }
}

/// The process's standard input. Close is a no-op.
pub struct Stdin;

impl Resource for Stdin {}

impl InStream for Stdin {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }
}

/// An in-memory output buffer.
///
/// Used as the stdout of subshell providers so command substitution can
/// capture output, and by captured providers in tests and embedders.
#[derive(Default)]
pub struct Buffer {
    data: Mutex<Vec<u8>>,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new() -> Buffer {
        Buffer::default()
    }

    /// The accumulated bytes.
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    /// The accumulated bytes as a string, with invalid UTF-8 replaced.
    pub fn string(&self) -> String {
        String::from_utf8_lossy(&self.data.lock().unwrap()).into_owned()
    }
}

impl Resource for Buffer {}

impl OutStream for Buffer {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// An in-memory reader over a fixed byte sequence.
///
/// Backs here-documents and captured stdin.
pub struct MemReader {
    data: Mutex<io::Cursor<Vec<u8>>>,
}

impl MemReader {
    /// Create a reader over `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> MemReader {
        MemReader {
            data: Mutex::new(io::Cursor::new(data.into())),
        }
    }
}

impl Resource for MemReader {}

impl InStream for MemReader {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.lock().unwrap().read(buf)
    }
}

/// A file opened for writing. Writes after close fail.
pub struct FileWriter {
    file: Mutex<Option<File>>,
}

impl Resource for FileWriter {
    fn close(&self) -> io::Result<()> {
        self.file.lock().unwrap().take();
        Ok(())
    }
}

impl OutStream for FileWriter {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock().unwrap().as_ref() {
            Some(mut f) => f.write(buf),
            None => Err(closed()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.file.lock().unwrap().as_ref() {
            Some(mut f) => f.flush(),
            None => Ok(()),
        }
    }
}

/// A file opened for reading. Reads after close return end of input.
pub struct FileReader {
    file: Mutex<Option<File>>,
}

impl Resource for FileReader {
    fn close(&self) -> io::Result<()> {
        self.file.lock().unwrap().take();
        Ok(())
    }
}

impl InStream for FileReader {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.lock().unwrap().as_ref() {
            Some(mut f) => f.read(buf),
            None => Ok(0),
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream is closed")
}

/// Open `path` for writing, truncating any existing contents. The handle is
/// registered with `closer`. Special paths bypass the filesystem.
pub fn open_writer(closer: &Closer, path: &str) -> io::Result<Writer> {
    if let Some(w) = special_writer(path) {
        return Ok(w);
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let handle = Arc::new(FileWriter {
        file: Mutex::new(Some(file)),
    });
    closer.add(handle.clone());
    Ok(handle)
}

/// Open `path` for writing, positioned at the end. The handle is registered
/// with `closer`. Special paths bypass the filesystem.
pub fn open_append_writer(closer: &Closer, path: &str) -> io::Result<Writer> {
    if let Some(w) = special_writer(path) {
        return Ok(w);
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let handle = Arc::new(FileWriter {
        file: Mutex::new(Some(file)),
    });
    closer.add(handle.clone());
    Ok(handle)
}

/// Open `path` for reading. The handle is registered with `closer`. Special
/// paths bypass the filesystem.
pub fn open_reader(closer: &Closer, path: &str) -> io::Result<Reader> {
    if let Some(r) = special_reader(path) {
        return Ok(r);
    }
    let file = File::open(path)?;
    let handle = Arc::new(FileReader {
        file: Mutex::new(Some(file)),
    });
    closer.add(handle.clone());
    Ok(handle)
}

fn special_writer(path: &str) -> Option<Writer> {
    match normalize(path).as_str() {
        "/dev/null" => Some(Arc::new(dev::Null)),
        "/dev/zero" => Some(Arc::new(dev::Zero)),
        "/dev/random" | "/dev/urandom" => Some(Arc::new(dev::Random)),
        "/dev/stdout" => Some(Arc::new(Stdout)),
        "/dev/stderr" => Some(Arc::new(Stderr)),
        _ => None,
    }
}

fn special_reader(path: &str) -> Option<Reader> {
    match normalize(path).as_str() {
        "/dev/null" => Some(Arc::new(dev::Null)),
        "/dev/zero" => Some(Arc::new(dev::Zero)),
        "/dev/random" | "/dev/urandom" => Some(Arc::new(dev::Random)),
        "/dev/stdin" => Some(Arc::new(Stdin)),
        _ => None,
    }
}

/// Collapse `.` and `..` segments so paths like `/dev/../dev/null` still
/// match the special device table.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() && !absolute {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize("/dev/./null"), "/dev/null");
        assert_eq!(normalize("/dev/../dev/null"), "/dev/null");
        assert_eq!(normalize("/x/../dev/urandom"), "/dev/urandom");
        assert_eq!(normalize("dev/null"), "dev/null");
        assert_eq!(normalize("/dev//null"), "/dev/null");
    }

    #[test]
    fn normalize_keeps_leading_parent_refs_relative() {
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(normalize("/../x"), "/x");
    }
}
