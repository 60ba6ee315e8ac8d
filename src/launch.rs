//! Launching external executables.
//!
//! The child is spawned with all three standard streams piped, and pump
//! threads bridge them to the command's stream handles. After the child
//! exits, the output pumps are drained with a deadline so that a grandchild
//! holding the pipe open cannot stall the interpreter forever.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as OsCommand, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::lookup;
use crate::stream::{InStream, OutStream, Reader, Writer};

// Bound on waiting for output pumps after the child has exited.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

const PUMP_BUF: usize = 8192;

/// Resolve and run the external command described by `cmd`, wiring its
/// standard streams to the command's handles and waiting for completion.
/// A non-zero exit status is an error.
pub fn run(cmd: &Command) -> Result<()> {
    let (path, argv) = os::resolve_command(cmd)?;
    debug!("launching {} as {:?}", cmd.executable, path);

    let code = launch(
        &path,
        &argv,
        cmd.stdin_handle(),
        cmd.stdout_handle(),
        cmd.stderr_handle(),
    )
    .map_err(|err| {
        let stderr = cmd.stderr_handle();
        let _ = stderr.write_all(format!("failed to execute command: {cmd}\n{err}\n").as_bytes());
        err
    })?;

    if code != 0 {
        let message = format!("command exited with status {code}");
        let stderr = cmd.stderr_handle();
        let _ = stderr.write_all(format!("failed to execute command: {cmd}\n{message}\n").as_bytes());
        return Err(Error::execution(message));
    }
    Ok(())
}

/// Launch `path` with `argv`, consuming the given streams until the process
/// exits. Returns the exit code.
pub fn launch(
    path: &Path,
    argv: &[String],
    stdin: Reader,
    stdout: Writer,
    stderr: Writer,
) -> Result<i32> {
    let mut child = OsCommand::new(path)
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::wrap(format!("could not start {path:?}: {e}"), e.into()))?;

    let pumps = start_pumps(&mut child, stdin, stdout, stderr);

    let status = child
        .wait()
        .map_err(|e| Error::wrap(format!("could not wait for {path:?}: {e}"), e.into()))?;

    pumps.drain(DRAIN_DEADLINE);

    Ok(status.code().unwrap_or(-1))
}

struct Pumps {
    done: Vec<mpsc::Receiver<()>>,
}

impl Pumps {
    // Wait for the output pumps to finish, giving up once the deadline
    // passes. An abandoned pump keeps running detached and exits when the
    // stream it is stuck on finally closes.
    fn drain(self, deadline: Duration) {
        let until = Instant::now() + deadline;
        for rx in self.done {
            let remaining = until.saturating_duration_since(Instant::now());
            let _ = rx.recv_timeout(remaining);
        }
    }
}

fn start_pumps(child: &mut Child, stdin: Reader, stdout: Writer, stderr: Writer) -> Pumps {
    // Feeding the child's stdin is never joined: the source may be the
    // interpreter's own stdin, which can block past the child's lifetime.
    // The pump exits on source EOF or on the write failing after the child
    // is gone.
    if let Some(mut child_in) = child.stdin.take() {
        thread::spawn(move || {
            let mut buf = [0u8; PUMP_BUF];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if child_in.write_all(&buf[..n]).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    let mut done = Vec::new();
    if let Some(child_out) = child.stdout.take() {
        done.push(spawn_output_pump(child_out, stdout));
    }
    if let Some(child_err) = child.stderr.take() {
        done.push(spawn_output_pump(child_err, stderr));
    }
    Pumps { done }
}

fn spawn_output_pump(mut source: impl Read + Send + 'static, sink: Writer) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; PUMP_BUF];
        loop {
            match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if sink.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            }
        }
        let _ = tx.send(());
    });
    rx
}

#[cfg(unix)]
mod os {
    use super::*;

    // PATH first, then the name itself as an absolute or relative path.
    pub fn resolve_command(cmd: &Command) -> Result<(PathBuf, Vec<String>)> {
        let mut argv = Vec::with_capacity(cmd.arguments.len() + 1);
        argv.push(cmd.executable.clone());
        argv.extend(cmd.arguments.iter().cloned());

        if let Some(path) = lookup::resolve(&cmd.executable) {
            return Ok((path, argv));
        }
        let direct = PathBuf::from(&cmd.executable);
        if lookup::is_executable(&direct) {
            return Ok((direct, argv));
        }
        let absolute = std::path::absolute(&cmd.executable)
            .unwrap_or_else(|_| PathBuf::from(&cmd.executable));
        Ok((absolute, argv))
    }
}

#[cfg(windows)]
mod os {
    use super::*;

    // PATH first, then a literal path, then the host interpreters.
    pub fn resolve_command(cmd: &Command) -> Result<(PathBuf, Vec<String>)> {
        let mut argv = Vec::with_capacity(cmd.arguments.len() + 1);
        argv.push(cmd.executable.clone());
        argv.extend(cmd.arguments.iter().cloned());

        if let Some(path) = lookup::resolve(&cmd.executable) {
            return Ok((path, argv));
        }
        let direct = PathBuf::from(&cmd.executable);
        if lookup::is_executable(&direct) {
            return Ok((direct, argv));
        }

        for (interpreter, flag) in [("pwsh", "-Command"), ("powershell", "-Command"), ("cmd", "/C")]
        {
            if let Some(path) = lookup::resolve(interpreter) {
                let mut wrapped = Vec::with_capacity(cmd.arguments.len() + 3);
                wrapped.push(interpreter.to_string());
                wrapped.push(flag.to_string());
                wrapped.push(cmd.executable.clone());
                wrapped.extend(cmd.arguments.iter().cloned());
                return Ok((path, wrapped));
            }
        }
        Err(Error::execution(format!(
            "failed to execute command \"{cmd}\""
        )))
    }
}
