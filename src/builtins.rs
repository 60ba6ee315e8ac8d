//! Built-in commands.
//!
//! Builtins run inside the interpreter process and are dispatched by
//! lowercase name from a fixed registry. Each receives the command node and
//! the active [`IoProvider`]. Diagnostics go to the command's stderr; the
//! returned error feeds conditional chaining.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::launch;
use crate::lookup;
use crate::provider::IoProvider;
use crate::stream::{self, OutStream, Writer};

/// A builtin implementation.
pub type BuiltinFn = fn(&Command, &Arc<IoProvider>) -> Result<()>;

/// The builtin registry, dispatched by lowercase executable name.
pub static BUILTINS: &[(&str, BuiltinFn)] = &[
    ("cd", cd),
    ("exit", exit),
    ("echo", echo),
    ("cat", cat),
    ("export", export),
    ("unset", unset),
    ("whoami", whoami),
    ("pwd", pwd),
    ("which", which),
    ("type", type_of),
    ("sudo", sudo),
    ("yes", yes),
    ("true", true_),
    ("false", false_),
    ("sleep", sleep),
];

/// Look up a builtin by name, case-insensitively.
pub fn find(name: &str) -> Option<BuiltinFn> {
    let lowered = name.to_ascii_lowercase();
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == lowered)
        .map(|(_, f)| *f)
}

fn say(w: &Writer, line: impl AsRef<str>) {
    let _ = w.write_all(line.as_ref().as_bytes());
    let _ = w.write_all(b"\n");
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    let var = "HOME";
    #[cfg(windows)]
    let var = "USERPROFILE";
    env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn cd(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    match cmd.arguments.len() {
        0 => {
            let home = home_dir()
                .ok_or_else(|| Error::execution("cd: failed to determine home directory"))?;
            env::set_current_dir(&home)
                .map_err(|e| Error::wrap(format!("cd: {}: {e}", home.display()), e.into()))
        }
        1 => {
            let arg = &cmd.arguments[0];
            let target = if arg == "~" || arg.starts_with("~/") {
                let home = home_dir()
                    .ok_or_else(|| Error::execution("cd: failed to determine home directory"))?;
                match arg.strip_prefix("~/") {
                    Some(rest) => home.join(rest),
                    None => home,
                }
            } else {
                PathBuf::from(arg)
            };
            env::set_current_dir(&target)
                .map_err(|e| Error::wrap(format!("cd: {arg}: {e}"), e.into()))
        }
        _ => {
            say(&cmd.stderr_handle(), "cd: too many arguments");
            Err(Error::execution("cd: too many arguments"))
        }
    }
}

fn exit(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    match cmd.arguments.len() {
        0 => process::exit(0),
        1 => match cmd.arguments[0].parse::<i32>() {
            Ok(code) => process::exit(code),
            Err(e) => {
                say(&cmd.stderr_handle(), format!("exit: {e}"));
                Err(Error::execution(format!(
                    "exit: failed to parse argument {:?} as an integer",
                    cmd.arguments[0]
                )))
            }
        },
        _ => {
            say(&cmd.stderr_handle(), "exit: too many arguments");
            Err(Error::execution("exit: too many arguments"))
        }
    }
}

fn echo(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    say(&cmd.stdout_handle(), cmd.arguments.join(" "));
    Ok(())
}

fn cat(cmd: &Command, iop: &Arc<IoProvider>) -> Result<()> {
    let stdout = cmd.stdout_handle();
    if cmd.arguments.is_empty() {
        let stdin = cmd.stdin_handle();
        stream::copy(&*stdin, &*stdout).map_err(|e| Error::wrap(format!("cat: {e}"), e.into()))?;
        return Ok(());
    }
    for path in &cmd.arguments {
        let reader = stream::open_reader(&iop.closer, path)
            .map_err(|e| Error::wrap(format!("cat: {path}: {e}"), e.into()))?;
        stream::copy(&*reader, &*stdout)
            .map_err(|e| Error::wrap(format!("cat: {path}: {e}"), e.into()))?;
    }
    Ok(())
}

fn export(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    if cmd.arguments.is_empty() {
        let stdout = cmd.stdout_handle();
        for (key, value) in env::vars() {
            say(&stdout, format!("declare -x {key}={value}"));
        }
        return Ok(());
    }
    for arg in &cmd.arguments {
        let pair = expand_env(arg);
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) => {
                // the environment is process-wide shared state
                unsafe { env::set_var(key, value) };
            }
            None => {
                if env::var_os(&pair).is_none() {
                    unsafe { env::set_var(&pair, "") };
                }
            }
        }
    }
    Ok(())
}

// Expand $NAME and ${NAME} references against the environment. Unset
// variables expand to the empty string.
fn expand_env(s: &str) -> String {
    fn is_name_byte(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                out.push_str(&env::var(&name).unwrap_or_default());
            }
            Some(&c0) if is_name_byte(c0) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_name_byte(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                out.push_str(&env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}

fn unset(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    for arg in &cmd.arguments {
        // the environment is process-wide shared state
        unsafe { env::remove_var(arg) };
    }
    Ok(())
}

#[cfg(unix)]
fn current_user() -> Option<String> {
    use std::ffi::CStr;

    unsafe {
        let uid = libc::getuid();
        let mut pwd: libc::passwd = std::mem::zeroed();
        let mut buf = [0 as libc::c_char; 4096];
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result);
        if rc == 0 && !result.is_null() {
            return Some(CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned());
        }
    }
    env::var("USER").ok()
}

#[cfg(windows)]
fn current_user() -> Option<String> {
    env::var("USERNAME").ok()
}

fn whoami(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    match current_user() {
        Some(name) => {
            say(&cmd.stdout_handle(), name);
            Ok(())
        }
        None => {
            say(&cmd.stderr_handle(), "whoami: failed to get current user");
            Err(Error::execution("whoami: failed to get current user"))
        }
    }
}

fn pwd(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    match env::current_dir() {
        Ok(dir) => {
            say(&cmd.stdout_handle(), dir.display().to_string());
            Ok(())
        }
        Err(e) => {
            say(&cmd.stderr_handle(), format!("pwd: {e}"));
            Err(Error::wrap(format!("pwd: {e}"), e.into()))
        }
    }
}

fn which(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    let mut all = false;
    let mut silent = false;
    let mut names = Vec::new();
    for arg in &cmd.arguments {
        match arg.as_str() {
            "-a" => all = true,
            "-s" => silent = true,
            _ => names.push(arg),
        }
    }

    let stdout = cmd.stdout_handle();
    let mut missing = None;
    for name in names {
        let found = lookup::search_path(name);
        if found.is_empty() {
            missing.get_or_insert(name.clone());
            continue;
        }
        if silent {
            continue;
        }
        if all {
            for path in &found {
                say(&stdout, path.display().to_string());
            }
        } else {
            say(&stdout, found[0].display().to_string());
        }
    }

    match missing {
        Some(name) => Err(Error::execution(format!("which: no {name} in PATH"))),
        None => Ok(()),
    }
}

fn type_of(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    let stdout = cmd.stdout_handle();
    let stderr = cmd.stderr_handle();
    for name in &cmd.arguments {
        if find(name).is_some() {
            say(&stdout, format!("{name} is a shell builtin"));
        } else if let Some(path) = lookup::search_path(name).into_iter().next() {
            say(&stdout, format!("{name} is {}", path.display()));
        } else {
            // reported, but does not fail the command
            say(&stderr, format!("type: {name}: not found"));
        }
    }
    Ok(())
}

fn sudo(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    let Some(path) = lookup::resolve("sudo") else {
        return Err(Error::execution("sudo: not found in PATH"));
    };
    let mut argv = Vec::with_capacity(cmd.arguments.len() + 1);
    argv.push("sudo".to_string());
    argv.extend(cmd.arguments.iter().cloned());
    let code = launch::launch(
        &path,
        &argv,
        cmd.stdin_handle(),
        cmd.stdout_handle(),
        cmd.stderr_handle(),
    )?;
    if code != 0 {
        return Err(Error::execution(format!(
            "sudo: command exited with status {code}"
        )));
    }
    Ok(())
}

fn yes(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    let line = if cmd.arguments.is_empty() {
        "y".to_string()
    } else {
        cmd.arguments.join(" ")
    };
    let stdout = cmd.stdout_handle();
    loop {
        stdout
            .write_all(format!("{line}\n").as_bytes())
            .map_err(|e| Error::wrap("yes", e.into()))?;
        thread::sleep(Duration::from_millis(200));
    }
}

fn true_(_cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    Ok(())
}

fn false_(_cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    Err(Error::execution("false"))
}

// Accepts duration strings with unit suffixes ("150ms", "2m30s") and bare
// numbers of seconds ("1", "0.5").
fn parse_sleep_duration(arg: &str) -> Option<Duration> {
    if let Ok(dur) = humantime::parse_duration(arg) {
        return Some(dur);
    }
    match arg.parse::<f64>() {
        Ok(secs) if secs >= 0.0 && secs.is_finite() => Some(Duration::from_secs_f64(secs)),
        _ => None,
    }
}

fn sleep(cmd: &Command, _iop: &Arc<IoProvider>) -> Result<()> {
    if cmd.arguments.len() != 1 {
        say(&cmd.stderr_handle(), "sleep: expected exactly one duration");
        return Err(Error::execution("sleep: expected exactly one duration"));
    }
    let arg = &cmd.arguments[0];
    match parse_sleep_duration(arg) {
        Some(dur) => {
            thread::sleep(dur);
            Ok(())
        }
        None => {
            say(
                &cmd.stderr_handle(),
                format!("sleep: invalid duration {arg:?}"),
            );
            Err(Error::execution(format!("sleep: invalid duration {arg:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_finds_builtins_case_insensitively() {
        assert!(find("echo").is_some());
        assert!(find("ECHO").is_some());
        assert!(find("Sleep").is_some());
        assert!(find("definitely-not-a-builtin").is_none());
    }

    #[test]
    fn expand_env_replaces_names_and_braces() {
        // unique name to avoid clashing with other tests
        unsafe { env::set_var("SEASHELL_EXPAND_TEST", "42") };
        assert_eq!(expand_env("x=$SEASHELL_EXPAND_TEST"), "x=42");
        assert_eq!(expand_env("x=${SEASHELL_EXPAND_TEST}y"), "x=42y");
        assert_eq!(expand_env("no refs"), "no refs");
        assert_eq!(expand_env("$"), "$");
        assert_eq!(expand_env("$SEASHELL_UNSET_VARIABLE_"), "");
        unsafe { env::remove_var("SEASHELL_EXPAND_TEST") };
    }

    #[test]
    fn sleep_durations() {
        assert_eq!(
            parse_sleep_duration("150ms"),
            Some(Duration::from_millis(150))
        );
        assert_eq!(parse_sleep_duration("2"), Some(Duration::from_secs(2)));
        assert_eq!(
            parse_sleep_duration("0.25"),
            Some(Duration::from_secs_f64(0.25))
        );
        assert_eq!(parse_sleep_duration("-1"), None);
        assert_eq!(parse_sleep_duration("bogus"), None);
    }
}
