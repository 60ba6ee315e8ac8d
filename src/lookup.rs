//! Executable lookup along `PATH`.
//!
//! On Unix a candidate must be a regular file with an executable bit set.
//! On Windows candidates are matched by extension against `PATHEXT`.

use std::env;
use std::path::PathBuf;

#[cfg(unix)]
mod os {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    pub fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            vec![candidate]
        } else {
            vec![]
        }
    }

    pub fn is_executable(path: &Path) -> bool {
        fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
}

#[cfg(windows)]
mod os {
    use std::env;
    use std::path::{Path, PathBuf};

    const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

    fn pathext() -> Vec<String> {
        env::var("PATHEXT")
            .unwrap_or_else(|_| DEFAULT_PATHEXT.to_string())
            .split(';')
            .filter(|e| !e.is_empty())
            .map(|e| e.to_string())
            .collect()
    }

    pub fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let direct = dir.join(name);
        if direct.is_file()
            && Path::new(name)
                .extension()
                .is_some_and(|ext| pathext().iter().any(|e| e[1..].eq_ignore_ascii_case(
                    &ext.to_string_lossy(),
                )))
        {
            found.push(direct);
            return found;
        }
        for ext in pathext() {
            let candidate = dir.join(format!("{name}{ext}"));
            if candidate.is_file() {
                found.push(candidate);
                break;
            }
        }
        found
    }

    pub fn is_executable(path: &Path) -> bool {
        path.is_file()
    }
}

pub(crate) use os::is_executable;

/// All `PATH` matches for `name`, in `PATH` order.
pub fn search_path(name: &str) -> Vec<PathBuf> {
    let Some(path_var) = env::var_os("PATH") else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for dir in env::split_paths(&path_var) {
        found.extend(os::candidates(&dir, name));
    }
    found
}

/// The first `PATH` match for `name`, if any. Names containing a path
/// separator are not looked up; they resolve as filesystem paths instead.
pub fn resolve(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        return None;
    }
    search_path(name).into_iter().next()
}
