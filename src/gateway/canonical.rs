//! Lexical path normalization.
//!
//! Nothing here touches the filesystem. Mount targets usually do not exist
//! yet, so `..` is resolved against the preceding component of the string
//! rather than against whatever the kernel would find at that location.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Normalize `path` into an absolute path without `.` or `..` components.
///
/// Relative input is joined onto `base` first. A `..` at the root stays at
/// the root. Repeated separators and trailing slashes disappear.
///
/// The result says nothing about safety on its own: callers still have to
/// check containment on the returned path, never on the raw input.
pub fn canonicalize(path: &Path, base: &Path) -> PathBuf {
    let joined;
    let path = if path.is_absolute() {
        path
    } else {
        joined = base.join(path);
        &joined
    };

    let mut parts: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(name) => parts.push(name),
        }
    }

    let mut out = PathBuf::from("/");
    out.extend(parts);
    out
}

/// Returns true if `path` is already in canonical form.
pub fn is_canonical(path: &Path) -> bool {
    canonicalize(path, Path::new("/")).as_os_str() == path.as_os_str()
}
