//! The sanctioned prefix: the only place the helper may touch.
//!
//! The prefix is compiled in. Set `IMAGE_FACTORY_SANCTIONED_PREFIX` while
//! building to change it; there is no runtime knob.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::canonical::{canonicalize, is_canonical};

/// Prefix baked in at build time.
pub const BUILTIN_PREFIX: &str = match option_env!("IMAGE_FACTORY_SANCTIONED_PREFIX") {
    Some(prefix) => prefix,
    None => "/tmp/image-factory.",
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sanctioned prefix '{prefix}': {reason}")]
pub struct PrefixError {
    pub prefix: String,
    pub reason: &'static str,
}

/// Directory namespace under which every privileged operation must land.
///
/// Two shapes are accepted:
/// - `/some/dir/` (trailing slash): the directory and everything below it.
/// - `/some/dir/stem`: the prefix path itself, every `/some/dir/stem<suffix>`
///   and everything below them. This matches directories created by
///   `mkdtemp`-style helpers with `stem` as their prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanctionedPrefix {
    raw: String,
    parent: PathBuf,
    stem: Option<String>,
}

impl SanctionedPrefix {
    /// The prefix compiled into this binary.
    pub fn builtin() -> Result<Self, PrefixError> {
        Self::new(BUILTIN_PREFIX)
    }

    pub fn new(prefix: &str) -> Result<Self, PrefixError> {
        let fail = |reason| PrefixError {
            prefix: prefix.to_string(),
            reason,
        };

        let path = Path::new(prefix);
        if !path.is_absolute() {
            return Err(fail("must be an absolute path"));
        }

        if let Some(dir) = prefix.strip_suffix('/') {
            let dir = Path::new(dir);
            if !is_canonical(dir) {
                return Err(fail("must not contain '.', '..' or repeated separators"));
            }
            if dir == Path::new("") || dir == Path::new("/") {
                return Err(fail("refusing to sanction the whole filesystem"));
            }
            return Ok(Self {
                raw: prefix.to_string(),
                parent: dir.to_path_buf(),
                stem: None,
            });
        }

        if !is_canonical(path) {
            return Err(fail("must not contain '.', '..' or repeated separators"));
        }

        let stem = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| fail("must name a directory stem"))?;
        let parent = path.parent().ok_or_else(|| fail("must have a parent directory"))?;

        Ok(Self {
            raw: prefix.to_string(),
            parent: parent.to_path_buf(),
            stem: Some(stem.to_string()),
        })
    }

    /// Directory the build directories live in.
    pub fn parent(&self) -> &Path {
        &self.parent
    }

    /// Name stem of build directories, if this is a namespace prefix.
    pub fn stem(&self) -> Option<&str> {
        self.stem.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if `path` is the prefix itself or a descendant of it.
    ///
    /// `path` must already be canonical; raw input is normalized first so a
    /// caller that forgets cannot smuggle `..` through.
    pub fn contains(&self, path: &Path) -> bool {
        let path = canonicalize(path, Path::new("/"));
        let Ok(rest) = path.strip_prefix(&self.parent) else {
            return false;
        };

        match &self.stem {
            None => true,
            Some(stem) => match rest.components().next() {
                Some(Component::Normal(name)) => name
                    .to_str()
                    .map(|name| name.starts_with(stem.as_str()))
                    .unwrap_or(false),
                _ => false,
            },
        }
    }
}

impl fmt::Display for SanctionedPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
