//! Gateway error types.
//!
//! `ValidationError` is raised before anything touches the system.
//! `ExecutionError` only exists once a primitive has been attempted.

use std::path::PathBuf;

use thiserror::Error;

/// A request the helper refuses to run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no operation given (expected one of: mount, umount, chmod)")]
    MissingOperation,

    #[error("unknown operation '{0}' (expected one of: mount, umount, chmod)")]
    UnknownOperation(String),

    #[error("{operation}: unrecognized flag '{flag}'")]
    UnknownFlag {
        operation: &'static str,
        flag: String,
    },

    #[error("{operation}: expected {expected} argument(s), got {got} (usage: {usage})")]
    WrongArity {
        operation: &'static str,
        usage: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{operation}: empty argument")]
    EmptyArgument { operation: &'static str },

    #[error("argument is not valid UTF-8: {0}")]
    NonUtf8Argument(String),

    #[error("chmod: mode '{0}' is not allowed (expected o+/o- followed by r, w and/or x)")]
    InvalidMode(String),

    #[error("mount: device '{0}' is not a loop device")]
    InvalidDevice(String),

    #[error("relative path '{0}' cannot be resolved without a working directory")]
    RelativePath(String),

    #[error("'{path}' resolves to '{}', which is outside '{prefix}'", resolved.display())]
    OutsidePrefix {
        path: String,
        resolved: PathBuf,
        prefix: String,
    },

    #[error("'{}' is a symlink escape: it really points to '{}', outside '{prefix}'", path.display(), real.display())]
    SymlinkEscape {
        path: PathBuf,
        real: PathBuf,
        prefix: String,
    },

    #[error("cannot resolve '{}': {reason}", path.display())]
    Unresolvable { path: PathBuf, reason: String },
}

/// A validated request whose primitive did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with status {code}")]
    Status { program: String, code: i32 },
}

impl ExecutionError {
    /// Exit code the helper reports for this failure.
    ///
    /// A primitive's own status passes through unchanged when it fits in a
    /// process exit code.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Spawn { .. } => 1,
            Self::Status { code, .. } => u8::try_from(*code)
                .ok()
                .filter(|code| *code != 0)
                .unwrap_or(1),
        }
    }
}
