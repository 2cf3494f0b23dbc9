//! Typed operation requests and the allow-list they are checked against.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::ValidationError;

/// Closed set of operations the helper will ever run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Mount,
    Unmount,
    Chmod,
}

/// Shape of one allowed operation.
#[derive(Debug, Clone, Copy)]
pub struct AllowListEntry {
    pub kind: OperationKind,
    /// Token on the command line, which is also the primitive's program name.
    pub name: &'static str,
    /// Number of positional arguments after flags.
    pub arity: usize,
    /// Flags that may precede the positional arguments.
    pub flags: &'static [&'static str],
    /// Positions (among the positional arguments) that hold paths.
    pub path_positions: &'static [usize],
    pub usage: &'static str,
}

pub const ALLOW_LIST: &[AllowListEntry] = &[
    AllowListEntry {
        kind: OperationKind::Mount,
        name: "mount",
        arity: 2,
        flags: &[],
        path_positions: &[1],
        usage: "mount <device> <target>",
    },
    AllowListEntry {
        kind: OperationKind::Unmount,
        name: "umount",
        arity: 1,
        flags: &[],
        path_positions: &[0],
        usage: "umount <target>",
    },
    AllowListEntry {
        kind: OperationKind::Chmod,
        name: "chmod",
        arity: 2,
        flags: &["-R"],
        path_positions: &[1],
        usage: "chmod [-R] <mode> <target>",
    },
];

impl OperationKind {
    pub fn from_token(token: &str) -> Option<Self> {
        ALLOW_LIST
            .iter()
            .find(|entry| entry.name == token)
            .map(|entry| entry.kind)
    }

    pub fn entry(self) -> &'static AllowListEntry {
        match self {
            Self::Mount => &ALLOW_LIST[0],
            Self::Unmount => &ALLOW_LIST[1],
            Self::Chmod => &ALLOW_LIST[2],
        }
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Symbolic permission change on the "other" class, e.g. `o+rwx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChmodMode(String);

impl ChmodMode {
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidMode(token.to_string());

        let rest = token.strip_prefix('o').ok_or_else(invalid)?;
        let perms = rest
            .strip_prefix('+')
            .or_else(|| rest.strip_prefix('-'))
            .ok_or_else(invalid)?;

        if perms.is_empty() {
            return Err(invalid());
        }

        let mut seen = [false; 3];
        for c in perms.chars() {
            let slot = match c {
                'r' => 0,
                'w' => 1,
                'x' => 2,
                _ => return Err(invalid()),
            };
            if seen[slot] {
                return Err(invalid());
            }
            seen[slot] = true;
        }

        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Loop device node: `/dev/loopN` or a partition `/dev/loopNpM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopDevice(String);

impl LoopDevice {
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDevice(token.to_string());

        let rest = token.strip_prefix("/dev/loop").ok_or_else(invalid)?;
        let (number, partition) = match rest.split_once('p') {
            Some((number, partition)) => (number, Some(partition)),
            None => (rest, None),
        };

        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(number) || !partition.map_or(true, digits) {
            return Err(invalid());
        }

        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Arguments after the operation token has been recognized.
///
/// Nothing about the arguments has been checked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub kind: OperationKind,
    pub args: Vec<String>,
}

/// A fully checked operation. Path arguments hold their resolved form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Mount { device: LoopDevice, target: PathBuf },
    Unmount { target: PathBuf },
    Chmod {
        recursive: bool,
        mode: ChmodMode,
        target: PathBuf,
    },
}

/// Proof that a request passed validation.
///
/// Only the validator can build one, and the executor accepts nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    operation: Operation,
}

impl ValidatedRequest {
    pub(super) fn new(operation: Operation) -> Self {
        Self { operation }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn kind(&self) -> OperationKind {
        match self.operation {
            Operation::Mount { .. } => OperationKind::Mount,
            Operation::Unmount { .. } => OperationKind::Unmount,
            Operation::Chmod { .. } => OperationKind::Chmod,
        }
    }

    /// Program name of the primitive.
    pub fn program(&self) -> &'static str {
        self.kind().name()
    }

    /// Arguments handed to the primitive, in order.
    pub fn argv(&self) -> Vec<OsString> {
        match &self.operation {
            Operation::Mount { device, target } => {
                vec![device.as_str().into(), target.as_os_str().to_owned()]
            }
            Operation::Unmount { target } => vec![target.as_os_str().to_owned()],
            Operation::Chmod {
                recursive,
                mode,
                target,
            } => {
                let mut argv: Vec<OsString> = Vec::with_capacity(3);
                if *recursive {
                    argv.push("-R".into());
                }
                argv.push(mode.as_str().into());
                argv.push(target.as_os_str().to_owned());
                argv
            }
        }
    }

    /// Every path argument, for logging and auditing.
    pub fn paths(&self) -> Vec<&Path> {
        match &self.operation {
            Operation::Mount { target, .. }
            | Operation::Unmount { target }
            | Operation::Chmod { target, .. } => vec![target.as_path()],
        }
    }
}
