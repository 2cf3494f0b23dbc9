//! Request validation.
//!
//! Turns raw arguments into a `ValidatedRequest` or refuses. Nothing in this
//! module writes to the system; the only filesystem access is the read-only
//! `realpath` lookup used to catch symlinks that point out of the prefix.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use super::canonical::canonicalize;
use super::error::ValidationError;
use super::prefix::SanctionedPrefix;
use super::request::{
    ChmodMode, LoopDevice, Operation, OperationKind, ParsedRequest, ValidatedRequest,
};

/// Checks requests against the allow-list and the sanctioned prefix.
#[derive(Debug, Clone)]
pub struct Validator {
    prefix: SanctionedPrefix,
    /// Directory relative paths are resolved against.
    base_dir: Option<PathBuf>,
    /// Resolve existing paths through the filesystem as a second check.
    follow_symlinks: bool,
}

impl Validator {
    pub fn new(prefix: SanctionedPrefix) -> Self {
        Self {
            prefix,
            base_dir: None,
            follow_symlinks: true,
        }
    }

    /// Allow relative path arguments, resolved against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Skip the `realpath` check and rely on the lexical check alone.
    pub fn lexical_only(mut self) -> Self {
        self.follow_symlinks = false;
        self
    }

    pub fn prefix(&self) -> &SanctionedPrefix {
        &self.prefix
    }

    /// Parse and validate in one step.
    pub fn check(&self, args: &[String]) -> Result<ValidatedRequest, ValidationError> {
        let parsed = self.parse(args)?;
        self.validate(parsed)
    }

    /// Identify the operation. The remaining arguments are left unchecked.
    pub fn parse(&self, args: &[String]) -> Result<ParsedRequest, ValidationError> {
        let (token, rest) = args.split_first().ok_or(ValidationError::MissingOperation)?;
        let kind = OperationKind::from_token(token)
            .ok_or_else(|| ValidationError::UnknownOperation(token.clone()))?;

        Ok(ParsedRequest {
            kind,
            args: rest.to_vec(),
        })
    }

    /// Apply the operation's grammar and the containment rule.
    pub fn validate(&self, parsed: ParsedRequest) -> Result<ValidatedRequest, ValidationError> {
        let entry = parsed.kind.entry();

        let mut args = parsed.args.as_slice();
        let mut flags: Vec<&str> = Vec::new();
        while let Some((first, rest)) = args.split_first() {
            if !first.starts_with('-') {
                break;
            }
            if !entry.flags.contains(&first.as_str()) || flags.contains(&first.as_str()) {
                return Err(ValidationError::UnknownFlag {
                    operation: entry.name,
                    flag: first.clone(),
                });
            }
            flags.push(first);
            args = rest;
        }

        if args.len() != entry.arity {
            return Err(ValidationError::WrongArity {
                operation: entry.name,
                usage: entry.usage,
                expected: entry.arity,
                got: args.len(),
            });
        }
        if args.iter().any(|arg| arg.is_empty()) {
            return Err(ValidationError::EmptyArgument {
                operation: entry.name,
            });
        }
        // Flags only ever lead; a dash anywhere else is a smuggled option.
        if let Some(arg) = args.iter().find(|arg| arg.starts_with('-')) {
            return Err(ValidationError::UnknownFlag {
                operation: entry.name,
                flag: arg.clone(),
            });
        }

        // Containment is driven by the allow-list: only positions it marks
        // as paths can become a target.
        let mut paths: Vec<Option<PathBuf>> = vec![None; args.len()];
        for &position in entry.path_positions {
            paths[position] = Some(self.resolve(&args[position])?);
        }
        let mut target = |position: usize| {
            paths[position]
                .take()
                .ok_or_else(|| ValidationError::Unresolvable {
                    path: PathBuf::from(&args[position]),
                    reason: format!("argument {position} of {} is not a path", entry.name),
                })
        };

        let operation = match parsed.kind {
            OperationKind::Mount => Operation::Mount {
                device: LoopDevice::parse(&args[0])?,
                target: target(1)?,
            },
            OperationKind::Unmount => Operation::Unmount { target: target(0)? },
            OperationKind::Chmod => Operation::Chmod {
                recursive: flags.contains(&"-R"),
                mode: ChmodMode::parse(&args[0])?,
                target: target(1)?,
            },
        };

        Ok(ValidatedRequest::new(operation))
    }

    /// Canonicalize a path argument and require it inside the prefix.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ValidationError> {
        let path = Path::new(raw);
        let resolved = match (&self.base_dir, path.is_absolute()) {
            (_, true) => canonicalize(path, Path::new("/")),
            (Some(base), false) => canonicalize(path, base),
            (None, false) => return Err(ValidationError::RelativePath(raw.to_string())),
        };

        if !self.prefix.contains(&resolved) {
            return Err(ValidationError::OutsidePrefix {
                path: raw.to_string(),
                resolved,
                prefix: self.prefix.to_string(),
            });
        }

        if self.follow_symlinks {
            self.check_real_path(&resolved)?;
        }

        Ok(resolved)
    }

    fn check_real_path(&self, resolved: &Path) -> Result<(), ValidationError> {
        match real_path(resolved, 0) {
            Ok(real) if self.prefix.contains(&real) => Ok(()),
            Ok(real) => Err(ValidationError::SymlinkEscape {
                path: resolved.to_path_buf(),
                real,
                prefix: self.prefix.to_string(),
            }),
            Err(err) => Err(ValidationError::Unresolvable {
                path: resolved.to_path_buf(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Symlink hops followed through dangling links before giving up.
const MAX_LINK_HOPS: usize = 40;

/// Where `path` lands on the filesystem, even if it does not exist yet.
///
/// Existing paths go through `realpath`. A dangling symlink is followed to
/// its target. A missing path is the real path of its nearest existing
/// ancestor with the remaining components appended.
fn real_path(path: &Path, hops: usize) -> io::Result<PathBuf> {
    let err = match fs::canonicalize(path) {
        Ok(real) => return Ok(real),
        Err(err) if err.kind() == ErrorKind::NotFound => err,
        Err(err) => return Err(err),
    };

    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(err);
    };
    let parent = real_path(parent, hops)?;

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if hops >= MAX_LINK_HOPS {
                return Err(io::Error::other("too many levels of symbolic links"));
            }
            let target = fs::read_link(path)?;
            real_path(&canonicalize(&target, &parent), hops + 1)
        }
        Ok(_) => Err(err),
        Err(missing) if missing.kind() == ErrorKind::NotFound => Ok(parent.join(name)),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::request::ALLOW_LIST;

    fn validator() -> Validator {
        Validator::new(SanctionedPrefix::new("/tmp/image-factory.").unwrap())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn check(list: &[&str]) -> Result<ValidatedRequest, ValidationError> {
        validator().check(&args(list))
    }

    #[test]
    fn test_mount_accepted() {
        let req = check(&["mount", "/dev/loop0", "/tmp/image-factory._3gm0lem"]).unwrap();
        assert_eq!(
            req.operation(),
            &Operation::Mount {
                device: LoopDevice::parse("/dev/loop0").unwrap(),
                target: PathBuf::from("/tmp/image-factory._3gm0lem"),
            }
        );
    }

    #[test]
    fn test_umount_accepted() {
        let req = check(&["umount", "/tmp/image-factory._3gm0lem"]).unwrap();
        assert_eq!(req.kind(), OperationKind::Unmount);
    }

    #[test]
    fn test_chmod_variants_accepted() {
        let cases: [&[&str]; 5] = [
            &["chmod", "o+rwx", "/tmp/image-factory._3gm0lem/root"],
            &["chmod", "o+w", "/tmp/image-factory.8a9573rd/var/log"],
            &["chmod", "o+r", "/tmp/image-factory.umh1oz39/var/log/anaconda/dnf.librepo.log"],
            &["chmod", "o-rwx", "/tmp/image-factory._3gm0lem/root"],
            &["chmod", "-R", "o+rwx", "/tmp/image-factory._3gm0lem/var/log/anaconda"],
        ];
        for list in cases {
            assert!(check(list).is_ok(), "{list:?} should be accepted");
        }
    }

    #[test]
    fn test_recursive_flag_recorded() {
        let req = check(&["chmod", "-R", "o+rwx", "/tmp/image-factory._3gm0lem/var"]).unwrap();
        match req.operation() {
            Operation::Chmod { recursive, .. } => assert!(*recursive),
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn test_escape_rejected() {
        let err = check(&["chmod", "o+rwx", "/tmp/image-factory._3gm0lem/../../etc/shadow"]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutsidePrefix {
                path: "/tmp/image-factory._3gm0lem/../../etc/shadow".into(),
                resolved: PathBuf::from("/etc/shadow"),
                prefix: "/tmp/image-factory.".into(),
            }
        );
    }

    #[test]
    fn test_outside_targets_rejected_for_every_operation() {
        for target in ["/etc", "/", "/tmp", "/tmp/image-factory", "/tmp/image-factory.x/..", "/tmp/other"] {
            assert!(matches!(
                check(&["mount", "/dev/loop0", target]),
                Err(ValidationError::OutsidePrefix { .. })
            ));
            assert!(matches!(
                check(&["umount", target]),
                Err(ValidationError::OutsidePrefix { .. })
            ));
            assert!(matches!(
                check(&["chmod", "-R", "o+rwx", target]),
                Err(ValidationError::OutsidePrefix { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_operation() {
        assert_eq!(check(&[]), Err(ValidationError::MissingOperation));
        assert_eq!(
            check(&["rm", "-rf", "/"]),
            Err(ValidationError::UnknownOperation("rm".into()))
        );
    }

    #[test]
    fn test_arity_enforced() {
        assert!(matches!(
            check(&["mount", "/tmp/image-factory.x"]),
            Err(ValidationError::WrongArity { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            check(&["umount", "/tmp/image-factory.x", "/tmp/image-factory.y"]),
            Err(ValidationError::WrongArity { expected: 1, got: 2, .. })
        ));
        assert!(matches!(
            check(&["chmod", "-R", "/tmp/image-factory.x"]),
            Err(ValidationError::WrongArity { .. })
        ));
    }

    #[test]
    fn test_unknown_and_repeated_flags_rejected() {
        assert!(matches!(
            check(&["mount", "-o", "bind", "/etc", "/tmp/image-factory.x"]),
            Err(ValidationError::UnknownFlag { .. })
        ));
        assert!(matches!(
            check(&["umount", "-l", "/tmp/image-factory.x"]),
            Err(ValidationError::UnknownFlag { .. })
        ));
        assert!(matches!(
            check(&["chmod", "-R", "-R", "o+r", "/tmp/image-factory.x"]),
            Err(ValidationError::UnknownFlag { .. })
        ));
        assert!(matches!(
            check(&["chmod", "--reference=/etc/shadow", "/tmp/image-factory.x"]),
            Err(ValidationError::UnknownFlag { .. })
        ));
    }

    #[test]
    fn test_flag_after_positionals_rejected() {
        assert!(matches!(
            check(&["chmod", "o+r", "-R"]),
            Err(ValidationError::UnknownFlag { .. })
        ));
    }

    #[test]
    fn test_empty_argument_rejected() {
        assert!(matches!(
            check(&["umount", ""]),
            Err(ValidationError::EmptyArgument { .. })
        ));
    }

    #[test]
    fn test_bad_mode_and_device_rejected() {
        assert_eq!(
            check(&["chmod", "u+s", "/tmp/image-factory.x/bin/sh"]),
            Err(ValidationError::InvalidMode("u+s".into()))
        );
        assert_eq!(
            check(&["mount", "/dev/sda1", "/tmp/image-factory.x"]),
            Err(ValidationError::InvalidDevice("/dev/sda1".into()))
        );
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(
            check(&["umount", "image-factory.x"]),
            Err(ValidationError::RelativePath("image-factory.x".into()))
        );

        let validator = validator().with_base_dir("/tmp");
        let req = validator.check(&args(&["umount", "image-factory.x/./mnt"])).unwrap();
        assert_eq!(req.paths(), vec![Path::new("/tmp/image-factory.x/mnt")]);

        let err = validator.check(&args(&["umount", "../etc"])).unwrap_err();
        assert!(matches!(err, ValidationError::OutsidePrefix { .. }));
    }

    #[test]
    fn test_resolved_path_is_forwarded() {
        let req = check(&["chmod", "o+r", "/tmp/image-factory.x/var/./log//../log/messages"]).unwrap();
        assert_eq!(req.paths(), vec![Path::new("/tmp/image-factory.x/var/log/messages")]);
    }

    #[test]
    fn test_allow_list_path_positions_are_contained() {
        for entry in ALLOW_LIST {
            let opaque = match entry.kind {
                OperationKind::Mount => "/dev/loop0",
                OperationKind::Unmount => "unused",
                OperationKind::Chmod => "o+r",
            };
            for &position in entry.path_positions {
                let mut list = vec![entry.name];
                list.extend((0..entry.arity).map(|i| {
                    if i == position {
                        "/etc/shadow"
                    } else if entry.path_positions.contains(&i) {
                        "/tmp/image-factory.x"
                    } else {
                        opaque
                    }
                }));
                assert!(
                    matches!(check(&list), Err(ValidationError::OutsidePrefix { .. })),
                    "{list:?} not rejected"
                );
            }
        }
    }

    #[test]
    fn test_validation_is_repeatable() {
        let v = validator();
        let good = args(&["chmod", "-R", "o+rwx", "/tmp/image-factory._3gm0lem/var/log/anaconda"]);
        let bad = args(&["chmod", "o+rwx", "/tmp/image-factory._3gm0lem/../../etc/shadow"]);
        assert_eq!(v.check(&good), v.check(&good));
        assert_eq!(v.check(&bad), v.check(&bad));
        assert!(v.check(&good).is_ok());
        assert!(v.check(&bad).is_err());
    }

    #[test]
    fn test_symlink_out_of_prefix_rejected() {
        let build = tempfile::Builder::new()
            .prefix("image-factory.")
            .tempdir_in("/tmp")
            .unwrap();
        let link = build.path().join("root");
        std::os::unix::fs::symlink("/etc", &link).unwrap();

        let err = validator()
            .check(&args(&["chmod", "o+rwx", link.to_str().unwrap()]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::SymlinkEscape { .. }));

        // The lexical check alone cannot see the link.
        assert!(validator()
            .lexical_only()
            .check(&args(&["chmod", "o+rwx", link.to_str().unwrap()]))
            .is_ok());
    }

    #[test]
    fn test_dangling_symlink_out_of_prefix_rejected() {
        let build = tempfile::Builder::new()
            .prefix("image-factory.")
            .tempdir_in("/tmp")
            .unwrap();
        let link = build.path().join("dangling");
        std::os::unix::fs::symlink("/etc/image-factory-no-such-file", &link).unwrap();

        let err = validator()
            .check(&args(&["chmod", "o+rwx", link.to_str().unwrap()]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::SymlinkEscape { .. }));
    }

    #[test]
    fn test_missing_leaf_under_escaping_link_rejected() {
        let build = tempfile::Builder::new()
            .prefix("image-factory.")
            .tempdir_in("/tmp")
            .unwrap();
        std::os::unix::fs::symlink("/etc", build.path().join("link")).unwrap();

        let target = build.path().join("link/image-factory-new/file");
        let err = validator()
            .check(&args(&["chmod", "o+r", target.to_str().unwrap()]))
            .unwrap_err();
        match err {
            ValidationError::SymlinkEscape { real, .. } => {
                assert_eq!(real, Path::new("/etc/image-factory-new/file"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_path_inside_prefix_accepted() {
        let build = tempfile::Builder::new()
            .prefix("image-factory.")
            .tempdir_in("/tmp")
            .unwrap();
        let target = build.path().join("var/log/anaconda");
        assert!(validator()
            .check(&args(&["chmod", "-R", "o+rwx", target.to_str().unwrap()]))
            .is_ok());
    }

    #[test]
    fn test_dangling_symlink_inside_prefix_accepted() {
        let build = tempfile::Builder::new()
            .prefix("image-factory.")
            .tempdir_in("/tmp")
            .unwrap();
        let link = build.path().join("link");
        std::os::unix::fs::symlink(build.path().join("later"), &link).unwrap();

        assert!(validator()
            .check(&args(&["chmod", "o+r", link.to_str().unwrap()]))
            .is_ok());
    }

    #[test]
    fn test_symlink_inside_prefix_accepted() {
        let build = tempfile::Builder::new()
            .prefix("image-factory.")
            .tempdir_in("/tmp")
            .unwrap();
        std::fs::create_dir(build.path().join("real")).unwrap();
        std::os::unix::fs::symlink(build.path().join("real"), build.path().join("link")).unwrap();

        let target = build.path().join("link");
        assert!(validator()
            .check(&args(&["chmod", "o+r", target.to_str().unwrap()]))
            .is_ok());
    }
}
