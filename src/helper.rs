//! Unprivileged side of the sudo helper.
//!
//! The build creates one `BuildDir` per image and asks the helper, through
//! sudo, to mount, open up and unmount things inside it. The helper checks
//! everything again on its side; nothing here is trusted by it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::debug;

use crate::gateway::{SanctionedPrefix, DRY_RUN_ENV};
use crate::process::Cmd;

/// Installed name of the helper binary.
pub const HELPER_NAME: &str = "image-factory-sudo-helper";

/// Stem used for build directories when the prefix is a plain subtree.
const SUBTREE_STEM: &str = "build.";

/// A fresh build directory inside the sanctioned prefix.
///
/// The name carries a random suffix so concurrent builds never share a
/// directory. It is removed on drop.
#[derive(Debug)]
pub struct BuildDir {
    dir: TempDir,
}

impl BuildDir {
    /// Create a build directory under the compiled-in prefix.
    pub fn create() -> Result<Self> {
        let prefix = SanctionedPrefix::builtin()?;
        Self::create_in(&prefix)
    }

    pub fn create_in(prefix: &SanctionedPrefix) -> Result<Self> {
        let stem = prefix.stem().unwrap_or(SUBTREE_STEM);
        let dir = tempfile::Builder::new()
            .prefix(stem)
            .tempdir_in(prefix.parent())
            .with_context(|| {
                format!("Failed to create build directory in {}", prefix.parent().display())
            })?;
        debug!("Created build directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `relative` inside the build directory.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }
}

/// Runs the helper, normally as `sudo -n image-factory-sudo-helper ...`.
#[derive(Debug, Clone)]
pub struct SudoHelper {
    escalation: Vec<OsString>,
    helper: PathBuf,
    dry_run: bool,
}

impl Default for SudoHelper {
    fn default() -> Self {
        Self::new(HELPER_NAME)
    }
}

impl SudoHelper {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            escalation: vec!["sudo".into(), "-n".into()],
            helper: helper.into(),
            dry_run: false,
        }
    }

    /// Run the helper directly, without sudo.
    pub fn without_escalation(mut self) -> Self {
        self.escalation.clear();
        self
    }

    /// Ask the helper to validate only.
    ///
    /// sudo drops `DRYRUN` unless sudoers keeps it, so this is mostly useful
    /// together with `without_escalation`.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn mount(&self, device: &str, target: &Path) -> Result<()> {
        self.run(["mount".into(), device.into(), target.into()])
    }

    pub fn umount(&self, target: &Path) -> Result<()> {
        self.run(["umount".into(), target.into()])
    }

    pub fn chmod(&self, mode: &str, target: &Path, recursive: bool) -> Result<()> {
        let mut args: Vec<OsString> = vec!["chmod".into()];
        if recursive {
            args.push("-R".into());
        }
        args.push(mode.into());
        args.push(target.into());
        self.run(args)
    }

    /// The command that would run for `args`.
    pub fn command<I>(&self, args: I) -> Cmd
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut argv = self.escalation.iter().cloned().chain(
            std::iter::once(self.helper.clone().into_os_string()).chain(args),
        );
        // The chain always yields at least the helper itself.
        let program = argv.next().unwrap_or_else(|| self.helper.clone().into_os_string());
        let mut cmd = Cmd::new(program).args(argv);
        if self.dry_run {
            cmd = cmd.env(DRY_RUN_ENV, "1");
        }
        cmd
    }

    fn run<I>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = OsString>,
    {
        let cmd = self.command(args);
        let argv = cmd.argv();
        debug!("Running {:?}", argv);
        cmd.error_msg(format!("{HELPER_NAME} refused or failed: {argv:?}"))
            .run()?;
        Ok(())
    }
}
