//! Running validated requests.

use std::ffi::{OsStr, OsString};

use tracing::{debug, info};

use super::error::ExecutionError;
use super::request::ValidatedRequest;
use crate::process::{exit_code, Cmd};

/// Only place primitives are looked up. The caller's `PATH` is ignored.
pub const SYSTEM_SEARCH_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";

/// Environment variable that turns execution into a no-op.
pub const DRY_RUN_ENV: &str = "DRYRUN";

/// Returns true if a `DRYRUN` value asks for dry-run mode.
pub fn dry_run_requested(value: Option<&OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty() && v != "0")
}

/// Something that can run an OS primitive and report its exit code.
pub trait PrimitiveRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<i32, ExecutionError>;
}

/// Runs primitives for real, from the fixed system search path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl PrimitiveRunner for SystemRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<i32, ExecutionError> {
        let spawn_error = |message: String| ExecutionError::Spawn {
            program: program.to_string(),
            message,
        };

        let path = which::which_in(program, Some(SYSTEM_SEARCH_PATH), "/")
            .map_err(|err| spawn_error(err.to_string()))?;

        let status = Cmd::new(&path)
            .args(args)
            .env_clear()
            .env("PATH", SYSTEM_SEARCH_PATH)
            .allow_fail()
            .run_interactive()
            .map_err(|err| spawn_error(format!("{err:#}")))?;

        Ok(exit_code(status))
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The primitive ran and exited 0.
    Completed,
    /// Dry-run: the primitive was skipped.
    Simulated,
}

/// Hands validated requests to a runner.
#[derive(Debug, Clone)]
pub struct Executor<R = SystemRunner> {
    runner: R,
    dry_run: bool,
}

impl<R: PrimitiveRunner> Executor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run the request's primitive with exactly its validated arguments.
    pub fn execute(&self, request: &ValidatedRequest) -> Result<Execution, ExecutionError> {
        let program = request.program();
        let argv = request.argv();

        if self.dry_run {
            info!(program, args = ?argv, "dry-run, not executing");
            return Ok(Execution::Simulated);
        }

        debug!(program, args = ?argv, "executing");
        match self.runner.run(program, &argv)? {
            0 => Ok(Execution::Completed),
            code => Err(ExecutionError::Status {
                program: program.to_string(),
                code,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::prefix::SanctionedPrefix;
    use crate::gateway::validator::Validator;
    use std::cell::RefCell;

    /// Records calls and answers with a fixed exit code.
    struct Recorder {
        code: i32,
        calls: RefCell<Vec<(String, Vec<OsString>)>>,
    }

    impl Recorder {
        fn new(code: i32) -> Self {
            Self {
                code,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PrimitiveRunner for Recorder {
        fn run(&self, program: &str, args: &[OsString]) -> Result<i32, ExecutionError> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            Ok(self.code)
        }
    }

    fn request(args: &[&str]) -> ValidatedRequest {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Validator::new(SanctionedPrefix::new("/tmp/image-factory.").unwrap())
            .check(&args)
            .unwrap()
    }

    #[test]
    fn test_forwards_exact_arguments() {
        let executor = Executor::new(Recorder::new(0));
        let req = request(&["chmod", "-R", "o+rwx", "/tmp/image-factory._3gm0lem/var/log/anaconda"]);

        assert_eq!(executor.execute(&req), Ok(Execution::Completed));

        let calls = executor.runner().calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "chmod");
        assert_eq!(
            calls[0].1,
            vec![
                OsString::from("-R"),
                OsString::from("o+rwx"),
                OsString::from("/tmp/image-factory._3gm0lem/var/log/anaconda"),
            ]
        );
    }

    #[test]
    fn test_nonzero_status_propagated() {
        let executor = Executor::new(Recorder::new(32));
        let req = request(&["mount", "/dev/loop0", "/tmp/image-factory._3gm0lem"]);

        let err = executor.execute(&req).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Status {
                program: "mount".into(),
                code: 32
            }
        );
        assert_eq!(err.exit_code(), 32);
    }

    #[test]
    fn test_dry_run_skips_runner() {
        let executor = Executor::new(Recorder::new(1)).dry_run(true);
        let req = request(&["umount", "/tmp/image-factory._3gm0lem"]);

        assert_eq!(executor.execute(&req), Ok(Execution::Simulated));
        assert!(executor.runner().calls.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_values() {
        assert!(dry_run_requested(Some(OsStr::new("1"))));
        assert!(dry_run_requested(Some(OsStr::new("yes"))));
        assert!(!dry_run_requested(Some(OsStr::new("0"))));
        assert!(!dry_run_requested(Some(OsStr::new(""))));
        assert!(!dry_run_requested(None));
    }

    #[test]
    fn test_missing_primitive_is_spawn_error() {
        let err = SystemRunner
            .run("image-factory-no-such-primitive", &[])
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
