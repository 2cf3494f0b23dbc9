//! The privileged operation gateway behind `image-factory-sudo-helper`.
//!
//! One invocation moves through these states and nothing survives it:
//!
//! ```text
//! Invocation ──parse──▶ ParsedRequest ──validate──▶ ValidatedRequest ──execute──▶ Executed
//!      │                      │
//!      └──────────────────────┴──────────────▶ Rejected (exit 1, nothing touched)
//! ```
//!
//! The executor only accepts a `ValidatedRequest`, and only the validator
//! can make one.

pub mod canonical;
pub mod error;
pub mod executor;
pub mod prefix;
pub mod request;
pub mod validator;

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::{error, info};

pub use canonical::canonicalize;
pub use error::{ExecutionError, ValidationError};
pub use executor::{
    dry_run_requested, Execution, Executor, PrimitiveRunner, SystemRunner, DRY_RUN_ENV,
};
pub use prefix::{PrefixError, SanctionedPrefix, BUILTIN_PREFIX};
pub use request::{Operation, OperationKind, ValidatedRequest, ALLOW_LIST};
pub use validator::Validator;

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The primitive ran and succeeded.
    Executed,
    /// Validation passed; dry-run skipped the primitive.
    Simulated,
    /// Validation failed. Nothing was run.
    Rejected(ValidationError),
    /// The primitive ran (or tried to) and failed.
    Failed(ExecutionError),
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Executed | Self::Simulated => 0,
            Self::Rejected(_) => 1,
            Self::Failed(err) => err.exit_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Validator and executor wired together for a single invocation.
#[derive(Debug, Clone)]
pub struct Gateway<R = SystemRunner> {
    validator: Validator,
    executor: Executor<R>,
}

impl Gateway<SystemRunner> {
    /// Gateway for the installed helper: built-in prefix, real primitives,
    /// dry-run taken from `DRYRUN`, relative paths against the current dir.
    pub fn from_env() -> Result<Self, PrefixError> {
        let mut validator = Validator::new(SanctionedPrefix::builtin()?);
        if let Ok(dir) = std::env::current_dir() {
            validator = validator.with_base_dir(dir);
        }

        let dry_run = dry_run_requested(std::env::var_os(DRY_RUN_ENV).as_deref());
        let executor = Executor::new(SystemRunner).dry_run(dry_run);

        Ok(Self::new(validator, executor))
    }
}

impl<R: PrimitiveRunner> Gateway<R> {
    pub fn new(validator: Validator, executor: Executor<R>) -> Self {
        Self {
            validator,
            executor,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn executor(&self) -> &Executor<R> {
        &self.executor
    }

    /// Run one invocation: `args` excludes the program name.
    pub fn invoke<I, S>(&self, args: I) -> Outcome
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args = match utf8_args(args) {
            Ok(args) => args,
            Err(err) => return self.reject(err),
        };

        let request = match self.validator.check(&args) {
            Ok(request) => request,
            Err(err) => return self.reject(err),
        };

        match self.executor.execute(&request) {
            Ok(Execution::Completed) => {
                info!(operation = %request.kind(), paths = ?request.paths(), "done");
                Outcome::Executed
            }
            Ok(Execution::Simulated) => Outcome::Simulated,
            Err(err) => {
                error!("{err}");
                Outcome::Failed(err)
            }
        }
    }

    fn reject(&self, err: ValidationError) -> Outcome {
        error!("rejected: {err}");
        Outcome::Rejected(err)
    }
}

fn utf8_args<I, S>(args: I) -> Result<Vec<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter()
        .map(|arg| {
            arg.into()
                .into_string()
                .map_err(|raw| ValidationError::NonUtf8Argument(PathBuf::from(raw).display().to_string()))
        })
        .collect()
}
