//! image-factory-sudo-helper - the only program image-factory runs as root.
//!
//! Install it root-owned and allow it in sudoers by exact path, e.g.:
//!
//! ```text
//! builder ALL=(root) NOPASSWD: /usr/bin/image-factory-sudo-helper
//! ```
//!
//! Usage:
//!   image-factory-sudo-helper mount <device> <target>
//!   image-factory-sudo-helper umount <target>
//!   image-factory-sudo-helper chmod [-R] <mode> <target>
//!
//! Every path must resolve below the compiled-in sanctioned prefix.
//! `DRYRUN=1` validates without executing.

use std::process::ExitCode;

use image_factory::gateway::Gateway;
use image_factory::logging;
use tracing::error;

fn main() -> ExitCode {
    if let Err(err) = logging::init("warn") {
        eprintln!("image-factory-sudo-helper: {err:#}");
    }

    let gateway = match Gateway::from_env() {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(1);
        }
    };

    let outcome = gateway.invoke(std::env::args_os().skip(1));
    ExitCode::from(outcome.exit_code())
}
