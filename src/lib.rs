//! image-factory library exports.
//!
//! Two halves live here:
//! - `gateway` - the privileged sudo helper core (validation and execution)
//! - `config` / `helper` - the unprivileged build side that feeds it
//!
//! Both binaries are thin wrappers over these modules so the tests can drive
//! them directly.

pub mod bytesize;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod helper;
pub mod logging;
pub mod process;
