//! Infrastructure layer: concrete implementations of application port traits.
//!
//! All I/O lives here: the credential file, the single-flight lock, HTTP,
//! process execution, SSH material and the settings file.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod credential_store;
pub mod fs;
pub mod lock;
pub mod ssh;
pub mod telemetry;
pub mod transport;
