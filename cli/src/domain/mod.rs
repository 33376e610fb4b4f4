//! Domain layer: pure types, wire conventions, codecs and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod machine;
pub mod queue;
pub mod ssh;
pub mod vault;

#[allow(unused_imports)]
pub use config::{RediaccConfig, validate_config_key, validate_config_value};
#[allow(unused_imports)]
pub use credential::{Credential, CredentialSource, Identity};
#[allow(unused_imports)]
pub use error::{ClientError, ConfigError, ErrorBody};
#[allow(unused_imports)]
pub use machine::{MachineConnectionInfo, UniversalUser};
#[allow(unused_imports)]
pub use queue::{CompletionResult, PollOptions, QueueVault, SubmitOptions, SubmitRequest};
