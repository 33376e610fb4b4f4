//! Command implementations

pub mod config;
pub mod login;
pub mod logout;
pub mod queue;
pub mod ssh;
pub mod status;
pub mod tunnel;
