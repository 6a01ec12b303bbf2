//! statewait-cli - wait on a shell-probed resource
//!
//! Runs a probe command once per poll, reads the state label from its
//! stdout and blocks until that label reaches a target state. Useful for
//! scripts that provision infrastructure through asynchronous CLIs.

pub mod command;
pub mod config;
pub mod error;
pub mod exit;

pub use command::CommandProbe;
pub use config::{WaitConfig, WaitOverrides};
pub use error::ConfigError;
