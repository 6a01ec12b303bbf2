//! Shared test utilities for statewait
//!
//! This crate provides deterministic refresh adapters and label types that
//! integration tests across the workspace use to drive the waiter.
//!
//! ## Modules
//!
//! - [`script`]: scripted refresh sequences with call counting
//! - [`status`]: a `strum`-backed resource status label enum

pub mod script;
pub mod status;

// Re-export commonly used items
pub use script::{ScriptedRefresh, Step};
pub use status::ResourceStatus;
