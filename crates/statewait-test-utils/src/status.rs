//! Resource status labels used by scenario tests
//!
//! Mirrors the kind of status vocabulary asynchronous cloud APIs report,
//! plus a `NotFound` sentinel for waits where absence is the goal.

/// Status label for test resources
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Pending,
    Enabled,
    Disabled,
    DisableInProgress,
    Incomplete,
    Ready,
    Deleting,
    Failed,
    NotFound,
}
