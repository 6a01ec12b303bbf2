//! Process exit codes, one per terminal outcome

use statewait::{FailureKind, WaiterPhase};

pub const SUCCESS: i32 = 0;
/// Bad flags, unreadable or invalid configuration
pub const USAGE: i32 = 1;
pub const TIMEOUT: i32 = 2;
pub const UNEXPECTED_STATE: i32 = 3;
pub const REFRESH_ERROR: i32 = 4;
pub const NOT_FOUND: i32 = 5;
/// Conventional 128 + SIGINT
pub const CANCELLED: i32 = 130;

/// Exit code for the phase a wait ended in.
pub fn for_phase(phase: WaiterPhase) -> i32 {
    match phase {
        WaiterPhase::Succeeded => SUCCESS,
        WaiterPhase::Failed(FailureKind::Timeout) => TIMEOUT,
        WaiterPhase::Failed(FailureKind::UnexpectedState) => UNEXPECTED_STATE,
        WaiterPhase::Failed(FailureKind::RefreshError) => REFRESH_ERROR,
        WaiterPhase::Failed(FailureKind::NotFound) => NOT_FOUND,
        WaiterPhase::Cancelled => CANCELLED,
        // A finished wait is never in a non-terminal phase
        WaiterPhase::Initial | WaiterPhase::Polling => USAGE,
    }
}
