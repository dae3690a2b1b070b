//! Stable exit codes for pipeline CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, a duplicate run, or I/O errors.
pub const INVALID: i32 = 1;
/// `pipeline gate` found an incomplete or malformed phase hand-off.
pub const GATE_FAILED: i32 = 2;
