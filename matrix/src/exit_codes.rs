//! Stable exit codes for matrix CLI commands.

/// Every scenario passed, or the command had nothing to run.
pub const OK: i32 = 0;
/// Invalid suite, config or arguments.
pub const INVALID: i32 = 1;
/// At least one scenario failed its declaration and none errored.
pub const FAILED: i32 = 2;
/// At least one scenario could not run because of its environment.
pub const ERRORED: i32 = 3;
