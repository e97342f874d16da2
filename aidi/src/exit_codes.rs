//! Stable exit codes for `aidi` commands.

/// Command succeeded; for `run` and `validate` the data was judged VALID.
pub const OK: i32 = 0;
/// Command failed: bad config, decode exhaustion, failing program or other errors.
pub const ERROR: i32 = 1;
/// `aidi validate` judged the generated data INVALID.
pub const INVALID: i32 = 2;
/// `aidi run` hit the round limit or ended without a VALID verdict.
pub const NOT_CONVERGED: i32 = 3;
