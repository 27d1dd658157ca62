//! Default task parameters.
//!
//! Every tunable is passed explicitly to the generator; these are only the
//! values used when a caller does not override them.

// Sequence constraints
pub const TARGET_RATE: f64 = 0.30;
pub const LURE_N_MINUS_1_RATE: f64 = 0.05;
pub const LURE_N_PLUS_1_RATE: f64 = 0.05;
pub const MAX_IDENTICAL_RUN: usize = 2;
pub const MAX_ATTEMPTS: u32 = 300;
pub const MAX_CONSEC_TARGETS: usize = 1;
/// Allowed deviation (in trials) between realized and requested target count.
pub const TARGET_COUNT_TOLERANCE: usize = 1;
pub const FIXED_ITI_MS: u32 = 500;

// Task structure
pub const BLOCKS_PER_LOAD: usize = 3;
pub const TRIALS_PER_BLOCK: usize = 60;

// Practice
pub const PRACTICE_N_BACK: usize = 2;
pub const PRACTICE_TRIALS: usize = 30;
pub const PRACTICE_TARGET_RATE: f64 = 0.40;
pub const PRACTICE_HAS_LURES: bool = false;
pub const PRACTICE_PASS_ACC: f64 = 0.75;

// Timing (ms)
pub const FIXATION_DUR_MS: u32 = 500;
pub const STIM_DUR_MS: u32 = 500;
/// Constant stimulus onset asynchrony.
pub const SOA_MS: u32 = 2500;
