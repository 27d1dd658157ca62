//! # nback
//!
//! Stimulus sequences for the N-back working-memory task.
//!
//! The crate builds per-block trial plans that honour a target rate, lure
//! rates, a cap on consecutive targets and (best-effort) a cap on identical
//! stimulus runs, and it exposes the validator used to accept them so that
//! logged sessions can be re-checked later.
//!
//! ## Quick Start
//!
//! ```
//! use nback::prelude::*;
//!
//! let opts = SequenceOptions::default().with_target_rate(0.30);
//! let mut rng = Prng::new(1234);
//! let plans = generate_sequence(2, 20, &opts, &mut rng).unwrap();
//!
//! let (stimuli, flags, lures) = split_plans(&plans);
//! let verdict = validate_sequence(&stimuli, &flags, &lures, 2, 0.30, 1, 1);
//! assert!(verdict.accepted());
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support (unseeded `Prng::from_time`)
//! - `serde` (default): Serialization of plans and options
//! - `parallel`: Generate batches of blocks on the rayon thread pool
//!
//! ## Modules
//!
//! - [`sequence`]: Constrained generator
//! - [`validate`]: Acceptance checks and audit helpers
//! - [`prng`]: Deterministic random source
//! - [`alphabet`]: Stimulus alphabets
//! - [`params`]: Default task parameters

#[path = "core/alphabet.rs"]
pub mod alphabet;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/params.rs"]
pub mod params;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/sequence.rs"]
pub mod sequence;

#[path = "core/trial.rs"]
pub mod trial;

#[path = "core/validate.rs"]
pub mod validate;

/// Prelude module for convenient imports.
///
/// ```
/// use nback::prelude::*;
/// ```
pub mod prelude {
    pub use crate::alphabet::Alphabet;
    pub use crate::error::{ConstraintKind, NbackError};
    pub use crate::prng::{Prng, RandomSource};
    pub use crate::sequence::{
        generate_blocks, generate_sequence, summarize, BlockRequest, SequenceGenerator,
        SequenceOptions, SequenceSummary,
    };
    pub use crate::trial::{split_plans, LureType, TrialPlan};
    pub use crate::validate::{
        audit_sequence, check_lures, identical_runs_within, validate_sequence, Rejection, Verdict,
    };
}
