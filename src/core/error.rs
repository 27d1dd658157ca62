use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which family of constraints a rejection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConstraintKind {
    /// Parallel arrays disagree in length.
    Structure,
    /// A declared target flag disagrees with the stimuli.
    TargetCorrectness,
    /// Target count outside the tolerance band.
    RateTolerance,
    /// A run of targets exceeds the cap.
    ConsecutiveTargets,
    /// A lure label disagrees with the stimuli.
    LureCorrectness,
    /// Not enough preceding trials for the requested N-back level.
    InsufficientHistory,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::TargetCorrectness => "target correctness",
            Self::RateTolerance => "rate tolerance",
            Self::ConsecutiveTargets => "consecutive-target cap",
            Self::LureCorrectness => "lure correctness",
            Self::InsufficientHistory => "insufficient history",
        }
    }
}

impl core::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum NbackError {
    /// Out-of-range or self-contradictory request; raised before any attempt.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("no valid sequence after {attempts} attempts ({kind}): {last_reason}")]
    ConstraintUnsatisfiable {
        attempts: u32,
        kind: ConstraintKind,
        last_reason: String,
    },

    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("sequence rejected ({kind}): {reason}")]
    SequenceRejected { kind: ConstraintKind, reason: String },

    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("unknown trigger name: {0}")]
    UnknownTrigger(String),
}

pub type Result<T> = core::result::Result<T, NbackError>;
