use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Near-miss classification of a non-target trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LureType {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "none"))]
    None,
    /// Stimulus repeats the one N-1 positions back.
    #[cfg_attr(feature = "serde", serde(rename = "n-1"))]
    NMinus1,
    /// Stimulus repeats the one N+1 positions back.
    #[cfg_attr(feature = "serde", serde(rename = "n+1"))]
    NPlus1,
}

impl LureType {
    pub fn as_str(self) -> &'static str {
        match self {
            LureType::None => "none",
            LureType::NMinus1 => "n-1",
            LureType::NPlus1 => "n+1",
        }
    }

    pub fn is_lure(self) -> bool {
        self != LureType::None
    }

    /// How far back the reference stimulus sits for this lure at level `n_back`.
    ///
    /// `None` for non-lures and for n-1 at 1-back (which would point at the
    /// trial itself).
    pub fn reference_distance(self, n_back: usize) -> Option<usize> {
        match self {
            LureType::None => None,
            LureType::NMinus1 => (n_back >= 2).then(|| n_back - 1),
            LureType::NPlus1 => Some(n_back + 1),
        }
    }
}

impl fmt::Display for LureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(LureType::None),
            "n-1" => Ok(LureType::NMinus1),
            "n+1" => Ok(LureType::NPlus1),
            other => Err(format!("unknown lure type '{other}'")),
        }
    }
}

/// One planned trial.
///
/// Produced once per block and consumed read-only by the presentation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrialPlan {
    pub stimulus: char,
    pub is_target: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub lure_type: LureType,
    /// Remainder of the SOA after the stimulus. Constant within a session.
    pub iti_ms: u32,
}

/// Split a plan list into the parallel arrays the validator works on.
pub fn split_plans(plans: &[TrialPlan]) -> (Vec<char>, Vec<bool>, Vec<LureType>) {
    let mut stimuli = Vec::with_capacity(plans.len());
    let mut flags = Vec::with_capacity(plans.len());
    let mut lures = Vec::with_capacity(plans.len());
    for p in plans {
        stimuli.push(p.stimulus);
        flags.push(p.is_target);
        lures.push(p.lure_type);
    }
    (stimuli, flags, lures)
}
