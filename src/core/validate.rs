//! Sequence validation.
//!
//! Pure functions over parallel arrays (stimuli, target flags, lure labels).
//! The generator uses them as its acceptance oracle, and audit tooling can
//! call them on any persisted trial log.
//!
//! Two tiers:
//! - hard checks ([`validate_sequence`], [`check_lures`]) decide acceptance;
//! - the identical-run heuristic ([`identical_runs_within`]) is informative
//!   only and never rejects a sequence.

use core::fmt;

use crate::error::{ConstraintKind, NbackError, Result};
use crate::trial::LureType;

/// Why a sequence was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    LengthMismatch {
        stimuli: usize,
        flags: usize,
        lures: usize,
    },
    TargetMismatch {
        index: usize,
        declared: bool,
    },
    TargetCount {
        observed: usize,
        expected: usize,
        tolerance: usize,
    },
    ConsecutiveTargets {
        start: usize,
        len: usize,
        max: usize,
    },
    LureOnTarget {
        index: usize,
    },
    LureTooEarly {
        index: usize,
        lure: LureType,
    },
    LureMismatch {
        index: usize,
        lure: LureType,
    },
    LureMatchesTarget {
        index: usize,
        lure: LureType,
    },
}

impl Rejection {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Rejection::LengthMismatch { .. } => ConstraintKind::Structure,
            Rejection::TargetMismatch { .. } => ConstraintKind::TargetCorrectness,
            Rejection::TargetCount { .. } => ConstraintKind::RateTolerance,
            Rejection::ConsecutiveTargets { .. } => ConstraintKind::ConsecutiveTargets,
            Rejection::LureOnTarget { .. }
            | Rejection::LureMismatch { .. }
            | Rejection::LureMatchesTarget { .. } => ConstraintKind::LureCorrectness,
            Rejection::LureTooEarly { .. } => ConstraintKind::InsufficientHistory,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::LengthMismatch {
                stimuli,
                flags,
                lures,
            } => write!(
                f,
                "length mismatch: {stimuli} stimuli, {flags} target flags, {lures} lure types"
            ),
            Rejection::TargetMismatch { index, declared } => {
                if *declared {
                    write!(f, "target mismatch at index {index}: flagged as target but stimulus does not match N-back")
                } else {
                    write!(f, "target mismatch at index {index}: stimulus matches N-back but not flagged as target")
                }
            }
            Rejection::TargetCount {
                observed,
                expected,
                tolerance,
            } => write!(
                f,
                "target count {observed} outside ±{tolerance} around {expected}"
            ),
            Rejection::ConsecutiveTargets { start, len, max } => write!(
                f,
                "{len} consecutive targets starting at index {start} (max {max})"
            ),
            Rejection::LureOnTarget { index } => {
                write!(f, "lure at index {index} is also flagged as target")
            }
            Rejection::LureTooEarly { index, lure } => {
                write!(f, "{lure} lure at index {index} has no reference trial")
            }
            Rejection::LureMismatch { index, lure } => write!(
                f,
                "{lure} lure at index {index} does not repeat its reference stimulus"
            ),
            Rejection::LureMatchesTarget { index, lure } => write!(
                f,
                "{lure} lure at index {index} also matches the N-back stimulus"
            ),
        }
    }
}

/// Outcome of a validation pass: accepted, or the first rejection found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    rejection: Option<Rejection>,
}

impl Verdict {
    pub fn accept() -> Self {
        Self { rejection: None }
    }

    pub fn reject(rejection: Rejection) -> Self {
        Self {
            rejection: Some(rejection),
        }
    }

    pub fn accepted(&self) -> bool {
        self.rejection.is_none()
    }

    /// Human-readable reason; empty on acceptance.
    pub fn reason(&self) -> String {
        self.rejection
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default()
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }

    pub fn into_result(self) -> Result<()> {
        match self.rejection {
            None => Ok(()),
            Some(r @ Rejection::LengthMismatch { .. }) => {
                Err(NbackError::StructuralMismatch(r.to_string()))
            }
            Some(r) => Err(NbackError::SequenceRejected {
                kind: r.kind(),
                reason: r.to_string(),
            }),
        }
    }
}

impl From<core::result::Result<(), Rejection>> for Verdict {
    fn from(r: core::result::Result<(), Rejection>) -> Self {
        match r {
            Ok(()) => Verdict::accept(),
            Err(rej) => Verdict::reject(rej),
        }
    }
}

/// Requested number of targets for a sequence of `len` trials.
///
/// Halves round to even, matching the trial logs this count is audited against.
pub fn expected_target_count(target_rate: f64, len: usize) -> usize {
    let v = (target_rate * len as f64).round_ties_even();
    if v <= 0.0 {
        0
    } else {
        v as usize
    }
}

/// Global acceptance check.
///
/// Runs, in order and stopping at the first failure: length consistency,
/// target correctness, target-rate tolerance, consecutive-target cap.
pub fn validate_sequence<S: PartialEq>(
    stimuli: &[S],
    is_target: &[bool],
    lure_types: &[LureType],
    n_back: usize,
    target_rate: f64,
    tolerance: usize,
    max_consec_targets: usize,
) -> Verdict {
    check_global(
        stimuli,
        is_target,
        lure_types,
        n_back,
        target_rate,
        tolerance,
        max_consec_targets,
    )
    .into()
}

fn check_global<S: PartialEq>(
    stimuli: &[S],
    is_target: &[bool],
    lure_types: &[LureType],
    n_back: usize,
    target_rate: f64,
    tolerance: usize,
    max_consec_targets: usize,
) -> core::result::Result<(), Rejection> {
    check_lengths(stimuli, is_target, lure_types)?;

    for (i, &declared) in is_target.iter().enumerate() {
        let expected = i >= n_back && stimuli[i] == stimuli[i - n_back];
        if declared != expected {
            return Err(Rejection::TargetMismatch { index: i, declared });
        }
    }

    let expected = expected_target_count(target_rate, stimuli.len());
    let observed = is_target.iter().filter(|&&t| t).count();
    if observed.abs_diff(expected) > tolerance {
        return Err(Rejection::TargetCount {
            observed,
            expected,
            tolerance,
        });
    }

    if let Some((start, len)) = first_run_over(is_target, max_consec_targets) {
        return Err(Rejection::ConsecutiveTargets {
            start,
            len,
            max: max_consec_targets,
        });
    }

    Ok(())
}

fn check_lengths<S>(
    stimuli: &[S],
    is_target: &[bool],
    lure_types: &[LureType],
) -> core::result::Result<(), Rejection> {
    if stimuli.len() != is_target.len() || stimuli.len() != lure_types.len() {
        return Err(Rejection::LengthMismatch {
            stimuli: stimuli.len(),
            flags: is_target.len(),
            lures: lure_types.len(),
        });
    }
    Ok(())
}

/// First run of `true` longer than `max`, as (start, full length).
fn first_run_over(flags: &[bool], max: usize) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < flags.len() {
        if !flags[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < flags.len() && flags[i] {
            i += 1;
        }
        let len = i - start;
        if len > max {
            return Some((start, len));
        }
    }
    None
}

/// Lure labels must agree with the stimuli they annotate.
///
/// A lure may not sit on a target, needs its reference trial to exist,
/// must repeat that reference, and must not also repeat the N-back stimulus.
pub fn check_lures<S: PartialEq>(
    stimuli: &[S],
    is_target: &[bool],
    lure_types: &[LureType],
    n_back: usize,
) -> Verdict {
    check_lure_labels(stimuli, is_target, lure_types, n_back).into()
}

fn check_lure_labels<S: PartialEq>(
    stimuli: &[S],
    is_target: &[bool],
    lure_types: &[LureType],
    n_back: usize,
) -> core::result::Result<(), Rejection> {
    check_lengths(stimuli, is_target, lure_types)?;

    for (i, &lure) in lure_types.iter().enumerate() {
        if !lure.is_lure() {
            continue;
        }
        if is_target[i] {
            return Err(Rejection::LureOnTarget { index: i });
        }
        let dist = match lure.reference_distance(n_back) {
            Some(d) if i >= d => d,
            _ => return Err(Rejection::LureTooEarly { index: i, lure }),
        };
        if stimuli[i] != stimuli[i - dist] {
            return Err(Rejection::LureMismatch { index: i, lure });
        }
        if i >= n_back && stimuli[i] == stimuli[i - n_back] {
            return Err(Rejection::LureMatchesTarget { index: i, lure });
        }
    }
    Ok(())
}

/// Both hard tiers: [`validate_sequence`] then [`check_lures`].
pub fn audit_sequence<S: PartialEq>(
    stimuli: &[S],
    is_target: &[bool],
    lure_types: &[LureType],
    n_back: usize,
    target_rate: f64,
    tolerance: usize,
    max_consec_targets: usize,
) -> Verdict {
    let verdict = validate_sequence(
        stimuli,
        is_target,
        lure_types,
        n_back,
        target_rate,
        tolerance,
        max_consec_targets,
    );
    if !verdict.accepted() {
        return verdict;
    }
    check_lures(stimuli, is_target, lure_types, n_back)
}

/// Longest run of identical consecutive stimuli, as (start, length).
pub fn longest_identical_run<S: PartialEq>(stimuli: &[S]) -> (usize, usize) {
    let mut best = (0, usize::from(!stimuli.is_empty()));
    let mut start = 0;
    for i in 1..stimuli.len() {
        if stimuli[i] != stimuli[i - 1] {
            start = i;
        }
        let len = i - start + 1;
        if len > best.1 {
            best = (start, len);
        }
    }
    best
}

/// Soft-tier check: no identical-stimulus run longer than `max_run`.
pub fn identical_runs_within<S: PartialEq>(stimuli: &[S], max_run: usize) -> bool {
    longest_identical_run(stimuli).1 <= max_run
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE3: [LureType; 3] = [LureType::None; 3];

    #[test]
    fn accepts_correctly_flagged_target() {
        let v = validate_sequence(&['A', 'B', 'A'], &[false, false, true], &NONE3, 2, 0.33, 1, 1);
        assert!(v.accepted(), "{}", v.reason());
        assert!(v.reason().is_empty());
    }

    #[test]
    fn rejects_false_target_and_names_index() {
        let v = validate_sequence(&['A', 'B', 'C'], &[false, false, true], &NONE3, 2, 0.33, 1, 1);
        assert!(!v.accepted());
        assert_eq!(
            v.rejection(),
            Some(&Rejection::TargetMismatch {
                index: 2,
                declared: true
            })
        );
        assert!(v.reason().contains("index 2"));
    }

    #[test]
    fn rejects_missed_target() {
        let v = validate_sequence(&['A', 'B', 'A'], &[false, false, false], &NONE3, 2, 0.0, 1, 1);
        assert_eq!(
            v.rejection(),
            Some(&Rejection::TargetMismatch {
                index: 2,
                declared: false
            })
        );
    }

    #[test]
    fn target_in_first_n_trials_is_a_mismatch() {
        let v = validate_sequence(&['A', 'A', 'B'], &[true, false, false], &NONE3, 2, 0.33, 1, 1);
        assert_eq!(v.rejection().map(|r| r.kind()), Some(ConstraintKind::TargetCorrectness));
    }

    #[test]
    fn length_mismatch_comes_first_and_maps_to_structural_error() {
        let v = validate_sequence(&['A', 'B'], &[false, false, true], &NONE3, 2, 0.3, 1, 1);
        assert_eq!(
            v.rejection(),
            Some(&Rejection::LengthMismatch {
                stimuli: 2,
                flags: 3,
                lures: 3
            })
        );
        assert!(matches!(
            v.into_result(),
            Err(NbackError::StructuralMismatch(_))
        ));
    }

    #[test]
    fn rate_tolerance_reports_observed_and_expected() {
        // 10 trials, 1-back, no targets at all, but 50% requested.
        let stimuli: Vec<char> = "ABCDEFGHJK".chars().collect();
        let v = validate_sequence(&stimuli, &[false; 10], &[LureType::None; 10], 1, 0.5, 1, 1);
        assert_eq!(
            v.rejection(),
            Some(&Rejection::TargetCount {
                observed: 0,
                expected: 5,
                tolerance: 1
            })
        );
        assert!(matches!(
            v.into_result(),
            Err(NbackError::SequenceRejected {
                kind: ConstraintKind::RateTolerance,
                ..
            })
        ));
    }

    #[test]
    fn consecutive_cap_reports_full_run() {
        // 1-back: AAAB -> targets at 1 and 2.
        let v = validate_sequence(
            &['A', 'A', 'A', 'B'],
            &[false, true, true, false],
            &[LureType::None; 4],
            1,
            0.5,
            1,
            1,
        );
        assert_eq!(
            v.rejection(),
            Some(&Rejection::ConsecutiveTargets {
                start: 1,
                len: 2,
                max: 1
            })
        );
    }

    #[test]
    fn validation_is_repeatable() {
        let stimuli = ['A', 'B', 'A', 'C', 'A'];
        let flags = [false, false, true, false, true];
        let lures = [LureType::None; 5];
        let a = validate_sequence(&stimuli, &flags, &lures, 2, 0.4, 1, 2);
        let b = validate_sequence(&stimuli, &flags, &lures, 2, 0.4, 1, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn works_on_string_stimuli() {
        let stimuli = vec!["K".to_string(), "L".to_string(), "K".to_string()];
        let v = validate_sequence(&stimuli, &[false, false, true], &NONE3, 2, 0.33, 1, 1);
        assert!(v.accepted());
    }

    #[test]
    fn lure_audit_catches_each_failure() {
        // 2-back: index 2 repeats index 1 -> valid n-1 lure.
        let ok = check_lures(
            &['A', 'B', 'B'],
            &[false, false, false],
            &[LureType::None, LureType::None, LureType::NMinus1],
            2,
        );
        assert!(ok.accepted(), "{}", ok.reason());

        let mismatch = check_lures(
            &['A', 'B', 'C'],
            &[false, false, false],
            &[LureType::None, LureType::None, LureType::NMinus1],
            2,
        );
        assert!(matches!(
            mismatch.rejection(),
            Some(Rejection::LureMismatch { index: 2, .. })
        ));

        let early = check_lures(
            &['A', 'B', 'A'],
            &[false, false, false],
            &[LureType::None, LureType::None, LureType::NPlus1],
            2,
        );
        assert!(matches!(
            early.rejection(),
            Some(Rejection::LureTooEarly { index: 2, .. })
        ));

        let on_target = check_lures(
            &['A', 'B', 'A'],
            &[false, false, true],
            &[LureType::None, LureType::None, LureType::NMinus1],
            2,
        );
        assert_eq!(
            on_target.rejection(),
            Some(&Rejection::LureOnTarget { index: 2 })
        );

        let one_back = check_lures(
            &['A', 'B'],
            &[false, false],
            &[LureType::None, LureType::NMinus1],
            1,
        );
        assert!(matches!(
            one_back.rejection(),
            Some(Rejection::LureTooEarly { index: 1, .. })
        ));
    }

    #[test]
    fn lure_that_is_also_a_target_is_rejected() {
        // 2-back AAA: index 2 matches both 1 and 0 back.
        let v = check_lures(
            &['A', 'A', 'A'],
            &[false, false, false],
            &[LureType::None, LureType::None, LureType::NMinus1],
            2,
        );
        assert!(matches!(
            v.rejection(),
            Some(Rejection::LureMatchesTarget { index: 2, .. })
        ));
    }

    #[test]
    fn identical_runs_are_measured_but_separate() {
        assert_eq!(longest_identical_run(&['A', 'B', 'B', 'B', 'C']), (1, 3));
        assert_eq!(longest_identical_run::<char>(&[]), (0, 0));
        assert!(identical_runs_within(&['A', 'A', 'B'], 2));
        assert!(!identical_runs_within(&['A', 'A', 'A'], 2));
    }

    #[test]
    fn expected_count_rounds_to_nearest() {
        assert_eq!(expected_target_count(0.30, 20), 6);
        assert_eq!(expected_target_count(0.33, 3), 1);
        assert_eq!(expected_target_count(0.0, 60), 0);
    }

    #[test]
    fn expected_count_rounds_halves_to_even() {
        assert_eq!(expected_target_count(0.25, 10), 2);
        assert_eq!(expected_target_count(0.5, 5), 2);
        assert_eq!(expected_target_count(0.5, 7), 4);
    }

    #[test]
    fn one_target_in_ten_at_quarter_rate_is_within_tolerance() {
        // 3-back, only index 3 repeats: one target where 2.5 -> 2 are wanted.
        let stimuli: Vec<char> = "ABCADEFGHJ".chars().collect();
        let mut flags = [false; 10];
        flags[3] = true;
        let v = validate_sequence(&stimuli, &flags, &[LureType::None; 10], 3, 0.25, 1, 1);
        assert!(v.accepted(), "{}", v.reason());
    }
}
