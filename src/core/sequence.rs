//! Constrained stimulus-sequence generation.
//!
//! Each attempt builds one candidate left to right:
//! 1. decide whether the position is a target: remaining target budget over
//!    the positions the consecutive-target cap still leaves usable;
//! 2. targets copy the stimulus N positions back;
//! 3. other positions may become n-1 / n+1 lures (remaining lure budgets);
//! 4. everything else is sampled freely, avoiding accidental matches and,
//!    best-effort, long identical runs.
//!
//! The finished candidate goes through the validator; rejected candidates
//! are discarded and rebuilt, up to `max_attempts` times.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::{debug, warn};

use crate::alphabet::Alphabet;
use crate::error::{ConstraintKind, NbackError, Result};
use crate::params;
use crate::prng::{Prng, RandomSource};
use crate::trial::{split_plans, LureType, TrialPlan};
use crate::validate::{
    check_lures, expected_target_count, longest_identical_run, validate_sequence, Rejection,
};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SequenceOptions {
    /// Fraction of trials that should be targets (realized within ±1 trial).
    pub target_rate: f64,
    /// Share of trials that should become n-1 lures.
    pub lure_n_minus_1_rate: f64,
    /// Share of trials that should become n+1 lures.
    pub lure_n_plus_1_rate: f64,
    pub max_consec_targets: usize,
    /// Best-effort cap on identical-stimulus runs for freely chosen trials.
    pub max_identical_run: usize,
    pub fixed_iti_ms: u32,
    pub max_attempts: u32,
    /// Bias free choices toward letters used less often so far.
    pub soft_balance_initial: bool,
    /// Positions `< balance_horizon` are balanced; `None` balances the whole
    /// sequence.
    pub balance_horizon: Option<usize>,
    pub include_lures: bool,
    pub alphabet: Alphabet,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            target_rate: params::TARGET_RATE,
            lure_n_minus_1_rate: params::LURE_N_MINUS_1_RATE,
            lure_n_plus_1_rate: params::LURE_N_PLUS_1_RATE,
            max_consec_targets: params::MAX_CONSEC_TARGETS,
            max_identical_run: params::MAX_IDENTICAL_RUN,
            fixed_iti_ms: params::FIXED_ITI_MS,
            max_attempts: params::MAX_ATTEMPTS,
            soft_balance_initial: true,
            balance_horizon: None,
            include_lures: true,
            alphabet: Alphabet::default(),
        }
    }
}

impl SequenceOptions {
    pub fn with_target_rate(mut self, rate: f64) -> Self {
        self.target_rate = rate;
        self
    }

    pub fn with_lure_rates(mut self, n_minus_1: f64, n_plus_1: f64) -> Self {
        self.lure_n_minus_1_rate = n_minus_1;
        self.lure_n_plus_1_rate = n_plus_1;
        self
    }

    pub fn with_max_consec_targets(mut self, max: usize) -> Self {
        self.max_consec_targets = max;
        self
    }

    pub fn with_max_identical_run(mut self, max: usize) -> Self {
        self.max_identical_run = max;
        self
    }

    pub fn with_fixed_iti_ms(mut self, iti_ms: u32) -> Self {
        self.fixed_iti_ms = iti_ms;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_soft_balance(mut self, enabled: bool, horizon: Option<usize>) -> Self {
        self.soft_balance_initial = enabled;
        self.balance_horizon = horizon;
        self
    }

    pub fn with_lures(mut self, enabled: bool) -> Self {
        self.include_lures = enabled;
        self
    }

    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Reject requests no amount of retrying could satisfy.
    pub fn validate(&self, n_back: usize, n_trials: usize) -> Result<()> {
        let invalid = |msg: String| Err(NbackError::InvalidParameters(msg));

        if n_back == 0 {
            return invalid("n_back must be >= 1".to_string());
        }
        // A target needs n_back trials of history; require at least as many
        // target-eligible positions as history positions.
        if n_back.checked_mul(2).map_or(true, |min| n_trials < min) {
            return invalid(format!(
                "n_trials ({n_trials}) must be at least 2 x n_back (n_back = {n_back})"
            ));
        }

        for (name, rate) in [
            ("target_rate", self.target_rate),
            ("lure_n_minus_1_rate", self.lure_n_minus_1_rate),
            ("lure_n_plus_1_rate", self.lure_n_plus_1_rate),
        ] {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return invalid(format!("{name} must be in [0, 1], got {rate}"));
            }
        }
        if self.include_lures {
            let total = self.target_rate + self.lure_n_minus_1_rate + self.lure_n_plus_1_rate;
            if total > 1.0 + 1e-9 {
                return invalid(format!(
                    "target and lure rates sum to {total:.3}; a trial can carry only one role"
                ));
            }
        }

        if self.max_consec_targets == 0 {
            return invalid("max_consec_targets must be >= 1".to_string());
        }
        if self.max_identical_run == 0 {
            return invalid("max_identical_run must be >= 1".to_string());
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts must be >= 1".to_string());
        }

        let wanted = expected_target_count(self.target_rate, n_trials);
        let fit = run_capped_capacity(n_trials - n_back, self.max_consec_targets);
        if wanted.saturating_sub(params::TARGET_COUNT_TOLERANCE) > fit {
            return invalid(format!(
                "target_rate asks for {wanted} targets but at most {fit} fit in {n_trials} trials at {n_back}-back with max {} consecutive",
                self.max_consec_targets
            ));
        }

        Ok(())
    }
}

/// Most `true` flags that fit in `slots` positions without a run longer than `cap`.
fn run_capped_capacity(slots: usize, cap: usize) -> usize {
    let period = cap + 1;
    (slots / period) * cap + (slots % period).min(cap)
}

/// Most targets placeable in the last `remaining` positions when the run
/// ending just before them is `run` long.
fn usable_target_slots(remaining: usize, run: usize, cap: usize) -> usize {
    if run >= cap {
        return run_capped_capacity(remaining.saturating_sub(1), cap);
    }
    let head = (cap - run).min(remaining);
    head + run_capped_capacity(remaining.saturating_sub(head + 1), cap)
}

#[derive(Debug, Clone, Default)]
struct Candidate {
    stimuli: Vec<char>,
    is_target: Vec<bool>,
    lure_types: Vec<LureType>,
}

/// Retry-based sequence generator.
#[derive(Debug, Clone, Default)]
pub struct SequenceGenerator {
    options: SequenceOptions,
}

impl SequenceGenerator {
    pub fn new(options: SequenceOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SequenceOptions {
        &self.options
    }

    /// Produce a validated sequence of `n_trials` plans at level `n_back`.
    ///
    /// Parameters are checked before the random source is touched.
    pub fn generate<R: RandomSource>(
        &self,
        n_back: usize,
        n_trials: usize,
        rng: &mut R,
    ) -> Result<Vec<TrialPlan>> {
        self.options.validate(n_back, n_trials)?;
        self.search(n_back, n_trials, |_| self.build_candidate(n_back, n_trials, rng))
    }

    /// Retry loop: build, judge, keep the first accepted candidate.
    fn search(
        &self,
        n_back: usize,
        n_trials: usize,
        mut build: impl FnMut(u32) -> Candidate,
    ) -> Result<Vec<TrialPlan>> {
        let opts = &self.options;
        let mut last: Option<Rejection> = None;
        for attempt in 1..=opts.max_attempts {
            let c = build(attempt);

            let mut verdict = validate_sequence(
                &c.stimuli,
                &c.is_target,
                &c.lure_types,
                n_back,
                opts.target_rate,
                params::TARGET_COUNT_TOLERANCE,
                opts.max_consec_targets,
            );
            if verdict.accepted() {
                verdict = check_lures(&c.stimuli, &c.is_target, &c.lure_types, n_back);
            }

            if verdict.accepted() {
                debug!(n_back, n_trials, attempt, "sequence accepted");
                return Ok(self.into_plans(c));
            }

            debug!(n_back, n_trials, attempt, reason = %verdict.reason(), "candidate rejected");
            last = verdict.rejection().cloned();
        }

        let (kind, last_reason) = match last {
            Some(r) => (r.kind(), r.to_string()),
            None => (ConstraintKind::RateTolerance, String::new()),
        };
        warn!(
            n_back,
            n_trials,
            attempts = opts.max_attempts,
            %kind,
            "no valid sequence found"
        );
        Err(NbackError::ConstraintUnsatisfiable {
            attempts: opts.max_attempts,
            kind,
            last_reason,
        })
    }

    fn into_plans(&self, c: Candidate) -> Vec<TrialPlan> {
        let iti_ms = self.options.fixed_iti_ms;
        c.stimuli
            .into_iter()
            .zip(c.is_target)
            .zip(c.lure_types)
            .map(|((stimulus, is_target), lure_type)| TrialPlan {
                stimulus,
                is_target,
                lure_type,
                iti_ms,
            })
            .collect()
    }

    fn build_candidate<R: RandomSource>(
        &self,
        n_back: usize,
        n_trials: usize,
        rng: &mut R,
    ) -> Candidate {
        let opts = &self.options;
        let alphabet = &opts.alphabet;
        let horizon = opts.balance_horizon.unwrap_or(n_trials);

        let mut c = Candidate {
            stimuli: Vec::with_capacity(n_trials),
            is_target: Vec::with_capacity(n_trials),
            lure_types: Vec::with_capacity(n_trials),
        };
        let mut counts = vec![0u32; alphabet.len()];

        let mut targets_left = expected_target_count(opts.target_rate, n_trials);
        let mut lures_left = if opts.include_lures {
            [
                if n_back >= 2 {
                    expected_target_count(opts.lure_n_minus_1_rate, n_trials)
                } else {
                    0
                },
                expected_target_count(opts.lure_n_plus_1_rate, n_trials),
            ]
        } else {
            [0, 0]
        };
        let mut target_run = 0usize;

        for i in 0..n_trials {
            let target_ref = (i >= n_back).then(|| c.stimuli[i - n_back]);

            // 1. Target decision. Certain once the budget fills every usable
            // position; a budget above that is placed as far as it fits.
            let is_target = match target_ref {
                Some(_) if targets_left > 0 && target_run < opts.max_consec_targets => {
                    let usable =
                        usable_target_slots(n_trials - i, target_run, opts.max_consec_targets);
                    rng.gen_bool(targets_left as f64 / usable as f64)
                }
                _ => false,
            };

            let (stimulus, lure) = match (is_target, target_ref) {
                // 2. Forced copy of the N-back stimulus.
                (true, Some(t)) => (t, LureType::None),
                _ => match self.pick_lure(&c.stimuli, n_back, n_trials, &mut lures_left, rng) {
                    // 3. Forced copy of the lure reference.
                    Some((s, lure)) => (s, lure),
                    // 4. Free choice.
                    None => {
                        let balance = opts.soft_balance_initial && i < horizon;
                        let s = self.pick_free(&c.stimuli, n_back, &counts, balance, rng);
                        (s, self.classify_free(&c.stimuli, n_back, s))
                    }
                },
            };

            if let Some(ix) = alphabet.index_of(stimulus) {
                counts[ix] += 1;
            }
            if is_target {
                targets_left -= 1;
                target_run += 1;
            } else {
                target_run = 0;
            }
            c.stimuli.push(stimulus);
            c.is_target.push(is_target);
            c.lure_types.push(lure);
        }

        c
    }

    /// Try to turn the next (non-target) position into a lure.
    ///
    /// n-1 is considered before n+1.
    fn pick_lure<R: RandomSource>(
        &self,
        seq: &[char],
        n_back: usize,
        n_trials: usize,
        lures_left: &mut [usize; 2],
        rng: &mut R,
    ) -> Option<(char, LureType)> {
        let i = seq.len();
        let target_ref = (i >= n_back).then(|| seq[i - n_back]);
        let slots_left = (n_trials - i) as f64;

        for (slot, lure) in [LureType::NMinus1, LureType::NPlus1].into_iter().enumerate() {
            if lures_left[slot] == 0 {
                continue;
            }
            let dist = match lure.reference_distance(n_back) {
                Some(d) if i >= d => d,
                _ => continue,
            };
            if !rng.gen_bool(lures_left[slot] as f64 / slots_left) {
                continue;
            }
            let s = seq[i - dist];
            if Some(s) == target_ref || !run_fits(seq, s, self.options.max_identical_run) {
                continue;
            }
            // A copy that also repeats the n-1 reference is labelled n-1,
            // charged to that budget while it lasts.
            let (lure, charged) = match LureType::NMinus1.reference_distance(n_back) {
                Some(d) if lure == LureType::NPlus1 && i >= d && seq[i - d] == s => {
                    (LureType::NMinus1, if lures_left[0] > 0 { 0 } else { slot })
                }
                _ => (lure, slot),
            };
            lures_left[charged] -= 1;
            return Some((s, lure));
        }
        None
    }

    /// Free choice for a plain trial.
    ///
    /// The N-back stimulus is always excluded. Lure references and letters
    /// that would overrun `max_identical_run` are excluded only while some
    /// candidate remains.
    fn pick_free<R: RandomSource>(
        &self,
        seq: &[char],
        n_back: usize,
        counts: &[u32],
        balance: bool,
        rng: &mut R,
    ) -> char {
        let i = seq.len();
        let symbols = self.options.alphabet.symbols();
        let target_ref = (i >= n_back).then(|| seq[i - n_back]);
        let lure_refs: Vec<char> = [LureType::NMinus1, LureType::NPlus1]
            .into_iter()
            .filter_map(|l| l.reference_distance(n_back))
            .filter(|&d| i >= d)
            .map(|d| seq[i - d])
            .collect();

        let mut pool: Vec<usize> = (0..symbols.len())
            .filter(|&ix| Some(symbols[ix]) != target_ref)
            .collect();
        narrow(&mut pool, |ix| !lure_refs.contains(&symbols[ix]));
        narrow(&mut pool, |ix| {
            run_fits(seq, symbols[ix], self.options.max_identical_run)
        });

        let ix = if balance {
            weighted_pick(&pool, counts, rng)
        } else {
            pool[rng.gen_range_usize(0, pool.len())]
        };
        symbols[ix]
    }

    /// Label a freely chosen stimulus truthfully when relaxation let it
    /// land on a lure reference. A stimulus matching both references counts
    /// as n-1.
    fn classify_free(&self, seq: &[char], n_back: usize, s: char) -> LureType {
        if !self.options.include_lures {
            return LureType::None;
        }
        let i = seq.len();
        for lure in [LureType::NMinus1, LureType::NPlus1] {
            if let Some(d) = lure.reference_distance(n_back) {
                if i >= d && seq[i - d] == s {
                    return lure;
                }
            }
        }
        LureType::None
    }
}

/// Keep only entries passing `keep`, unless that would empty the pool.
fn narrow(pool: &mut Vec<usize>, keep: impl Fn(usize) -> bool) {
    if pool.iter().any(|&ix| keep(ix)) {
        pool.retain(|&ix| keep(ix));
    }
}

/// Would appending `candidate` keep the trailing identical run within `max_run`?
fn run_fits(seq: &[char], candidate: char, max_run: usize) -> bool {
    let trailing = seq.iter().rev().take_while(|&&s| s == candidate).count();
    trailing < max_run
}

/// Weight each letter by how far it trails the most used one.
fn weighted_pick<R: RandomSource>(pool: &[usize], counts: &[u32], rng: &mut R) -> usize {
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let weights: Vec<u64> = pool
        .iter()
        .map(|&ix| u64::from(max_count - counts[ix]) + 1)
        .collect();
    let total: u64 = weights.iter().sum();

    let mut r = rng.next_u64() % total;
    for (&ix, &w) in pool.iter().zip(&weights) {
        if r < w {
            return ix;
        }
        r -= w;
    }
    pool[pool.len() - 1]
}

/// Generate one sequence with explicit options.
pub fn generate_sequence<R: RandomSource>(
    n_back: usize,
    n_trials: usize,
    options: &SequenceOptions,
    rng: &mut R,
) -> Result<Vec<TrialPlan>> {
    SequenceGenerator::new(options.clone()).generate(n_back, n_trials, rng)
}

/// One sequence to produce as part of a batch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockRequest {
    pub n_back: usize,
    pub n_trials: usize,
    pub options: SequenceOptions,
    /// Stream id used to fork the block's own generator from the root.
    pub stream: u64,
}

/// Generate several independent sequences.
///
/// Each request draws from `root.fork(request.stream)`, so the output does not
/// depend on request order or on whether the `parallel` feature is enabled.
pub fn generate_blocks(requests: &[BlockRequest], root: &Prng) -> Result<Vec<Vec<TrialPlan>>> {
    let run = |req: &BlockRequest| {
        let mut rng = root.fork(req.stream);
        generate_sequence(req.n_back, req.n_trials, &req.options, &mut rng)
    };

    #[cfg(feature = "parallel")]
    let out = requests.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let out = requests.iter().map(run).collect();
    out
}

/// Counts for a generated (or loaded) sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SequenceSummary {
    pub trials: usize,
    pub targets: usize,
    pub lures_n_minus_1: usize,
    pub lures_n_plus_1: usize,
    pub longest_identical_run: usize,
}

pub fn summarize(plans: &[TrialPlan]) -> SequenceSummary {
    let (stimuli, _, _) = split_plans(plans);
    let count_lure = |l: LureType| plans.iter().filter(|p| p.lure_type == l).count();
    SequenceSummary {
        trials: plans.len(),
        targets: plans.iter().filter(|p| p.is_target).count(),
        lures_n_minus_1: count_lure(LureType::NMinus1),
        lures_n_plus_1: count_lure(LureType::NPlus1),
        longest_identical_run: longest_identical_run(&stimuli).1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::audit_sequence;

    /// Counts draws so tests can prove nothing was consumed.
    struct CountingSource {
        inner: Prng,
        draws: usize,
    }

    impl RandomSource for CountingSource {
        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            self.inner.next_u64()
        }
    }

    /// Always returns `u64::MAX`: `gen_bool` below certainty never fires and
    /// `x % len` picks are fixed.
    struct Stuck;

    impl RandomSource for Stuck {
        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }
    }

    fn assert_well_formed(plans: &[TrialPlan], n_back: usize, opts: &SequenceOptions) {
        let (stimuli, flags, lures) = split_plans(plans);
        let v = audit_sequence(
            &stimuli,
            &flags,
            &lures,
            n_back,
            opts.target_rate,
            1,
            opts.max_consec_targets,
        );
        assert!(v.accepted(), "{}", v.reason());
        for p in plans {
            assert!(!(p.is_target && p.lure_type.is_lure()));
            assert_eq!(p.iti_ms, opts.fixed_iti_ms);
            assert!(opts.alphabet.contains(p.stimulus));
        }
    }

    #[test]
    fn two_back_twenty_trials_meets_rate_and_spacing() {
        let opts = SequenceOptions::default()
            .with_target_rate(0.30)
            .with_max_consec_targets(1);
        let mut rng = Prng::new(1234);
        let plans = generate_sequence(2, 20, &opts, &mut rng).unwrap();

        assert_eq!(plans.len(), 20);
        let targets = plans.iter().filter(|p| p.is_target).count();
        assert!((5..=7).contains(&targets), "targets = {targets}");
        for w in plans.windows(2) {
            assert!(!(w[0].is_target && w[1].is_target));
        }
        assert_well_formed(&plans, 2, &opts);
    }

    #[test]
    fn same_seed_same_sequence() {
        let opts = SequenceOptions::default();
        let a = generate_sequence(2, 60, &opts, &mut Prng::new(42)).unwrap();
        let b = generate_sequence(2, 60, &opts, &mut Prng::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_block_is_rejected_before_any_draw() {
        let mut src = CountingSource {
            inner: Prng::new(1),
            draws: 0,
        };
        let err = SequenceGenerator::default()
            .generate(3, 5, &mut src)
            .unwrap_err();
        assert!(matches!(err, NbackError::InvalidParameters(_)));
        assert_eq!(src.draws, 0);

        let err = SequenceGenerator::default()
            .generate(4, 4, &mut src)
            .unwrap_err();
        assert!(matches!(err, NbackError::InvalidParameters(_)));
        assert_eq!(src.draws, 0);
    }

    #[test]
    fn huge_n_back_is_rejected_without_overflow() {
        let opts = SequenceOptions::default();
        for n_back in [usize::MAX, usize::MAX / 2 + 1] {
            let err = opts.validate(n_back, 10).unwrap_err();
            assert!(matches!(err, NbackError::InvalidParameters(_)));
        }
        let err = opts.validate(usize::MAX / 2, usize::MAX - 2).unwrap_err();
        assert!(matches!(err, NbackError::InvalidParameters(_)));
    }

    #[test]
    fn contradictory_options_are_invalid() {
        let mut rng = Prng::new(3);
        let cases = [
            SequenceOptions::default().with_target_rate(-0.1),
            SequenceOptions::default().with_target_rate(f64::NAN),
            SequenceOptions::default().with_target_rate(0.95),
            SequenceOptions::default().with_max_consec_targets(0),
            SequenceOptions::default().with_max_identical_run(0),
            SequenceOptions::default().with_max_attempts(0),
            // More targets than fit with at most one in a row.
            SequenceOptions::default()
                .with_lures(false)
                .with_target_rate(0.9),
        ];
        for opts in cases {
            let err = generate_sequence(2, 20, &opts, &mut rng).unwrap_err();
            assert!(
                matches!(err, NbackError::InvalidParameters(_)),
                "{opts:?} -> {err}"
            );
        }
        let zero_back = generate_sequence(0, 20, &SequenceOptions::default(), &mut rng);
        assert!(matches!(zero_back, Err(NbackError::InvalidParameters(_))));
    }

    #[test]
    fn lures_disabled_means_no_lure_labels() {
        let opts = SequenceOptions::default()
            .with_lures(false)
            .with_target_rate(0.40);
        let plans = generate_sequence(2, 30, &opts, &mut Prng::new(8)).unwrap();
        assert!(plans.iter().all(|p| p.lure_type == LureType::None));
        assert_well_formed(&plans, 2, &opts);
    }

    #[test]
    fn lures_are_placed_and_correct() {
        let opts = SequenceOptions::default().with_lure_rates(0.15, 0.15);
        let plans = generate_sequence(3, 60, &opts, &mut Prng::new(11)).unwrap();
        let s = summarize(&plans);
        assert!(s.lures_n_minus_1 + s.lures_n_plus_1 > 0);
        assert_well_formed(&plans, 3, &opts);
    }

    #[test]
    fn one_back_never_labels_n_minus_1() {
        let opts = SequenceOptions::default().with_lure_rates(0.2, 0.1);
        for seed in 1..20 {
            let plans = generate_sequence(1, 40, &opts, &mut Prng::new(seed)).unwrap();
            assert!(plans.iter().all(|p| p.lure_type != LureType::NMinus1));
            assert_well_formed(&plans, 1, &opts);
        }
    }

    #[test]
    fn copies_of_both_lure_references_are_labelled_n_minus_1() {
        let opts = SequenceOptions::default()
            .with_target_rate(0.2)
            .with_lure_rates(0.2, 0.2);
        for seed in 0..200 {
            let plans = generate_sequence(2, 60, &opts, &mut Prng::new(seed)).unwrap();
            for i in 1..plans.len() {
                if plans[i].lure_type == LureType::NPlus1 {
                    assert_ne!(
                        plans[i].stimulus,
                        plans[i - 1].stimulus,
                        "seed {seed}: n+1 lure at {i} repeats the n-1 reference"
                    );
                }
            }
            assert_well_formed(&plans, 2, &opts);
        }
    }

    #[test]
    fn free_choices_follow_soft_balance_and_horizon() {
        // 10-back on three letters: the first nine trials are all free choices.
        let base = SequenceOptions::default()
            .with_alphabet(Alphabet::new(['A', 'B', 'C']).unwrap())
            .with_target_rate(0.0)
            .with_lures(false)
            .with_max_identical_run(2)
            .with_max_attempts(1);
        let prefix = |opts: SequenceOptions| -> String {
            let plans = generate_sequence(10, 20, &opts, &mut Stuck).unwrap();
            assert_well_formed(&plans, 10, &opts);
            plans[..9].iter().map(|p| p.stimulus).collect()
        };

        // Balanced picks favour the letter seen least, so B turns up early.
        assert_eq!(prefix(base.clone().with_soft_balance(true, None)), "AACBABCAB");
        // Unweighted picks with a fixed draw never reach B.
        assert_eq!(prefix(base.clone().with_soft_balance(false, None)), "AACAACAAC");
        // Balancing stops at the horizon: three balanced trials match the
        // unweighted prefix, a fourth already brings in B.
        assert_eq!(prefix(base.clone().with_soft_balance(true, Some(3))), "AACAACAAC");
        assert_eq!(prefix(base.with_soft_balance(true, Some(4))), "AACBAACAA");
    }

    #[test]
    fn two_letter_alphabet_still_yields_valid_sequences() {
        let opts = SequenceOptions::default()
            .with_alphabet(Alphabet::new(['X', 'Y']).unwrap())
            .with_lures(false);
        let plans = generate_sequence(2, 20, &opts, &mut Prng::new(5)).unwrap();
        assert_well_formed(&plans, 2, &opts);
    }

    #[test]
    fn identical_runs_stay_short_with_a_full_alphabet() {
        // Lures off: with lures on, a forced target may extend an n-1 lure's
        // repeat, which the soft cap tolerates.
        let opts = SequenceOptions::default()
            .with_lures(false)
            .with_max_identical_run(2);
        for seed in 0..10 {
            let plans = generate_sequence(2, 60, &opts, &mut Prng::new(seed)).unwrap();
            assert!(summarize(&plans).longest_identical_run <= 2);
        }
    }

    #[test]
    fn exhausted_attempts_name_the_failing_constraint() {
        let gen = SequenceGenerator::new(SequenceOptions::default().with_max_attempts(3));
        let mut built = 0;
        // Twenty distinct letters: no targets where six are wanted.
        let res = gen.search(2, 20, |_| {
            built += 1;
            Candidate {
                stimuli: "ABCDEFGHJKLMNPRSTUVW".chars().collect(),
                is_target: vec![false; 20],
                lure_types: vec![LureType::None; 20],
            }
        });
        assert_eq!(built, 3);
        match res {
            Err(NbackError::ConstraintUnsatisfiable {
                attempts,
                kind,
                last_reason,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(kind, ConstraintKind::RateTolerance);
                assert!(last_reason.contains("target count"));
            }
            other => panic!("expected ConstraintUnsatisfiable, got {other:?}"),
        }
    }

    #[test]
    fn degenerate_source_still_fills_the_target_budget() {
        // Every draw below certainty fails, so targets land only once the
        // budget fills the usable positions.
        let opts = SequenceOptions::default()
            .with_target_rate(0.4)
            .with_lures(false)
            .with_max_attempts(1);
        let plans = generate_sequence(2, 20, &opts, &mut Stuck).unwrap();
        assert_eq!(summarize(&plans).targets, 8);
        assert_well_formed(&plans, 2, &opts);
    }

    #[test]
    fn oversized_budget_packs_to_capacity() {
        // 41 targets wanted, 40 fit between the caps: one short is tolerated.
        let opts = SequenceOptions::default()
            .with_target_rate(0.5)
            .with_lures(false)
            .with_max_attempts(1);
        let plans = generate_sequence(2, 82, &opts, &mut Prng::new(3)).unwrap();
        assert_eq!(summarize(&plans).targets, 40);
    }

    #[test]
    fn usable_slots_follow_the_current_run() {
        assert_eq!(usable_target_slots(5, 0, 1), 3);
        assert_eq!(usable_target_slots(5, 1, 1), 2);
        assert_eq!(usable_target_slots(5, 0, 2), 4);
        assert_eq!(usable_target_slots(5, 1, 2), 3);
        assert_eq!(usable_target_slots(1, 0, 1), 1);
    }

    #[test]
    fn capacity_respects_run_cap() {
        assert_eq!(run_capped_capacity(18, 1), 9);
        assert_eq!(run_capped_capacity(5, 2), 4);
        assert_eq!(run_capped_capacity(0, 3), 0);
    }

    #[test]
    fn batch_generation_is_order_independent() {
        let opts = SequenceOptions::default();
        let reqs = vec![
            BlockRequest {
                n_back: 1,
                n_trials: 30,
                options: opts.clone(),
                stream: 1,
            },
            BlockRequest {
                n_back: 3,
                n_trials: 30,
                options: opts.clone(),
                stream: 2,
            },
        ];
        let root = Prng::new(77);
        let forward = generate_blocks(&reqs, &root).unwrap();
        let mut reversed_reqs = reqs.clone();
        reversed_reqs.reverse();
        let mut backward = generate_blocks(&reversed_reqs, &root).unwrap();
        backward.reverse();
        assert_eq!(forward, backward);
    }
}
