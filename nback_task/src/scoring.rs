use nback::trial::TrialPlan;
use serde::Serialize;

/// A trial is correct when the participant responds to a target or withholds
/// on a non-target. Lures count as non-targets.
pub fn score_trial(plan: &TrialPlan, responded: bool) -> bool {
    plan.is_target == responded
}

/// Running tallies for one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockScore {
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    /// False alarms that landed on a lure trial.
    pub lure_false_alarms: u32,
    pub lure_trials: u32,
    /// Reaction times of correct responses, in milliseconds.
    pub rts_ms: Vec<f64>,
}

impl BlockScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one trial and return whether it was correct.
    ///
    /// `rt_ms` is kept only for hits; a withheld response has no RT.
    pub fn record(&mut self, plan: &TrialPlan, responded: bool, rt_ms: Option<f64>) -> bool {
        if plan.lure_type.is_lure() {
            self.lure_trials += 1;
        }
        match (plan.is_target, responded) {
            (true, true) => {
                self.hits += 1;
                if let Some(rt) = rt_ms {
                    self.rts_ms.push(rt);
                }
            }
            (true, false) => self.misses += 1,
            (false, true) => {
                self.false_alarms += 1;
                if plan.lure_type.is_lure() {
                    self.lure_false_alarms += 1;
                }
            }
            (false, false) => self.correct_rejections += 1,
        }
        score_trial(plan, responded)
    }

    pub fn trials(&self) -> u32 {
        self.hits + self.misses + self.false_alarms + self.correct_rejections
    }

    pub fn correct(&self) -> u32 {
        self.hits + self.correct_rejections
    }

    /// Fraction correct; 0.0 for an empty block.
    pub fn accuracy(&self) -> f64 {
        let total = self.trials();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }

    /// Mean RT over correct responses, if any.
    pub fn mean_rt_ms(&self) -> Option<f64> {
        if self.rts_ms.is_empty() {
            return None;
        }
        Some(self.rts_ms.iter().sum::<f64>() / self.rts_ms.len() as f64)
    }

    pub fn hit_rate(&self) -> Option<f64> {
        let targets = self.hits + self.misses;
        (targets > 0).then(|| self.hits as f64 / targets as f64)
    }

    pub fn false_alarm_rate(&self) -> Option<f64> {
        let nontargets = self.false_alarms + self.correct_rejections;
        (nontargets > 0).then(|| self.false_alarms as f64 / nontargets as f64)
    }

    /// Practice gate: accuracy at or above `criterion`.
    pub fn passes(&self, criterion: f64) -> bool {
        self.accuracy() >= criterion
    }

    /// Fold another block into this one.
    pub fn merge(&mut self, other: &BlockScore) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.false_alarms += other.false_alarms;
        self.correct_rejections += other.correct_rejections;
        self.lure_false_alarms += other.lure_false_alarms;
        self.lure_trials += other.lure_trials;
        self.rts_ms.extend_from_slice(&other.rts_ms);
    }
}
