//! Session planning: practice plus two load phases.
//!
//! Every block is generated from its own fork of the session generator, keyed
//! by block index, so a session can be replayed from its seed and any single
//! block can be regenerated without the others.

use core::fmt;
use core::str::FromStr;

use nback::error::{NbackError, Result};
use nback::params;
use nback::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Order in which the two loads are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LoadOrder {
    /// 1-back, then 3-back.
    #[default]
    A,
    /// 3-back, then 1-back.
    B,
}

impl LoadOrder {
    pub fn loads(self) -> [usize; 2] {
        match self {
            LoadOrder::A => [1, 3],
            LoadOrder::B => [3, 1],
        }
    }
}

impl fmt::Display for LoadOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOrder::A => f.write_str("A"),
            LoadOrder::B => f.write_str("B"),
        }
    }
}

impl FromStr for LoadOrder {
    type Err = NbackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A" | "a" => Ok(LoadOrder::A),
            "B" | "b" => Ok(LoadOrder::B),
            other => Err(NbackError::InvalidParameters(format!(
                "version must be A or B, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub participant: String,
    pub version: LoadOrder,
    pub blocks_per_load: usize,
    pub trials_per_block: usize,
    pub practice: bool,
    pub practice_trials: usize,
    pub practice_n_back: usize,
    pub practice_target_rate: f64,
    pub practice_has_lures: bool,
    pub practice_pass_acc: f64,
    /// Constraints for main-task blocks. `fixed_iti_ms` is overwritten from
    /// the timing fields when blocks are planned.
    pub sequence: SequenceOptions,
    pub soa_ms: u32,
    pub stim_dur_ms: u32,
    /// `None` seeds from the clock; the chosen seed is recorded in the plan.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            participant: String::new(),
            version: LoadOrder::A,
            blocks_per_load: params::BLOCKS_PER_LOAD,
            trials_per_block: params::TRIALS_PER_BLOCK,
            practice: true,
            practice_trials: params::PRACTICE_TRIALS,
            practice_n_back: params::PRACTICE_N_BACK,
            practice_target_rate: params::PRACTICE_TARGET_RATE,
            practice_has_lures: params::PRACTICE_HAS_LURES,
            practice_pass_acc: params::PRACTICE_PASS_ACC,
            sequence: SequenceOptions::default(),
            soa_ms: params::SOA_MS,
            stim_dur_ms: params::STIM_DUR_MS,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = participant.into();
        self
    }

    pub fn with_version(mut self, version: LoadOrder) -> Self {
        self.version = version;
        self
    }

    pub fn with_blocks_per_load(mut self, blocks: usize) -> Self {
        self.blocks_per_load = blocks;
        self
    }

    pub fn with_trials_per_block(mut self, trials: usize) -> Self {
        self.trials_per_block = trials;
        self
    }

    /// Enable or disable practice and set its length.
    pub fn with_practice(mut self, enabled: bool, trials: usize) -> Self {
        self.practice = enabled;
        self.practice_trials = trials;
        self
    }

    pub fn with_sequence_options(mut self, options: SequenceOptions) -> Self {
        self.sequence = options;
        self
    }

    pub fn with_timing(mut self, soa_ms: u32, stim_dur_ms: u32) -> Self {
        self.soa_ms = soa_ms;
        self.stim_dur_ms = stim_dur_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Time left in each SOA after the stimulus is removed.
    pub fn fixed_iti_ms(&self) -> u32 {
        self.soa_ms.saturating_sub(self.stim_dur_ms)
    }

    /// Options for main-task blocks.
    pub fn main_options(&self) -> SequenceOptions {
        self.sequence.clone().with_fixed_iti_ms(self.fixed_iti_ms())
    }

    /// Options for the practice block.
    pub fn practice_options(&self) -> SequenceOptions {
        self.sequence
            .clone()
            .with_target_rate(self.practice_target_rate)
            .with_lures(self.practice_has_lures)
            .with_fixed_iti_ms(self.fixed_iti_ms())
    }

    /// Check the session shape and every block's sequence parameters.
    pub fn validate(&self) -> Result<()> {
        if self.blocks_per_load == 0 {
            return Err(NbackError::InvalidParameters(
                "blocks_per_load must be at least 1".into(),
            ));
        }
        if self.soa_ms == 0 {
            return Err(NbackError::InvalidParameters("soa_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.practice_pass_acc) {
            return Err(NbackError::InvalidParameters(format!(
                "practice_pass_acc must be in [0, 1], got {}",
                self.practice_pass_acc
            )));
        }
        if self.practice && self.practice_trials > 0 {
            self.practice_options()
                .validate(self.practice_n_back, self.practice_trials)?;
        }
        if self.trials_per_block > 0 {
            let opts = self.main_options();
            for n_back in self.version.loads() {
                opts.validate(n_back, self.trials_per_block)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Practice,
    Main,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockPlan {
    /// 0 for practice, then 1.. across both load phases.
    pub block_idx: usize,
    pub phase: Phase,
    pub n_back: usize,
    pub trials: Vec<TrialPlan>,
}

impl BlockPlan {
    pub fn summary(&self) -> SequenceSummary {
        summarize(&self.trials)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionPlan {
    pub participant: String,
    pub version: LoadOrder,
    pub load_order: [usize; 2],
    pub seed: u64,
    pub soa_ms: u32,
    pub fixed_iti_ms: u32,
    pub practice: Option<BlockPlan>,
    pub blocks: Vec<BlockPlan>,
}

impl SessionPlan {
    /// Main-task blocks at load `n_back`, in run order.
    pub fn blocks_for_load(&self, n_back: usize) -> impl Iterator<Item = &BlockPlan> {
        self.blocks.iter().filter(move |b| b.n_back == n_back)
    }

    pub fn total_trials(&self) -> usize {
        self.blocks.iter().map(|b| b.trials.len()).sum()
    }
}

/// Stream id for a practice repetition. The first run uses block index 0.
fn practice_stream(repetition: u64) -> u64 {
    if repetition == 0 {
        0
    } else {
        u64::MAX - repetition
    }
}

/// Plan the practice block for a given repetition.
///
/// A participant who misses the criterion repeats practice with a fresh
/// sequence; repetition 0 is the one included in [`plan_session`].
pub fn plan_practice(config: &SessionConfig, seed: u64, repetition: u64) -> Result<BlockPlan> {
    let mut rng = Prng::new(seed).fork(practice_stream(repetition));
    let trials = generate_sequence(
        config.practice_n_back,
        config.practice_trials,
        &config.practice_options(),
        &mut rng,
    )?;
    debug!(repetition, trials = trials.len(), "practice block planned");
    Ok(BlockPlan {
        block_idx: 0,
        phase: Phase::Practice,
        n_back: config.practice_n_back,
        trials,
    })
}

/// Plan a whole session.
pub fn plan_session(config: &SessionConfig) -> Result<SessionPlan> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(|| Prng::from_time().state());
    let load_order = config.version.loads();

    let practice = if config.practice && config.practice_trials > 0 {
        Some(plan_practice(config, seed, 0)?)
    } else {
        None
    };

    let mut blocks = Vec::new();
    if config.trials_per_block == 0 {
        info!("trials_per_block is 0; skipping main task");
    } else {
        let options = config.main_options();
        let mut requests = Vec::with_capacity(2 * config.blocks_per_load);
        for n_back in load_order {
            for _ in 0..config.blocks_per_load {
                requests.push(BlockRequest {
                    n_back,
                    n_trials: config.trials_per_block,
                    options: options.clone(),
                    stream: (requests.len() + 1) as u64,
                });
            }
        }

        let sequences = generate_blocks(&requests, &Prng::new(seed))?;
        blocks = requests
            .iter()
            .zip(sequences)
            .map(|(req, trials)| BlockPlan {
                block_idx: req.stream as usize,
                phase: Phase::Main,
                n_back: req.n_back,
                trials,
            })
            .collect();
    }

    info!(
        participant = %config.participant,
        version = %config.version,
        seed,
        blocks = blocks.len(),
        "session planned"
    );

    Ok(SessionPlan {
        participant: config.participant.clone(),
        version: config.version,
        load_order,
        seed,
        soa_ms: config.soa_ms,
        fixed_iti_ms: config.fixed_iti_ms(),
        practice,
        blocks,
    })
}
