//! Event marker codes.
//!
//! Codes are 8-bit values meant for a parallel port or an eye-tracker message
//! channel. This module only owns the numbering; sending them is left to
//! whatever hardware layer the runner is wired to.

use nback::error::{NbackError, Result};
use nback::trial::{LureType, TrialPlan};
use serde::Serialize;

/// Stimulus onset of a target trial.
pub const STIM_TARGET: u8 = 41;
/// Stimulus onset of a non-target, non-lure trial.
pub const STIM_NONTARGET: u8 = 42;
pub const STIM_LURE_N_MINUS_1: u8 = 43;
pub const STIM_LURE_N_PLUS_1: u8 = 44;

pub const RESPONSE_LOW_LOAD: u8 = 50;
pub const RESPONSE_HIGH_LOAD: u8 = 51;

const DEFAULT_TRIGGERS: &[(&str, u8)] = &[
    ("experiment_start", 1),
    ("consent_shown", 2),
    ("instructions_shown", 3),
    ("practice_start", 10),
    ("practice_end", 11),
    ("block_ll_start", 20),
    ("block_ll_end", 21),
    ("block_hl_start", 30),
    ("block_hl_end", 31),
    ("stim_presentation", 40),
    ("fixation_onset", 41),
    ("response_ll", 50),
    ("response_hl", 51),
    ("debrief_shown", 90),
    ("experiment_end", 99),
];

/// Named trigger codes, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerTable {
    codes: Vec<(String, u8)>,
}

impl Default for TriggerTable {
    fn default() -> Self {
        Self {
            codes: DEFAULT_TRIGGERS
                .iter()
                .map(|&(name, code)| (name.to_string(), code))
                .collect(),
        }
    }
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a named code.
    pub fn code(&self, name: &str) -> Result<u8> {
        self.codes
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, c)| c)
            .ok_or_else(|| NbackError::UnknownTrigger(name.to_string()))
    }

    /// Override or add a code. Values are truncated to the low 8 bits.
    pub fn set_code(&mut self, name: &str, code: u32) -> u8 {
        let masked = (code & 0xFF) as u8;
        match self.codes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = masked,
            None => self.codes.push((name.to_string(), masked)),
        }
        masked
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.codes.iter().map(|(n, c)| (n.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Marker code for a stimulus onset. Targets win over any lure label.
pub fn stim_marker_code(is_target: bool, lure_type: LureType) -> u8 {
    if is_target {
        return STIM_TARGET;
    }
    match lure_type {
        LureType::None => STIM_NONTARGET,
        LureType::NMinus1 => STIM_LURE_N_MINUS_1,
        LureType::NPlus1 => STIM_LURE_N_PLUS_1,
    }
}

/// Convenience wrapper over [`stim_marker_code`] for a planned trial.
pub fn plan_marker_code(plan: &TrialPlan) -> u8 {
    stim_marker_code(plan.is_target, plan.lure_type)
}

pub fn response_marker_code(n_back: usize) -> u8 {
    if n_back == 1 {
        RESPONSE_LOW_LOAD
    } else {
        RESPONSE_HIGH_LOAD
    }
}

/// Trigger name opening a block at load `n_back`.
pub fn block_start_trigger(n_back: usize) -> &'static str {
    if n_back == 1 {
        "block_ll_start"
    } else {
        "block_hl_start"
    }
}

/// Trigger name closing a block at load `n_back`.
pub fn block_end_trigger(n_back: usize) -> &'static str {
    if n_back == 1 {
        "block_ll_end"
    } else {
        "block_hl_end"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_session_codes() {
        let t = TriggerTable::new();
        assert_eq!(t.code("experiment_start").unwrap(), 1);
        assert_eq!(t.code("practice_end").unwrap(), 11);
        assert_eq!(t.code("block_hl_start").unwrap(), 30);
        assert_eq!(t.code("experiment_end").unwrap(), 99);
        assert_eq!(t.len(), 15);
    }

    #[test]
    fn unknown_trigger_is_an_error() {
        let t = TriggerTable::new();
        match t.code("block_mid") {
            Err(NbackError::UnknownTrigger(name)) => assert_eq!(name, "block_mid"),
            other => panic!("expected UnknownTrigger, got {other:?}"),
        }
    }

    #[test]
    fn set_code_masks_to_eight_bits() {
        let mut t = TriggerTable::new();
        assert_eq!(t.set_code("experiment_start", 0x1FF), 0xFF);
        assert_eq!(t.code("experiment_start").unwrap(), 0xFF);

        t.set_code("custom", 300);
        assert_eq!(t.code("custom").unwrap(), 44);
        assert_eq!(t.len(), 16);
    }

    #[test]
    fn stimulus_codes() {
        assert_eq!(stim_marker_code(true, LureType::None), 41);
        assert_eq!(stim_marker_code(true, LureType::NPlus1), 41);
        assert_eq!(stim_marker_code(false, LureType::None), 42);
        assert_eq!(stim_marker_code(false, LureType::NMinus1), 43);
        assert_eq!(stim_marker_code(false, LureType::NPlus1), 44);
    }

    #[test]
    fn load_dependent_codes() {
        let t = TriggerTable::new();
        assert_eq!(response_marker_code(1), 50);
        assert_eq!(response_marker_code(3), 51);
        assert_eq!(t.code(block_start_trigger(1)).unwrap(), 20);
        assert_eq!(t.code(block_end_trigger(1)).unwrap(), 21);
        assert_eq!(t.code(block_start_trigger(3)).unwrap(), 30);
        assert_eq!(t.code(block_end_trigger(3)).unwrap(), 31);
    }
}
