//! Session layer for the two-load N-back task.
//!
//! Builds on the `nback` sequence generator: plans a practice block and the
//! main blocks for both loads, names the event markers a runner emits and
//! scores responses.

pub mod markers;
pub mod scoring;
pub mod session;

pub use markers::{
    block_end_trigger, block_start_trigger, plan_marker_code, response_marker_code,
    stim_marker_code, TriggerTable,
};
pub use scoring::{score_trial, BlockScore};
pub use session::{
    plan_practice, plan_session, BlockPlan, LoadOrder, Phase, SessionConfig, SessionPlan,
};
