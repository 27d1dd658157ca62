//! Command-line tools for N-back sequences.
//!
//! Examples:
//!   nback-cli preview 2 20 1234
//!   nback-cli preview 3 60 --no-lures --json
//!   nback-cli audit trials.json --n-back 2 --target-rate 0.3
//!
//! The seed defaults to `$NBACK_SEED`, then to the clock.

use nback::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::process;
use tracing::{info, warn};

/// One row of a logged session, as written by the task runner.
#[derive(Debug, Clone, Deserialize)]
struct TrialRecord {
    stimulus: String,
    is_target: Flag,
    #[serde(default)]
    lure_type: String,
}

/// Trial logs store target flags as 0/1; accept booleans too.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn get(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct PreviewOutput<'a> {
    n_back: usize,
    trials: usize,
    seed: u64,
    summary: SequenceSummary,
    plans: &'a [TrialPlan],
}

#[derive(Debug, Serialize)]
struct AuditOutput {
    trials: usize,
    accepted: bool,
    reason: String,
    kind: Option<ConstraintKind>,
    longest_identical_run: usize,
}

fn usage() -> ! {
    eprintln!("Usage: nback-cli <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  preview [n_back] [trials] [seed]   Generate and print one sequence (defaults: 2 10)");
    eprintln!("      --target-rate <0-1>            Target rate (default 0.30)");
    eprintln!("      --lure-nminus1 <0-1>           n-1 lure rate (default 0.05)");
    eprintln!("      --lure-nplus1 <0-1>            n+1 lure rate (default 0.05)");
    eprintln!("      --max-consec-targets <n>       Max consecutive targets (default 1)");
    eprintln!("      --no-lures                     Disable lures");
    eprintln!("      --full-alphabet                Keep I, O and Q");
    eprintln!("      --json                         Print JSON instead of text");
    eprintln!("  audit <file.json> --n-back <n>     Re-validate a logged trial list");
    eprintln!("      --target-rate <0-1>            Expected target rate (default 0.30)");
    eprintln!("      --tolerance <n>                Allowed target-count deviation (default 1)");
    eprintln!("      --max-consec-targets <n>       Max consecutive targets (default 1)");
    eprintln!("      --json                         Print JSON instead of text");
    process::exit(1);
}

fn make_error(msg: &str) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}

/// Remove `--name value` from `args`, returning the value.
fn take_value(args: &mut Vec<String>, name: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == name)?;
    if pos + 1 >= args.len() {
        make_error(&format!("{name} needs a value"));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

/// Remove a bare `--name` switch from `args`.
fn take_switch(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn parse_or_exit<T: std::str::FromStr>(value: &str, what: &str) -> T {
    value
        .parse()
        .unwrap_or_else(|_| make_error(&format!("{what} must be a number, got '{value}'")))
}

fn resolve_seed(explicit: Option<&String>) -> u64 {
    if let Some(s) = explicit {
        return parse_or_exit(s, "seed");
    }
    match std::env::var("NBACK_SEED") {
        Ok(s) => parse_or_exit(&s, "NBACK_SEED"),
        Err(_) => Prng::from_time().state(),
    }
}

fn preview(mut args: Vec<String>) {
    let json = take_switch(&mut args, "--json");
    let no_lures = take_switch(&mut args, "--no-lures");
    let full_alphabet = take_switch(&mut args, "--full-alphabet");

    let mut opts = SequenceOptions::default().with_lures(!no_lures);
    if full_alphabet {
        opts = opts.with_alphabet(Alphabet::latin_full());
    }
    if let Some(v) = take_value(&mut args, "--target-rate") {
        opts = opts.with_target_rate(parse_or_exit(&v, "target-rate"));
    }
    let nm1 = take_value(&mut args, "--lure-nminus1")
        .map(|v| parse_or_exit(&v, "lure-nminus1"))
        .unwrap_or(opts.lure_n_minus_1_rate);
    let np1 = take_value(&mut args, "--lure-nplus1")
        .map(|v| parse_or_exit(&v, "lure-nplus1"))
        .unwrap_or(opts.lure_n_plus_1_rate);
    opts = opts.with_lure_rates(nm1, np1);
    if let Some(v) = take_value(&mut args, "--max-consec-targets") {
        opts = opts.with_max_consec_targets(parse_or_exit(&v, "max-consec-targets"));
    }

    let n_back: usize = args.first().map(|s| parse_or_exit(s, "n_back")).unwrap_or(2);
    let trials: usize = args.get(1).map(|s| parse_or_exit(s, "trials")).unwrap_or(10);
    let seed = resolve_seed(args.get(2));

    let mut rng = Prng::new(seed);
    let plans = match generate_sequence(n_back, trials, &opts, &mut rng) {
        Ok(p) => p,
        Err(e) => make_error(&format!("Error: {e}")),
    };
    let summary = summarize(&plans);
    info!(n_back, trials, seed, targets = summary.targets, "sequence generated");

    if json {
        let out = PreviewOutput {
            n_back,
            trials,
            seed,
            summary,
            plans: &plans,
        };
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(e) => make_error(&format!("serialize: {e}")),
        }
        return;
    }

    let seq: String = plans.iter().map(|p| p.stimulus).collect();
    let flags: Vec<u8> = plans.iter().map(|p| u8::from(p.is_target)).collect();
    let lures: Vec<&str> = plans.iter().map(|p| p.lure_type.as_str()).collect();
    println!("n_back: {n_back} trials: {trials} seed: {seed}");
    println!("seq:        {seq}");
    println!("is_target:  {flags:?}");
    println!("lure_type:  {lures:?}");
    println!(
        "targets={} n-1={} n+1={} longest_run={}",
        summary.targets, summary.lures_n_minus_1, summary.lures_n_plus_1, summary.longest_identical_run
    );
}

fn audit(mut args: Vec<String>) {
    let json = take_switch(&mut args, "--json");
    let n_back: usize = match take_value(&mut args, "--n-back") {
        Some(v) => parse_or_exit(&v, "n-back"),
        None => make_error("audit needs --n-back <n>"),
    };
    let target_rate: f64 = take_value(&mut args, "--target-rate")
        .map(|v| parse_or_exit(&v, "target-rate"))
        .unwrap_or(nback::params::TARGET_RATE);
    let tolerance: usize = take_value(&mut args, "--tolerance")
        .map(|v| parse_or_exit(&v, "tolerance"))
        .unwrap_or(nback::params::TARGET_COUNT_TOLERANCE);
    let max_consec: usize = take_value(&mut args, "--max-consec-targets")
        .map(|v| parse_or_exit(&v, "max-consec-targets"))
        .unwrap_or(nback::params::MAX_CONSEC_TARGETS);

    let path = match args.first() {
        Some(p) => p.clone(),
        None => usage(),
    };
    let text = fs::read_to_string(&path)
        .unwrap_or_else(|e| make_error(&format!("read {path}: {e}")));
    let records: Vec<TrialRecord> = serde_json::from_str(&text)
        .unwrap_or_else(|e| make_error(&format!("parse {path}: {e}")));

    let stimuli: Vec<&str> = records.iter().map(|r| r.stimulus.as_str()).collect();
    let flags: Vec<bool> = records.iter().map(|r| r.is_target.get()).collect();
    let lures: Vec<LureType> = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.lure_type
                .parse()
                .unwrap_or_else(|e: String| make_error(&format!("row {i}: {e}")))
        })
        .collect();

    let verdict = audit_sequence(
        &stimuli,
        &flags,
        &lures,
        n_back,
        target_rate,
        tolerance,
        max_consec,
    );
    let longest_run = nback::validate::longest_identical_run(&stimuli).1;
    if !verdict.accepted() {
        warn!(path = %path, reason = %verdict.reason(), "audit rejected trial log");
    }

    if json {
        let out = AuditOutput {
            trials: records.len(),
            accepted: verdict.accepted(),
            reason: verdict.reason(),
            kind: verdict.rejection().map(|r| r.kind()),
            longest_identical_run: longest_run,
        };
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(e) => make_error(&format!("serialize: {e}")),
        }
    } else if verdict.accepted() {
        println!("ok: {} trials, longest identical run {}", records.len(), longest_run);
    } else {
        println!("rejected: {}", verdict.reason());
    }

    if !verdict.accepted() {
        process::exit(2);
    }
}

fn main() {
    // Logs go to stderr so `--json` output stays machine-readable.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }
    let cmd = args.remove(0);

    match cmd.as_str() {
        "preview" => preview(args),
        "audit" => audit(args),
        _ => usage(),
    }
}
