//! Plan an N-back session and print it.
//!
//! Usage:
//!   nback-task --participant p01 --version A --blocks-per-load 3 --seed 7
//!   nback-task --version B --trials 40 --no-practice --json
//!   nback-task --markers

use nback_task::{plan_marker_code, plan_session, LoadOrder, SessionConfig, TriggerTable};
use std::process;
use tracing::info;

fn usage() -> ! {
    eprintln!("Usage: nback-task [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --participant <id>          Participant id recorded in the plan");
    eprintln!("  --version <A|B>             Load order: A = 1 then 3, B = 3 then 1 (default A)");
    eprintln!("  --blocks-per-load <n>       Blocks per load (default 3)");
    eprintln!("  --trials <n>                Trials per block (default 60, 0 skips the main task)");
    eprintln!("  --practice-trials <n>       Practice length (default 30)");
    eprintln!("  --no-practice               Skip practice");
    eprintln!("  --target-rate <0-1>         Main-task target rate (default 0.30)");
    eprintln!("  --lure-nminus1 <0-1>        n-1 lure rate (default 0.05)");
    eprintln!("  --lure-nplus1 <0-1>         n+1 lure rate (default 0.05)");
    eprintln!("  --max-consec-targets <n>    Max consecutive targets (default 1)");
    eprintln!("  --soa-ms <ms>               Stimulus onset asynchrony (default 2500)");
    eprintln!("  --seed <n>                  Session seed (default $NBACK_SEED, then clock)");
    eprintln!("  --json                      Print the plan as JSON");
    eprintln!("  --markers                   Print the trigger table and exit");
    process::exit(1);
}

fn make_error(msg: &str) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}

fn take_value(args: &mut Vec<String>, name: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == name)?;
    if pos + 1 >= args.len() {
        make_error(&format!("{name} needs a value"));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

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

fn build_config(mut args: Vec<String>) -> (SessionConfig, bool) {
    if args
        .iter()
        .any(|a| a.starts_with("--n-back") || a == "--blocks" || a.starts_with("--blocks="))
    {
        make_error(
            "--n-back and --blocks are no longer supported; use --version {A|B} and \
             --blocks-per-load, e.g. --version A --blocks-per-load 3",
        );
    }

    let json = take_switch(&mut args, "--json");
    let mut cfg = SessionConfig::default();

    if let Some(v) = take_value(&mut args, "--participant") {
        cfg = cfg.with_participant(v);
    }
    if let Some(v) = take_value(&mut args, "--version") {
        let version: LoadOrder = v.parse().unwrap_or_else(|e| make_error(&format!("{e}")));
        cfg = cfg.with_version(version);
    }
    if let Some(v) = take_value(&mut args, "--blocks-per-load") {
        cfg = cfg.with_blocks_per_load(parse_or_exit(&v, "blocks-per-load"));
    }
    if let Some(v) = take_value(&mut args, "--trials") {
        cfg = cfg.with_trials_per_block(parse_or_exit(&v, "trials"));
    }
    let practice_trials = take_value(&mut args, "--practice-trials")
        .map(|v| parse_or_exit(&v, "practice-trials"))
        .unwrap_or(cfg.practice_trials);
    let no_practice = take_switch(&mut args, "--no-practice");
    cfg = cfg.with_practice(!no_practice, practice_trials);

    let mut opts = cfg.sequence.clone();
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
    cfg = cfg.with_sequence_options(opts);

    if let Some(v) = take_value(&mut args, "--soa-ms") {
        let stim = cfg.stim_dur_ms;
        cfg = cfg.with_timing(parse_or_exit(&v, "soa-ms"), stim);
    }

    let seed = match take_value(&mut args, "--seed") {
        Some(v) => Some(parse_or_exit(&v, "seed")),
        None => std::env::var("NBACK_SEED")
            .ok()
            .map(|v| parse_or_exit(&v, "NBACK_SEED")),
    };
    if let Some(seed) = seed {
        cfg = cfg.with_seed(seed);
    }

    if let Some(extra) = args.first() {
        make_error(&format!("unexpected argument '{extra}'"));
    }
    (cfg, json)
}

fn print_markers() {
    let table = TriggerTable::new();
    for (name, code) in table.iter() {
        println!("{code:>3}  {name}");
    }
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if take_switch(&mut args, "--help") || take_switch(&mut args, "-h") {
        usage();
    }
    if take_switch(&mut args, "--markers") {
        print_markers();
        return;
    }

    let (cfg, json) = build_config(args);
    let plan = match plan_session(&cfg) {
        Ok(p) => p,
        Err(e) => make_error(&format!("Error: {e}")),
    };
    info!(seed = plan.seed, trials = plan.total_trials(), "plan ready");

    if json {
        match serde_json::to_string_pretty(&plan) {
            Ok(s) => println!("{s}"),
            Err(e) => make_error(&format!("serialize: {e}")),
        }
        return;
    }

    println!(
        "participant: {} version: {} loads: {:?} seed: {} soa: {} ms iti: {} ms",
        plan.participant, plan.version, plan.load_order, plan.seed, plan.soa_ms, plan.fixed_iti_ms
    );
    for block in plan.practice.iter().chain(&plan.blocks) {
        let s = block.summary();
        let seq: String = block.trials.iter().map(|t| t.stimulus).collect();
        let codes: Vec<u8> = block.trials.iter().map(plan_marker_code).collect();
        println!(
            "block {:>2} {:?} {}-back: targets={} n-1={} n+1={} longest_run={}",
            block.block_idx,
            block.phase,
            block.n_back,
            s.targets,
            s.lures_n_minus_1,
            s.lures_n_plus_1,
            s.longest_identical_run
        );
        println!("  seq:     {seq}");
        println!("  markers: {codes:?}");
    }
}
