use std::env;
use std::process;

use rand::{rngs::StdRng, Rng, SeedableRng};
use studiofx::engine::Engine;
use studiofx::outcome::{CardRank, Outcome};
use studiofx::record::ResultRecord;
use studiofx::state::{Config, Round};

fn check(record: &ResultRecord, capacity: usize, len: usize) -> Vec<String> {
    let mut violations = Vec::new();
    let sum = record.distribution.red + record.distribution.blue + record.distribution.tie;
    if (sum - 100.0).abs() > 0.1 {
        violations.push(format!("distribution sums to {}", sum));
    }
    for p in [record.distribution.red, record.distribution.blue, record.distribution.tie] {
        if !p.is_finite() || p < 0.0 {
            violations.push(format!("bad probability {}", p));
        }
    }
    let conf = record.recommendation.confidence_percent;
    if !(0.0..=100.0).contains(&conf) {
        violations.push(format!("confidence {} out of range", conf));
    }
    if ![1, 3, 5, 7, 9].contains(&record.manipulation_level) {
        violations.push(format!("level {} not a band", record.manipulation_level));
    }
    if len > capacity {
        violations.push(format!("history {} > capacity {}", len, capacity));
    }
    violations
}

fn main() {
    let seed = env::var("SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(42u64);
    let rounds = env::var("ROUNDS").ok().and_then(|v| v.parse().ok()).unwrap_or(2_000usize);
    let cfg = Config::from_env();
    let capacity = cfg.capacity;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut engine = Engine::new(cfg);

    let mut violations = Vec::new();
    let mut calls = 0u64;
    let mut waits = 0u64;

    for step in 0..rounds {
        let roll: f64 = rng.gen();
        if roll < 0.03 {
            engine.undo_last();
        } else if roll < 0.04 {
            engine.clear_history();
        } else {
            // Ties are rarer than colors at a real table.
            let outcome = match rng.gen_range(0..20) {
                0..=8 => Outcome::Red,
                9..=17 => Outcome::Blue,
                _ => Outcome::Tie,
            };
            let with_card = rng.gen_bool(0.5);
            let round = match CardRank::new(rng.gen_range(1..=13)) {
                Ok(rank) if with_card => Round::with_card(outcome, rank),
                _ => Round::new(outcome),
            };
            engine.append_round(round);
        }

        let record = engine.analysis();
        if record != engine.analysis() {
            violations.push(format!("step {}: analysis not idempotent", step));
        }
        for v in check(&record, capacity, engine.history().len()) {
            violations.push(format!("step {}: {}", step, v));
        }
        if record.recommendation.outcome.is_some() {
            calls += 1;
        } else {
            waits += 1;
        }
    }

    println!(
        "{}",
        serde_json::json!({
            "seed": seed,
            "rounds": rounds,
            "calls": calls,
            "waits": waits,
            "violations": violations.len(),
        })
    );
    for v in violations.iter().take(20) {
        eprintln!("{}", v);
    }
    if !violations.is_empty() {
        process::exit(1);
    }
}
