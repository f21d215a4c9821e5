use std::io::{self, BufRead};

use studiofx::engine::Engine;
use studiofx::state::Config;

// Reads entries from stdin (one per line or whitespace separated) and prints
// one JSON line per step: the step index, the entry, the history and the record.
fn main() {
    let stdin = io::stdin();
    let mut engine = Engine::new(Config::from_env());
    let mut step = 0u64;
    let mut bad = 0u64;

    for line in stdin.lock().lines().flatten() {
        for token in line.split_whitespace() {
            if token.starts_with('#') {
                break;
            }
            let round = match engine.append_symbol(token) {
                Ok(r) => r,
                Err(err) => {
                    eprintln!("bad entry {:?}: {}", token, err);
                    bad += 1;
                    continue;
                }
            };
            step += 1;
            let history: Vec<_> = engine.history().iter().copied().collect();
            let record = engine.analysis();
            println!(
                "{}",
                serde_json::json!({
                    "step": step,
                    "entry": round,
                    "history": history,
                    "analysis": record,
                })
            );
        }
    }

    eprintln!("steps={} rejected={}", step, bad);
}
