use std::io::{self, BufRead, Write};

use anyhow::Result;
use chrono::Utc;
use studiofx::engine::Engine;
use studiofx::logging::{log, log_session_summary, obj, v_str, Domain, Level};
use studiofx::state::Config;
use studiofx::storage::SessionStore;

fn now_ts() -> u64 {
    Utc::now().timestamp() as u64
}

enum Command {
    Undo,
    Clear,
    Show,
    Quit,
    Entry(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(match trimmed.to_lowercase().as_str() {
        "undo" | "u" => Command::Undo,
        "clear" | "reset" => Command::Clear,
        "show" | "s" => Command::Show,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Entry(trimmed.to_string()),
    })
}

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let mut store = match &cfg.sqlite_path {
        Some(path) => {
            let mut s = SessionStore::new(path)?;
            s.init()?;
            Some(s)
        }
        None => None,
    };

    let mut engine = match store.as_ref() {
        Some(s) => Engine::restore(cfg.clone(), s.load_rounds(&cfg.session_id)?),
        None => Engine::new(cfg.clone()),
    };

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("session_id", v_str(&cfg.session_id)),
            ("capacity", serde_json::json!(cfg.capacity)),
            ("eval_policy", v_str(cfg.eval_policy.as_str())),
            ("persistent", serde_json::json!(store.is_some())),
        ]),
    );

    let (mut entered, mut undos, mut clears, mut rejected) = (0u64, 0u64, 0u64, 0u64);
    let stdin = io::stdin();
    let mut out = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let Some(cmd) = parse_command(&line) else {
            continue;
        };
        let edited = match cmd {
            Command::Quit => break,
            Command::Show => false,
            Command::Undo => {
                undos += 1;
                engine.undo_last().is_some()
            }
            Command::Clear => {
                clears += 1;
                engine.clear_history();
                true
            }
            Command::Entry(text) => match engine.append_symbol(&text) {
                Ok(_) => {
                    entered += 1;
                    true
                }
                Err(err) => {
                    rejected += 1;
                    writeln!(out, "{}", serde_json::json!({ "error": err.to_string() }))?;
                    continue;
                }
            },
        };

        let record = engine.analysis();
        if let Some(s) = store.as_mut() {
            if edited {
                s.save_history(&cfg.session_id, engine.history())?;
            }
            s.record_analysis(now_ts(), &cfg.session_id, &record)?;
        }
        let rounds = engine.history().display_order(cfg.newest_first);
        let history: String = rounds.iter().map(|r| r.outcome.symbol()).collect();
        writeln!(out, "{}", serde_json::json!({ "history": history, "analysis": record }))?;
        out.flush()?;
    }

    log_session_summary(&cfg.session_id, entered, undos, clears, rejected);
    Ok(())
}
