//! Analysis session: owns one history and answers `analysis()` after each edit.
//!
//! ```text
//! append / undo / clear ──► History ──snapshot──► detectors ──► aggregate ─┐
//!                                       │                                  ├─► ResultRecord
//!                                       └──────► manipulation scorer ──────┘
//! ```
//!
//! There is no global state: every session is an `Engine` value.

use anyhow::Result;

use crate::aggregate::{evaluate, Evaluation};
use crate::logging::{
    self, log_audit, log_detection, log_history_edit, log_level, log_recommendation, log_round, v_num,
    ProfileScope,
};
use crate::manipulation::{AlertTier, ManipulationStats};
use crate::motifs::{DetectorDef, DETECTOR_TABLE};
use crate::outcome::{parse_entry, CardRank, Outcome};
use crate::record::{self, ResultRecord};
use crate::state::{Config, History, HistorySnapshot, Round};

pub struct Engine {
    cfg: Config,
    history: History,
    table: &'static [DetectorDef],
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        Self::with_table(cfg, DETECTOR_TABLE)
    }

    pub fn with_table(cfg: Config, table: &'static [DetectorDef]) -> Self {
        let history = History::new(cfg.capacity);
        Self { cfg, history, table }
    }

    /// Start from previously stored rounds (oldest first). Overflow is evicted FIFO.
    pub fn restore(cfg: Config, rounds: impl IntoIterator<Item = Round>) -> Self {
        let mut engine = Self::new(cfg);
        for r in rounds {
            engine.history.push(r);
        }
        log_history_edit(&engine.cfg.session_id, "restore", engine.history.len());
        engine
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn append_outcome(&mut self, outcome: Outcome) {
        self.append_round(Round::new(outcome));
    }

    pub fn append_round(&mut self, round: Round) {
        let evicted = self.history.push(round).is_some();
        let card = round.card.map(|c| c.to_string());
        log_round(&self.cfg.session_id, round.outcome.as_str(), card.as_deref(), self.history.len(), evicted);
    }

    /// Parse an operator entry (`r`, `blue`, `🟡`, `b7`, ...) and append it.
    /// Unknown symbols are rejected and leave the history untouched.
    pub fn append_symbol(&mut self, input: &str) -> Result<Round> {
        let (outcome, card): (Outcome, Option<CardRank>) = parse_entry(input).map_err(|err| {
            logging::log_rejected_entry(&self.cfg.session_id, input, &err.to_string());
            err
        })?;
        let round = Round { outcome, card };
        self.append_round(round);
        Ok(round)
    }

    pub fn undo_last(&mut self) -> Option<Round> {
        let removed = self.history.undo();
        if removed.is_some() {
            log_history_edit(&self.cfg.session_id, "undo", self.history.len());
        }
        removed
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        log_history_edit(&self.cfg.session_id, "clear", 0);
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    /// Run detectors and aggregation on the current history.
    pub fn evaluate(&self) -> Evaluation {
        self.evaluate_snapshot(&self.snapshot())
    }

    fn evaluate_snapshot(&self, snapshot: &HistorySnapshot) -> Evaluation {
        evaluate(snapshot, self.table, self.cfg.eval_policy, self.cfg.min_probability)
    }

    /// Full analysis of the current history. Reads only; repeated calls give equal records.
    pub fn analysis(&self) -> ResultRecord {
        let _scope = ProfileScope::with_context(
            "analysis",
            &[("history_len", v_num(self.history.len() as f64))],
        );
        let snapshot = self.snapshot();
        let eval = self.evaluate_snapshot(&snapshot);
        let stats = ManipulationStats::from_snapshot(&snapshot);
        let level = stats.level();
        let rec = record::build(&snapshot, &eval, level);

        for d in &eval.detections {
            log_detection(&d.label, d.suggestion.map(|o| o.as_str()), d.weight);
        }
        let dist = &eval.distribution;
        log_recommendation(
            &self.cfg.session_id,
            rec.recommendation.outcome.map(|o| o.as_str()),
            rec.recommendation.confidence_percent,
            &Outcome::ALL.map(|o| (o.as_str(), dist.percent(o))),
            &rec.history_fingerprint,
        );
        log_level(&self.cfg.session_id, level, AlertTier::from_level(level).as_str(), stats.raw_score());
        if let Ok(body) = serde_json::to_string(&rec) {
            log_audit("analysis", &rec.history_fingerprint, &logging::record_hash(&body));
        }
        rec
    }
}
