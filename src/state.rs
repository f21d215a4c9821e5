// Session configuration and the bounded round history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::aggregate::EvalPolicy;
use crate::outcome::{CardRank, Outcome};

#[derive(Debug, Clone)]
pub struct Config {
    pub capacity: usize,
    pub min_probability: f64,
    pub eval_policy: EvalPolicy,
    pub session_id: String,
    pub sqlite_path: Option<String>,
    pub newest_first: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 30,
            min_probability: 60.0,
            eval_policy: EvalPolicy::WeightedVote,
            session_id: "default".to_string(),
            sqlite_path: None,
            newest_first: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let capacity = std::env::var("HISTORY_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(d.capacity)
            .max(1);
        let min_probability = std::env::var("MIN_PROBABILITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(d.min_probability);
        let eval_policy = std::env::var("EVAL_POLICY")
            .ok()
            .and_then(|v| EvalPolicy::parse(&v))
            .unwrap_or(d.eval_policy);
        let session_id = std::env::var("SESSION_ID").unwrap_or(d.session_id);
        let sqlite_path = std::env::var("SQLITE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let newest_first = std::env::var("DISPLAY_NEWEST_FIRST")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(d.newest_first);
        Self {
            capacity,
            min_probability,
            eval_policy,
            session_id,
            sqlite_path,
            newest_first,
        }
    }
}

/// One entered round: the outcome and, in card-value variants, the winning rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardRank>,
}

impl Round {
    pub fn new(outcome: Outcome) -> Self {
        Self { outcome, card: None }
    }

    pub fn with_card(outcome: Outcome, card: CardRank) -> Self {
        Self { outcome, card: Some(card) }
    }
}

/// Bounded FIFO of rounds, oldest at the front.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    buf: VecDeque<Round>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, buf: VecDeque::with_capacity(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append at the recent end. Returns the evicted oldest round when full.
    pub fn push(&mut self, round: Round) -> Option<Round> {
        let evicted = if self.buf.len() >= self.capacity { self.buf.pop_front() } else { None };
        self.buf.push_back(round);
        evicted
    }

    /// Remove the most recent round. No-op on an empty history.
    pub fn undo(&mut self) -> Option<Round> {
        self.buf.pop_back()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn latest(&self) -> Option<&Round> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Round> {
        self.buf.iter()
    }

    /// Rounds in presentation order.
    pub fn display_order(&self, newest_first: bool) -> Vec<Round> {
        if newest_first {
            self.buf.iter().rev().copied().collect()
        } else {
            self.buf.iter().copied().collect()
        }
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::from_rounds(self.buf.iter().copied().collect())
    }
}

/// Immutable copy handed to detectors and the scorer. Oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    rounds: Vec<Round>,
    outcomes: Vec<Outcome>,
}

impl HistorySnapshot {
    pub fn from_rounds(rounds: Vec<Round>) -> Self {
        let outcomes = rounds.iter().map(|r| r.outcome).collect();
        Self { rounds, outcomes }
    }

    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        Self::from_rounds(outcomes.iter().map(|o| Round::new(*o)).collect())
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Symbol string, e.g. `RRBT`.
    pub fn symbols(&self) -> String {
        self.outcomes.iter().map(|o| o.symbol()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::*;

    fn filled(capacity: usize, outcomes: &[Outcome]) -> History {
        let mut h = History::new(capacity);
        for o in outcomes {
            h.push(Round::new(*o));
        }
        h
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("HISTORY_CAPACITY", "0");
        std::env::set_var("MIN_PROBABILITY", "75");
        std::env::set_var("EVAL_POLICY", "first_match");
        std::env::set_var("DISPLAY_NEWEST_FIRST", "yes");
        let cfg = Config::from_env();
        for key in ["HISTORY_CAPACITY", "MIN_PROBABILITY", "EVAL_POLICY", "DISPLAY_NEWEST_FIRST"] {
            std::env::remove_var(key);
        }
        assert_eq!(cfg.capacity, 1);
        assert_eq!(cfg.min_probability, 75.0);
        assert_eq!(cfg.eval_policy, EvalPolicy::FirstMatch);
        assert!(cfg.newest_first);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut h = filled(3, &[Red, Blue, Tie]);
        let evicted = h.push(Round::new(Blue));
        assert_eq!(evicted, Some(Round::new(Red)));
        assert_eq!(h.len(), 3);
        assert_eq!(h.snapshot().outcomes(), &[Blue, Tie, Blue]);
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut h = History::new(9);
        for i in 0..100 {
            let o = Outcome::ALL[i % 3];
            h.push(Round::new(o));
            assert!(h.len() <= 9);
        }
        assert_eq!(h.len(), 9);
    }

    #[test]
    fn test_undo_and_clear() {
        let mut h = filled(5, &[Red, Blue]);
        assert_eq!(h.undo(), Some(Round::new(Blue)));
        assert_eq!(h.undo(), Some(Round::new(Red)));
        assert_eq!(h.undo(), None);
        assert!(h.is_empty());

        let mut h = filled(5, &[Red, Red, Tie]);
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.capacity(), 5);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut h = History::new(0);
        h.push(Round::new(Red));
        h.push(Round::new(Blue));
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.snapshot().outcomes(), &[Blue]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut h = filled(5, &[Red, Blue]);
        let snap = h.snapshot();
        h.push(Round::new(Tie));
        assert_eq!(snap.outcomes(), &[Red, Blue]);
        assert_eq!(snap.symbols(), "RB");
    }

    #[test]
    fn test_display_order() {
        let h = filled(5, &[Red, Blue, Tie]);
        let newest: Vec<Outcome> = h.display_order(true).iter().map(|r| r.outcome).collect();
        assert_eq!(newest, vec![Tie, Blue, Red]);
        let oldest: Vec<Outcome> = h.display_order(false).iter().map(|r| r.outcome).collect();
        assert_eq!(oldest, vec![Red, Blue, Tie]);
    }

    #[test]
    fn test_config_default() {
        let cfg = Config::default();
        assert_eq!(cfg.capacity, 30);
        assert_eq!(cfg.eval_policy, EvalPolicy::WeightedVote);
        assert!(cfg.sqlite_path.is_none());
    }
}
