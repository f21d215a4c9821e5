//! Result record handed to the presentation layer after every edit.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aggregate::{DistributionPct, Evaluation, Recommendation};
use crate::manipulation::AlertTier;
use crate::state::HistorySnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub pattern_labels: Vec<String>,
    pub distribution: DistributionPct,
    pub manipulation_level: u8,
    pub recommendation: Recommendation,
    pub alert_tier: AlertTier,
    pub advice: String,
    pub history_len: usize,
    pub history_fingerprint: String,
}

/// Hex SHA-256 of the history, one symbol per round followed by its card rank when known
/// (`"RB7T"`). Color-only histories hash their plain symbol string.
pub fn fingerprint(snapshot: &HistorySnapshot) -> String {
    let mut hasher = Sha256::new();
    for r in snapshot.rounds() {
        let mut buf = [0u8; 4];
        hasher.update(r.outcome.symbol().encode_utf8(&mut buf).as_bytes());
        if let Some(card) = r.card {
            hasher.update(card.value().to_string().as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// One-line human advice for the record.
pub fn advice(snapshot: &HistorySnapshot, labels: &[String], rec: &Recommendation) -> String {
    if snapshot.is_empty() {
        return "Waiting for entries...".to_string();
    }
    let lead = match labels.first() {
        Some(l) if l.contains("streak x") => format!("Possible break of the {}", l),
        Some(l) if l.starts_with("alternation") => "Alternation detected".to_string(),
        Some(l) if l == "tie reset" => "Reset detected, play red or blue".to_string(),
        Some(l) => format!("Pattern: {}", l),
        None => "Balanced game, no clear manipulation".to_string(),
    };
    match rec.outcome {
        Some(o) => format!("{}. Suggestion: {} ({:.1}%)", lead, o, rec.confidence_percent),
        None => format!("{}. Suggestion: wait", lead),
    }
}

/// Assemble the record from an evaluation and a manipulation level.
pub fn build(snapshot: &HistorySnapshot, eval: &Evaluation, level: u8) -> ResultRecord {
    let pattern_labels = eval.labels();
    let advice = advice(snapshot, &pattern_labels, &eval.recommendation);
    ResultRecord {
        distribution: eval.distribution.as_percentages(),
        manipulation_level: level,
        recommendation: eval.recommendation,
        alert_tier: AlertTier::from_level(level),
        advice,
        history_len: snapshot.len(),
        history_fingerprint: fingerprint(snapshot),
        pattern_labels,
    }
}
