//! Vote aggregation: detections → score vector → distribution → recommendation.
//!
//! Percentages are kept in integer tenths so the three buckets always sum to
//! exactly 100.0. With no votes the distribution falls back to a uniform split.

use serde::{Deserialize, Serialize};

use crate::motifs::{detect_all, Detection, DetectorDef};
use crate::outcome::Outcome;
use crate::state::HistorySnapshot;

const TOTAL_TENTHS: i64 = 1000;

/// How detections are merged. One policy per engine, never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalPolicy {
    /// Every matched detection votes with its weight.
    WeightedVote,
    /// Only the first matched detection in table order (and rows sharing its label) votes.
    FirstMatch,
}

impl EvalPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vote" | "weighted" | "weighted_vote" => Some(EvalPolicy::WeightedVote),
            "first" | "first_match" => Some(EvalPolicy::FirstMatch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvalPolicy::WeightedVote => "weighted_vote",
            EvalPolicy::FirstMatch => "first_match",
        }
    }
}

/// Accumulated weight per outcome, indexed by [`Outcome::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreVector([f64; 3]);

impl ScoreVector {
    pub fn add(&mut self, outcome: Outcome, weight: f64) {
        if weight.is_finite() && weight > 0.0 {
            self.0[outcome.index()] += weight;
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        self.0[outcome.index()]
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn from_detections<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> Self {
        let mut sv = Self::default();
        for d in detections {
            if let (true, Some(o)) = (d.matched, d.suggestion) {
                sv.add(o, d.weight);
            }
        }
        sv
    }
}

/// Next-outcome distribution in tenths of a percent (sum = 1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution([i64; 3]);

impl Distribution {
    pub fn uniform() -> Self {
        Self::from_weights([1.0, 1.0, 1.0])
    }

    /// Normalize scores; a zero or non-finite total gives the uniform split.
    pub fn from_scores(scores: &ScoreVector) -> Self {
        let total = scores.total();
        if !(total.is_finite() && total > 0.0) {
            return Self::uniform();
        }
        Self::from_weights(scores.0)
    }

    fn from_weights(weights: [f64; 3]) -> Self {
        let total: f64 = weights.iter().sum();
        let mut tenths = [0i64; 3];
        for (slot, w) in tenths.iter_mut().zip(weights.iter()) {
            *slot = (w / total * TOTAL_TENTHS as f64).round() as i64;
        }
        // Rounding remainder goes to the largest bucket (first one on ties).
        let remainder = TOTAL_TENTHS - tenths.iter().sum::<i64>();
        let largest = argmax(&tenths);
        tenths[largest] += remainder;
        Self(tenths)
    }

    pub fn tenths(&self, outcome: Outcome) -> i64 {
        self.0[outcome.index()]
    }

    /// Probability in percent with one decimal.
    pub fn percent(&self, outcome: Outcome) -> f64 {
        self.0[outcome.index()] as f64 / 10.0
    }

    /// Outcome with the highest probability; ties resolve in Red, Blue, Tie order.
    pub fn top(&self) -> (Outcome, f64) {
        let i = argmax(&self.0);
        (Outcome::ALL[i], self.0[i] as f64 / 10.0)
    }

    pub fn as_percentages(&self) -> DistributionPct {
        DistributionPct {
            red: self.percent(Outcome::Red),
            blue: self.percent(Outcome::Blue),
            tie: self.percent(Outcome::Tie),
        }
    }
}

fn argmax(values: &[i64; 3]) -> usize {
    let mut best = 0;
    for i in 1..values.len() {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

/// Serializable percentage form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionPct {
    pub red: f64,
    pub blue: f64,
    pub tie: f64,
}

impl DistributionPct {
    pub fn sum(&self) -> f64 {
        self.red + self.blue + self.tie
    }
}

/// A single call, or `outcome: None` for "wait".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub outcome: Option<Outcome>,
    pub confidence_percent: f64,
}

impl Recommendation {
    pub fn wait(confidence_percent: f64) -> Self {
        Self { outcome: None, confidence_percent }
    }

    pub fn is_wait(&self) -> bool {
        self.outcome.is_none()
    }

    /// Top outcome when it clears `min_probability`, or when a forcing detector matched.
    pub fn decide(dist: &Distribution, detections: &[Detection], min_probability: f64) -> Self {
        let (top, pct) = dist.top();
        let forced = detections.iter().any(|d| d.matched && d.forces_call);
        let voted = detections.iter().any(|d| d.matched && d.suggestion.is_some());
        if voted && (pct >= min_probability || forced) {
            Self { outcome: Some(top), confidence_percent: pct.clamp(0.0, 100.0) }
        } else {
            Self::wait(pct.clamp(0.0, 100.0))
        }
    }
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Detections that voted, in table order.
    pub detections: Vec<Detection>,
    pub scores: ScoreVector,
    pub distribution: Distribution,
    pub recommendation: Recommendation,
}

impl Evaluation {
    /// Unique labels of the voting detections, first occurrence order.
    pub fn labels(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for d in &self.detections {
            if !out.contains(&d.label) {
                out.push(d.label.clone());
            }
        }
        out
    }
}

/// Run every detector in `table` over the snapshot and merge the votes.
pub fn evaluate(
    snapshot: &HistorySnapshot,
    table: &[DetectorDef],
    policy: EvalPolicy,
    min_probability: f64,
) -> Evaluation {
    let all = detect_all(snapshot, table);
    let detections = select(all, policy);
    let scores = ScoreVector::from_detections(&detections);
    let distribution = Distribution::from_scores(&scores);
    let recommendation = Recommendation::decide(&distribution, &detections, min_probability);
    Evaluation { detections, scores, distribution, recommendation }
}

fn select(all: Vec<Detection>, policy: EvalPolicy) -> Vec<Detection> {
    let matched = all.into_iter().filter(|d| d.matched);
    match policy {
        EvalPolicy::WeightedVote => matched.collect(),
        EvalPolicy::FirstMatch => {
            let matched: Vec<Detection> = matched.collect();
            let Some(first) = matched.iter().find(|d| d.suggestion.is_some()) else {
                return Vec::new();
            };
            let label = first.label.clone();
            matched.into_iter().filter(|d| d.label == label).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motifs::DETECTOR_TABLE;
    use Outcome::*;

    fn run(h: &[Outcome], policy: EvalPolicy) -> Evaluation {
        evaluate(&HistorySnapshot::from_outcomes(h), DETECTOR_TABLE, policy, 60.0)
    }

    #[test]
    fn test_uniform_fallback_sums_to_100() {
        let d = Distribution::uniform();
        assert_eq!(d.tenths(Red) + d.tenths(Blue) + d.tenths(Tie), 1000);
        assert_eq!(d.percent(Red), 33.4);
        assert_eq!(d.percent(Blue), 33.3);
        assert_eq!(d.percent(Tie), 33.3);
    }

    #[test]
    fn test_zero_scores_fall_back() {
        let d = Distribution::from_scores(&ScoreVector::default());
        assert_eq!(d, Distribution::uniform());
    }

    #[test]
    fn test_normalization_reconciles_rounding() {
        let mut sv = ScoreVector::default();
        sv.add(Red, 1.0);
        sv.add(Blue, 1.0);
        sv.add(Tie, 1.0);
        sv.add(Red, 0.001);
        let d = Distribution::from_scores(&sv);
        assert_eq!(d.tenths(Red) + d.tenths(Blue) + d.tenths(Tie), 1000);
        assert_eq!(d.top().0, Red);
    }

    #[test]
    fn test_score_vector_ignores_bad_weights() {
        let mut sv = ScoreVector::default();
        sv.add(Red, f64::NAN);
        sv.add(Blue, -1.0);
        sv.add(Tie, f64::INFINITY);
        assert_eq!(sv.total(), 0.0);
    }

    #[test]
    fn test_empty_history_waits() {
        let e = run(&[], EvalPolicy::WeightedVote);
        assert!(e.detections.is_empty());
        assert!(e.recommendation.is_wait());
        assert_eq!(e.distribution, Distribution::uniform());
    }

    #[test]
    fn test_streak_of_three_calls_opposite() {
        let e = run(&[Red, Red, Red], EvalPolicy::WeightedVote);
        assert_eq!(e.recommendation.outcome, Some(Blue));
        assert!(e.recommendation.confidence_percent >= 60.0);
        assert!(e.labels().contains(&"red streak x3".to_string()));
    }

    #[test]
    fn test_alternation_continues() {
        let e = run(&[Red, Blue, Red, Blue], EvalPolicy::WeightedVote);
        assert_eq!(e.recommendation.outcome, Some(Red));
        assert!(e.labels().iter().any(|l| l.starts_with("alternation")));
    }

    #[test]
    fn test_tie_reset_balanced() {
        let e = run(&[Red, Blue, Tie], EvalPolicy::WeightedVote);
        let pct = e.distribution.as_percentages();
        assert!((pct.red - pct.blue).abs() <= 5.0);
        assert!(pct.tie < 10.0);
        assert!((pct.sum() - 100.0).abs() <= 0.1);
        assert!(e.recommendation.is_wait());
        assert_eq!(e.labels(), vec!["tie reset".to_string()]);
    }

    #[test]
    fn test_first_match_keeps_one_label() {
        // Long streak plus a cluster would both vote under weighted mode.
        let h = [Blue, Red, Blue, Blue, Blue, Blue, Blue];
        let vote = run(&h, EvalPolicy::WeightedVote);
        let first = run(&h, EvalPolicy::FirstMatch);
        assert!(vote.labels().len() >= 1);
        assert_eq!(first.labels(), vec!["blue streak x5".to_string()]);
        assert_eq!(first.recommendation.outcome, Some(Red));
    }

    #[test]
    fn test_first_match_keeps_split_rows() {
        let e = run(&[Red, Blue, Tie], EvalPolicy::FirstMatch);
        assert_eq!(e.detections.len(), 3);
        assert_eq!(e.distribution.percent(Red), 47.5);
        assert_eq!(e.distribution.percent(Blue), 47.5);
        assert_eq!(e.distribution.percent(Tie), 5.0);
    }

    #[test]
    fn test_forcing_detector_overrides_threshold() {
        let h = [Red, Red, Red, Red, Red];
        let e = evaluate(&HistorySnapshot::from_outcomes(&h), DETECTOR_TABLE, EvalPolicy::WeightedVote, 101.0);
        assert_eq!(e.recommendation.outcome, Some(Blue));
    }

    #[test]
    fn test_below_threshold_waits() {
        let h = [Red, Red, Red];
        let e = evaluate(&HistorySnapshot::from_outcomes(&h), DETECTOR_TABLE, EvalPolicy::WeightedVote, 101.0);
        assert!(e.recommendation.is_wait());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(EvalPolicy::parse("vote"), Some(EvalPolicy::WeightedVote));
        assert_eq!(EvalPolicy::parse("FIRST_MATCH"), Some(EvalPolicy::FirstMatch));
        assert_eq!(EvalPolicy::parse("random"), None);
    }
}
