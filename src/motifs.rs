//! Motif detectors: structural regularities in the recent outcome sequence.
//!
//! Each detector is a pure function: snapshot → Detection. The set of
//! detectors, their weights and their priority order live in one table,
//! [`DETECTOR_TABLE`], so adding or removing a motif is a one-line change.
//!
//! Weight classes (higher = more important):
//!
//! | class                     | weight |
//! |---------------------------|--------|
//! | long streak (5+)          | 5.0    |
//! | streak (3-4)              | 3.5    |
//! | alternation x2 / x1       | 3.0 / 2.8 |
//! | repeated block 4 / 3 / 2  | 2.5 / 2.0 / 1.5 |
//! | cycle / inverted cycle    | 2.0 / 1.5 |
//! | tie reset (per color)     | 1.9 (tie share 0.2) |
//! | mirror, tie follow, twin tie streaks | 1.5 |
//! | cluster                   | 1.2    |
//! | pair streak (exactly 2)   | 1.0    |
//! | imbalance                 | 1.0    |
//!
//! Streak bands are disjoint, so one run never scores under two lengths.

use serde::Serialize;

use crate::features::{color_counts, color_streak, dominant_color, last_color, runs, tail};
use crate::outcome::Outcome;
use crate::state::HistorySnapshot;

/// Output of one detector for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub matched: bool,
    pub label: String,
    pub suggestion: Option<Outcome>,
    pub weight: f64,
    /// A matched detector that lifts the minimum-probability gate.
    pub forces_call: bool,
}

impl Detection {
    pub fn miss(label: impl Into<String>) -> Self {
        Self { matched: false, label: label.into(), suggestion: None, weight: 0.0, forces_call: false }
    }

    pub fn hit(label: impl Into<String>, suggestion: Option<Outcome>, weight: f64, forces_call: bool) -> Self {
        Self { matched: true, label: label.into(), suggestion, weight, forces_call }
    }
}

pub const IMBALANCE_MIN_WINDOW: usize = 10;

/// A structural motif and its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motif {
    /// Trailing color run with length in `min..=max` (unbounded when `max` is None).
    Streak { min: usize, max: Option<usize> },
    /// `block` reds then `block` blues (or the reverse), repeated twice.
    Alternation { block: usize },
    /// The last `2 * block` outcomes are the same non-constant block twice.
    RepeatedBlock { block: usize },
    /// Even-length tail of at least `min_len` reading the same backwards, ties skipped.
    Mirror { min_len: usize },
    /// Same as a repeated block but over colors only; inverted compares against the reverse.
    Cycle { size: usize, inverted: bool },
    /// Tie immediately followed by a color.
    TieFollow,
    /// Two color runs of 2+ sitting next to a tie within `window`.
    TwinStreaks { window: usize },
    /// Tie right after a color, breaking whatever run it ended; each row carries one share of the split.
    TieReset { lean: Outcome },
    /// One color holds more than `threshold` of the colors in the last `window`.
    Imbalance { window: usize, threshold: f64 },
    /// At least `min_count` of the last `window` are one color, short of a full streak.
    Cluster { window: usize, min_count: usize },
}

impl Motif {
    /// Shortest history on which this motif can match.
    pub fn min_len(&self) -> usize {
        match *self {
            Motif::Streak { min, .. } => min.max(1),
            Motif::Alternation { block } => 4 * block.max(1),
            Motif::RepeatedBlock { block } => 2 * block.max(1),
            Motif::Mirror { min_len } => min_len.max(6),
            Motif::Cycle { size, .. } => 2 * size.max(1),
            Motif::TieFollow => 2,
            Motif::TwinStreaks { .. } => 5,
            Motif::TieReset { .. } => 2,
            Motif::Imbalance { .. } => IMBALANCE_MIN_WINDOW,
            Motif::Cluster { window, .. } => window.max(1),
        }
    }

    /// Generic name, used for misses.
    pub fn name(&self) -> String {
        match *self {
            Motif::Streak { min, max: Some(max) } if min == max => format!("streak {}", min),
            Motif::Streak { min, max: Some(max) } => format!("streak {}-{}", min, max),
            Motif::Streak { min, max: None } => format!("streak {}+", min),
            Motif::Alternation { block } => format!("alternation x{}", block),
            Motif::RepeatedBlock { block } => format!("repeated block {}", block),
            Motif::Mirror { .. } => "mirror".to_string(),
            Motif::Cycle { size, inverted: false } => format!("cycle {}", size),
            Motif::Cycle { size, inverted: true } => format!("inverted cycle {}", size),
            Motif::TieFollow => "tie follow".to_string(),
            Motif::TwinStreaks { .. } => "twin tie streaks".to_string(),
            Motif::TieReset { .. } => "tie reset".to_string(),
            Motif::Imbalance { .. } => "imbalance".to_string(),
            Motif::Cluster { .. } => "cluster".to_string(),
        }
    }

    /// Returns `Some((label, suggestion))` on a match.
    pub fn check(&self, h: &[Outcome]) -> Option<(String, Option<Outcome>)> {
        if h.len() < self.min_len() {
            return None;
        }
        match *self {
            Motif::Streak { min, max } => streak(h, min, max),
            Motif::Alternation { block } => alternation(h, block),
            Motif::RepeatedBlock { block } => repeated_block(h, block),
            Motif::Mirror { min_len } => mirror(h, min_len.max(6)),
            Motif::Cycle { size, inverted } => cycle(h, size, inverted),
            Motif::TieFollow => tie_follow(h),
            Motif::TwinStreaks { window } => twin_streaks(h, window),
            Motif::TieReset { lean } => tie_reset(h, lean),
            Motif::Imbalance { window, threshold } => imbalance(h, window, threshold),
            Motif::Cluster { window, min_count } => cluster(h, window, min_count),
        }
    }
}

/// One row of the detector table.
#[derive(Debug, Clone, Copy)]
pub struct DetectorDef {
    pub motif: Motif,
    pub weight: f64,
    pub forces_call: bool,
}

impl DetectorDef {
    pub const fn new(motif: Motif, weight: f64) -> Self {
        Self { motif, weight, forces_call: false }
    }

    pub const fn forcing(motif: Motif, weight: f64) -> Self {
        Self { motif, weight, forces_call: true }
    }

    pub fn detect(&self, snapshot: &HistorySnapshot) -> Detection {
        match self.motif.check(snapshot.outcomes()) {
            Some((label, suggestion)) => Detection::hit(label, suggestion, self.weight, self.forces_call),
            None => Detection::miss(self.motif.name()),
        }
    }
}

/// Detectors in priority order (first-match evaluation walks this order).
pub const DETECTOR_TABLE: &[DetectorDef] = &[
    DetectorDef::forcing(Motif::Streak { min: 5, max: None }, 5.0),
    DetectorDef::new(Motif::Streak { min: 3, max: Some(4) }, 3.5),
    DetectorDef::new(Motif::Alternation { block: 2 }, 3.0),
    DetectorDef::new(Motif::Alternation { block: 1 }, 2.8),
    DetectorDef::new(Motif::TieReset { lean: Outcome::Red }, 1.9),
    DetectorDef::new(Motif::TieReset { lean: Outcome::Blue }, 1.9),
    DetectorDef::new(Motif::TieReset { lean: Outcome::Tie }, 0.2),
    DetectorDef::new(Motif::RepeatedBlock { block: 4 }, 2.5),
    DetectorDef::new(Motif::RepeatedBlock { block: 3 }, 2.0),
    DetectorDef::new(Motif::RepeatedBlock { block: 2 }, 1.5),
    DetectorDef::new(Motif::Cycle { size: 3, inverted: false }, 2.0),
    DetectorDef::new(Motif::Cycle { size: 3, inverted: true }, 1.5),
    DetectorDef::new(Motif::Mirror { min_len: 6 }, 1.5),
    DetectorDef::new(Motif::TieFollow, 1.5),
    DetectorDef::new(Motif::TwinStreaks { window: 10 }, 1.5),
    DetectorDef::new(Motif::Cluster { window: 5, min_count: 4 }, 1.2),
    DetectorDef::new(Motif::Imbalance { window: 20, threshold: 0.7 }, 1.0),
    DetectorDef::new(Motif::Streak { min: 2, max: Some(2) }, 1.0),
];

/// Run every detector in `table` order. Misses are included.
pub fn detect_all(snapshot: &HistorySnapshot, table: &[DetectorDef]) -> Vec<Detection> {
    table.iter().map(|def| def.detect(snapshot)).collect()
}

fn symbols(block: &[Outcome]) -> String {
    block.iter().map(|o| o.symbol()).collect()
}

fn is_constant(block: &[Outcome]) -> bool {
    block.windows(2).all(|w| w[0] == w[1])
}

/// True when `block` is `c1^k c2^k` repeated, with two different colors.
fn is_alternating_block(block: &[Outcome]) -> bool {
    let n = block.len();
    (1..=n / 2).filter(|k| n % (2 * k) == 0).any(|k| {
        let (c1, c2) = (block[0], block[k]);
        c1.is_color() && c2.is_color() && c1 != c2
            && block.iter().enumerate().all(|(i, o)| *o == if (i / k) % 2 == 0 { c1 } else { c2 })
    })
}

fn streak(h: &[Outcome], min: usize, max: Option<usize>) -> Option<(String, Option<Outcome>)> {
    let (color, len) = color_streak(h)?;
    if len < min || max.map_or(false, |m| len > m) {
        return None;
    }
    Some((format!("{} streak x{}", color, len), color.opposite()))
}

fn alternation(h: &[Outcome], block: usize) -> Option<(String, Option<Outcome>)> {
    let w = tail(h, 4 * block);
    let (unit, repeat) = w.split_at(2 * block);
    let (c1, c2) = (unit[0], unit[block]);
    if unit != repeat || !c1.is_color() || !c2.is_color() || c1 == c2 {
        return None;
    }
    if !unit[..block].iter().all(|o| *o == c1) || !unit[block..].iter().all(|o| *o == c2) {
        return None;
    }
    // The window ends on a completed unit, so the next outcome restarts it.
    Some((format!("alternation x{}", block), Some(unit[0])))
}

fn repeated_block(h: &[Outcome], block: usize) -> Option<(String, Option<Outcome>)> {
    let w = tail(h, 2 * block);
    let (first, second) = w.split_at(block);
    if first != second || is_constant(first) || is_alternating_block(first) {
        return None;
    }
    Some((format!("repeated block {}", symbols(first)), Some(first[0])))
}

fn is_mirror(w: &[Outcome]) -> bool {
    if w.len() < 2 {
        return false;
    }
    let (mut i, mut j) = (0, w.len() - 1);
    let mut pairs = 0;
    while i < j {
        if w[i] == Outcome::Tie {
            i += 1;
            continue;
        }
        if w[j] == Outcome::Tie {
            j -= 1;
            continue;
        }
        if w[i] != w[j] {
            return false;
        }
        pairs += 1;
        i += 1;
        j -= 1;
    }
    pairs >= 2
}

fn mirror(h: &[Outcome], min_len: usize) -> Option<(String, Option<Outcome>)> {
    let longest = h.len() - h.len() % 2;
    let len = (min_len..=longest)
        .rev()
        .filter(|l| l % 2 == 0)
        .find(|&l| {
            let w = tail(h, l);
            let (red, blue) = color_counts(w);
            red > 0 && blue > 0 && is_mirror(w)
        })?;
    // Extending the mirror by one pair needs the outcome just before the tail.
    let suggestion = h
        .len()
        .checked_sub(len + 1)
        .map(|i| h[i])
        .filter(|o| o.is_color());
    Some((format!("mirror {}", len), suggestion))
}

fn cycle(h: &[Outcome], size: usize, inverted: bool) -> Option<(String, Option<Outcome>)> {
    let colors: Vec<Outcome> = h.iter().copied().filter(|o| o.is_color()).collect();
    if colors.len() < 2 * size {
        return None;
    }
    let w = tail(&colors, 2 * size);
    let (earlier, later) = w.split_at(size);
    if is_constant(earlier) || is_alternating_block(earlier) {
        return None;
    }
    let reversed: Vec<Outcome> = earlier.iter().rev().copied().collect();
    let label = if inverted {
        // A palindromic block would match both ways; leave it to the regular cycle.
        if later != reversed.as_slice() || earlier == reversed.as_slice() {
            return None;
        }
        format!("inverted cycle {}", symbols(earlier))
    } else {
        if earlier != later {
            return None;
        }
        format!("cycle {}", symbols(earlier))
    };
    Some((label, Some(earlier[0])))
}

fn tie_follow(h: &[Outcome]) -> Option<(String, Option<Outcome>)> {
    let n = h.len();
    let (before, last) = (h[n - 2], h[n - 1]);
    if before != Outcome::Tie || !last.is_color() {
        return None;
    }
    Some((format!("tie then {}", last), Some(last)))
}

fn twin_streaks(h: &[Outcome], window: usize) -> Option<(String, Option<Outcome>)> {
    let r = runs(tail(h, window));
    let adjacent = (0..r.len())
        .filter(|&i| {
            let (o, len) = r[i];
            let tie_before = i > 0 && r[i - 1].0 == Outcome::Tie;
            let tie_after = i + 1 < r.len() && r[i + 1].0 == Outcome::Tie;
            o.is_color() && len >= 2 && (tie_before || tie_after)
        })
        .count();
    if adjacent < 2 {
        return None;
    }
    let next = last_color(h).and_then(|c| c.opposite());
    Some(("twin tie streaks".to_string(), next))
}

fn tie_reset(h: &[Outcome], lean: Outcome) -> Option<(String, Option<Outcome>)> {
    let n = h.len();
    if h[n - 1] != Outcome::Tie || !h[n - 2].is_color() {
        return None;
    }
    Some(("tie reset".to_string(), Some(lean)))
}

fn imbalance(h: &[Outcome], window: usize, threshold: f64) -> Option<(String, Option<Outcome>)> {
    let w = tail(h, window.max(IMBALANCE_MIN_WINDOW));
    let (color, share) = dominant_color(w)?;
    if share <= threshold {
        return None;
    }
    Some((format!("{} imbalance {:.0}%", color, share * 100.0), color.opposite()))
}

fn cluster(h: &[Outcome], window: usize, min_count: usize) -> Option<(String, Option<Outcome>)> {
    let w = tail(h, window);
    if is_constant(w) {
        return None;
    }
    let (red, blue) = color_counts(w);
    let (color, count) = if red >= blue { (Outcome::Red, red) } else { (Outcome::Blue, blue) };
    if count < min_count {
        return None;
    }
    Some((format!("{} cluster {}/{}", color, count, w.len()), color.opposite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::*;

    fn check(motif: Motif, h: &[Outcome]) -> Option<(String, Option<Outcome>)> {
        motif.check(h)
    }

    #[test]
    fn test_streak_bands_are_disjoint() {
        let h = [Blue, Red, Red, Red];
        let hits: Vec<Detection> = detect_all(&HistorySnapshot::from_outcomes(&h), DETECTOR_TABLE)
            .into_iter()
            .filter(|d| d.matched && d.label.contains("streak"))
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "red streak x3");
        assert_eq!(hits[0].suggestion, Some(Blue));
        assert_eq!(hits[0].weight, 3.5);
    }

    #[test]
    fn test_streak_broken_by_tie() {
        let m = Motif::Streak { min: 3, max: None };
        assert!(check(m, &[Red, Red, Red, Tie]).is_none());
        assert!(check(m, &[Red, Tie, Red, Red]).is_none());
        assert!(check(m, &[Red, Red]).is_none());
    }

    #[test]
    fn test_long_streak_forces_call() {
        let h = [Blue; 6];
        let d = DETECTOR_TABLE[0].detect(&HistorySnapshot::from_outcomes(&h));
        assert!(d.matched && d.forces_call);
        assert_eq!(d.suggestion, Some(Red));
    }

    #[test]
    fn test_alternation_single() {
        let m = Motif::Alternation { block: 1 };
        let (label, s) = check(m, &[Red, Blue, Red, Blue]).unwrap();
        assert_eq!(label, "alternation x1");
        assert_eq!(s, Some(Red));
        assert_eq!(check(m, &[Blue, Red, Blue, Red]).unwrap().1, Some(Blue));
        assert!(check(m, &[Red, Tie, Red, Tie]).is_none());
        assert!(check(m, &[Red, Red, Red, Red]).is_none());
        assert!(check(m, &[Red, Blue, Red]).is_none());
    }

    #[test]
    fn test_alternation_double() {
        let m = Motif::Alternation { block: 2 };
        let h = [Red, Red, Blue, Blue, Red, Red, Blue, Blue];
        assert_eq!(check(m, &h).unwrap().1, Some(Red));
        assert!(check(m, &[Red, Blue, Red, Blue, Red, Blue, Red, Blue]).is_none());
    }

    #[test]
    fn test_repeated_block() {
        let m = Motif::RepeatedBlock { block: 3 };
        let (label, s) = check(m, &[Red, Red, Blue, Red, Red, Blue]).unwrap();
        assert_eq!(label, "repeated block RRB");
        assert_eq!(s, Some(Red));
        // Pure alternation is left to the alternation detector.
        assert!(Motif::RepeatedBlock { block: 2 }.check(&[Red, Blue, Red, Blue]).is_none());
        assert!(Motif::RepeatedBlock { block: 2 }.check(&[Red, Tie, Red, Tie]).is_some());
        assert!(check(m, &[Red, Red, Red, Red, Red, Red]).is_none());
    }

    #[test]
    fn test_mirror_requires_six() {
        let m = Motif::Mirror { min_len: 6 };
        assert!(check(m, &[Red, Blue, Blue, Red]).is_none());
        let (label, _) = check(m, &[Red, Blue, Blue, Blue, Blue, Red]).unwrap();
        assert_eq!(label, "mirror 6");
    }

    #[test]
    fn test_mirror_skips_ties() {
        let m = Motif::Mirror { min_len: 6 };
        let h = [Blue, Red, Tie, Blue, Red, Blue];
        assert!(check(m, &h).is_some());
        let h = [Red, Red, Blue, Tie, Blue, Red];
        assert!(check(m, &h).is_none());
    }

    #[test]
    fn test_mirror_suggests_extension() {
        let m = Motif::Mirror { min_len: 6 };
        let h = [Blue, Red, Blue, Blue, Blue, Blue, Red];
        let (label, s) = check(m, &h).unwrap();
        assert_eq!(label, "mirror 6");
        assert_eq!(s, Some(Blue));
    }

    #[test]
    fn test_cycle_regular_and_inverted() {
        let regular = Motif::Cycle { size: 3, inverted: false };
        let inverted = Motif::Cycle { size: 3, inverted: true };
        let h = [Red, Red, Blue, Tie, Red, Red, Blue];
        assert_eq!(check(regular, &h).unwrap().0, "cycle RRB");
        assert!(check(inverted, &h).is_none());

        let h = [Red, Red, Blue, Blue, Red, Red];
        assert_eq!(check(inverted, &h).unwrap().0, "inverted cycle RRB");
        assert!(check(regular, &h).is_none());
    }

    #[test]
    fn test_tie_follow() {
        assert_eq!(check(Motif::TieFollow, &[Red, Tie, Blue]).unwrap().1, Some(Blue));
        assert!(check(Motif::TieFollow, &[Red, Blue]).is_none());
        assert!(check(Motif::TieFollow, &[Tie, Tie]).is_none());
    }

    #[test]
    fn test_twin_streaks() {
        let m = Motif::TwinStreaks { window: 10 };
        let h = [Red, Red, Tie, Blue, Blue];
        assert_eq!(check(m, &h).unwrap().1, Some(Red));
        assert!(check(m, &[Red, Red, Tie, Blue, Red]).is_none());
    }

    #[test]
    fn test_tie_reset_split() {
        let h = HistorySnapshot::from_outcomes(&[Red, Blue, Tie]);
        let hits: Vec<Detection> = detect_all(&h, DETECTOR_TABLE)
            .into_iter()
            .filter(|d| d.matched && d.label == "tie reset")
            .collect();
        assert_eq!(hits.len(), 3);
        let total: f64 = hits.iter().map(|d| d.weight).sum();
        assert!((total - 4.0).abs() < 1e-9);
        assert!(check(Motif::TieReset { lean: Red }, &[Red, Tie, Tie]).is_none());
        assert!(check(Motif::TieReset { lean: Red }, &[Tie]).is_none());
    }

    #[test]
    fn test_tie_reset_after_streak() {
        for h in [&[Red, Tie][..], &[Red, Red, Tie], &[Blue, Red, Red, Red, Tie]] {
            let hits: Vec<Detection> = detect_all(&HistorySnapshot::from_outcomes(h), DETECTOR_TABLE)
                .into_iter()
                .filter(|d| d.matched)
                .collect();
            assert_eq!(hits.len(), 3, "{:?}", h);
            assert!(hits.iter().all(|d| d.label == "tie reset"));
        }
    }

    #[test]
    fn test_imbalance() {
        let m = Motif::Imbalance { window: 20, threshold: 0.7 };
        let h = [Red, Red, Blue, Red, Red, Red, Tie, Red, Red, Blue];
        let (label, s) = check(m, &h).unwrap();
        assert!(label.starts_with("red imbalance"));
        assert_eq!(s, Some(Blue));
        assert!(check(m, &h[..9]).is_none());
        assert!(check(m, &[Red, Blue, Red, Blue, Red, Blue, Red, Blue, Red, Blue]).is_none());
    }

    #[test]
    fn test_cluster() {
        let m = Motif::Cluster { window: 5, min_count: 4 };
        assert_eq!(check(m, &[Red, Blue, Red, Red, Red]).unwrap().1, Some(Blue));
        assert!(check(m, &[Red, Red, Red, Red, Red]).is_none());
        assert!(check(m, &[Red, Blue, Red, Blue, Red]).is_none());
    }

    #[test]
    fn test_short_history_never_matches() {
        for def in DETECTOR_TABLE {
            let need = def.motif.min_len();
            for len in 0..need {
                let h: Vec<Outcome> = (0..len).map(|i| Outcome::ALL[i % 2]).collect();
                let d = def.detect(&HistorySnapshot::from_outcomes(&h));
                assert!(!d.matched, "{} matched on {} < {}", d.label, len, need);
                assert_eq!(d.weight, 0.0);
            }
        }
    }
}
