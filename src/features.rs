//! Window statistics over an outcome sequence (oldest first).
//!
//! Everything here is a pure function of a slice. Rates guard their
//! denominators so empty or single-element windows yield 0.0.

use crate::outcome::{Outcome, ValueClass};
use crate::state::Round;

/// The last `n` elements (or all of them when shorter).
pub fn tail(h: &[Outcome], n: usize) -> &[Outcome] {
    &h[h.len().saturating_sub(n)..]
}

/// Maximal runs of identical outcomes, oldest first.
pub fn runs(h: &[Outcome]) -> Vec<(Outcome, usize)> {
    let mut out: Vec<(Outcome, usize)> = Vec::new();
    for &o in h {
        match out.last_mut() {
            Some((last, len)) if *last == o => *len += 1,
            _ => out.push((o, 1)),
        }
    }
    out
}

/// Trailing run of any outcome, ties included.
pub fn trailing_run(h: &[Outcome]) -> Option<(Outcome, usize)> {
    let last = *h.last()?;
    let len = h.iter().rev().take_while(|o| **o == last).count();
    Some((last, len))
}

/// Trailing color streak. A trailing tie means there is no color streak.
pub fn color_streak(h: &[Outcome]) -> Option<(Outcome, usize)> {
    trailing_run(h).filter(|(o, _)| o.is_color())
}

/// Most recent color outcome, skipping trailing ties.
pub fn last_color(h: &[Outcome]) -> Option<Outcome> {
    h.iter().rev().copied().find(|o| o.is_color())
}

/// Fraction of adjacent pairs that differ.
pub fn alternation_rate(h: &[Outcome]) -> f64 {
    let pairs = h.len().saturating_sub(1);
    let changes = h.windows(2).filter(|w| w[0] != w[1]).count();
    changes as f64 / pairs.max(1) as f64
}

pub fn tie_share(h: &[Outcome]) -> f64 {
    let ties = h.iter().filter(|o| **o == Outcome::Tie).count();
    ties as f64 / h.len().max(1) as f64
}

/// (red, blue) counts.
pub fn color_counts(h: &[Outcome]) -> (usize, usize) {
    h.iter().fold((0, 0), |(r, b), o| match o {
        Outcome::Red => (r + 1, b),
        Outcome::Blue => (r, b + 1),
        Outcome::Tie => (r, b),
    })
}

/// Dominant color and its share of the non-tie outcomes.
pub fn dominant_color(h: &[Outcome]) -> Option<(Outcome, f64)> {
    let (red, blue) = color_counts(h);
    let colors = red + blue;
    if colors == 0 || red == blue {
        return None;
    }
    if red > blue {
        Some((Outcome::Red, red as f64 / colors as f64))
    } else {
        Some((Outcome::Blue, blue as f64 / colors as f64))
    }
}

/// Longest run of identical consecutive outcomes anywhere in the window.
pub fn longest_repeat(h: &[Outcome]) -> usize {
    runs(h).iter().map(|(_, len)| *len).max().unwrap_or(0)
}

/// Runs of two or more consecutive rounds whose winning card is Low.
/// Rounds without a card value break a run.
pub fn low_value_runs(rounds: &[Round]) -> usize {
    let mut count = 0;
    let mut current = 0;
    for r in rounds {
        let low = matches!(r.card.map(|c| c.class()), Some(ValueClass::Low));
        if low {
            current += 1;
            if current == 2 {
                count += 1;
            }
        } else {
            current = 0;
        }
    }
    count
}
