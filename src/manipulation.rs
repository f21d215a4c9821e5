//! Manipulation level: a coarse ordinal read of how "worked" the table looks.
//!
//! Independent of the distribution. Four window statistics are combined into
//! a raw score, which is then banded into one of the levels 1, 3, 5, 7, 9.
//!
//! ```text
//! raw = 1.5 * low_value_runs
//!     + 2.5 * alternation_rate
//!     + 6.0 * tie_share
//!     + 1.2 * (longest_repeat - 1)
//!
//! raw < 2.0 → 1 | < 4.0 → 3 | < 6.0 → 5 | < 8.0 → 7 | else → 9
//! ```

use serde::{Deserialize, Serialize};

use crate::features::{alternation_rate, longest_repeat, low_value_runs, tie_share};
use crate::state::HistorySnapshot;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 9;

const W_LOW_RUNS: f64 = 1.5;
const W_ALTERNATION: f64 = 2.5;
const W_TIES: f64 = 6.0;
const W_REPEAT: f64 = 1.2;

/// (upper bound of raw score, level), checked in order.
const BANDS: [(f64, u8); 4] = [(2.0, 1), (4.0, 3), (6.0, 5), (8.0, 7)];

/// Inputs to the manipulation score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ManipulationStats {
    pub low_value_runs: usize,
    pub alternation_rate: f64,
    pub tie_share: f64,
    pub longest_repeat: usize,
}

impl ManipulationStats {
    pub fn from_snapshot(snapshot: &HistorySnapshot) -> Self {
        let h = snapshot.outcomes();
        Self {
            low_value_runs: low_value_runs(snapshot.rounds()),
            alternation_rate: alternation_rate(h),
            tie_share: tie_share(h),
            longest_repeat: longest_repeat(h),
        }
    }

    pub fn raw_score(&self) -> f64 {
        W_LOW_RUNS * self.low_value_runs as f64
            + W_ALTERNATION * self.alternation_rate
            + W_TIES * self.tie_share
            + W_REPEAT * self.longest_repeat.saturating_sub(1) as f64
    }

    pub fn level(&self) -> u8 {
        band(self.raw_score())
    }
}

/// Map a raw score onto the discrete levels.
pub fn band(raw: f64) -> u8 {
    if !raw.is_finite() {
        return MIN_LEVEL;
    }
    let level = BANDS
        .iter()
        .find(|(upper, _)| raw < *upper)
        .map(|(_, level)| *level)
        .unwrap_or(MAX_LEVEL);
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Level for a snapshot.
pub fn score(snapshot: &HistorySnapshot) -> u8 {
    ManipulationStats::from_snapshot(snapshot).level()
}

/// Severity label derived from the manipulation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTier {
    /// Levels 1-2
    Calm,
    /// Levels 3-4
    Watch,
    /// Levels 5-6
    Elevated,
    /// Levels 7-9
    Critical,
}

impl AlertTier {
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=2 => AlertTier::Calm,
            3..=4 => AlertTier::Watch,
            5..=6 => AlertTier::Elevated,
            _ => AlertTier::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::Calm => "calm",
            AlertTier::Watch => "watch",
            AlertTier::Elevated => "elevated",
            AlertTier::Critical => "critical",
        }
    }
}
