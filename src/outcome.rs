// Round outcomes and card values as entered by the operator.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result of one round. Red and Blue are the two colors, Tie is the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Red,
    Blue,
    Tie,
}

impl Outcome {
    /// Fixed order used for score vectors and tie-breaking.
    pub const ALL: [Outcome; 3] = [Outcome::Red, Outcome::Blue, Outcome::Tie];

    pub fn index(&self) -> usize {
        match self {
            Outcome::Red => 0,
            Outcome::Blue => 1,
            Outcome::Tie => 2,
        }
    }

    pub fn is_color(&self) -> bool {
        !matches!(self, Outcome::Tie)
    }

    /// The other color. Tie has no opposite.
    pub fn opposite(&self) -> Option<Outcome> {
        match self {
            Outcome::Red => Some(Outcome::Blue),
            Outcome::Blue => Some(Outcome::Red),
            Outcome::Tie => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Red => "red",
            Outcome::Blue => "blue",
            Outcome::Tie => "tie",
        }
    }

    /// Single-letter symbol used in fingerprints and storage.
    pub fn symbol(&self) -> char {
        match self {
            Outcome::Red => 'R',
            Outcome::Blue => 'B',
            Outcome::Tie => 'T',
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "r" | "red" | "🔴" => Ok(Outcome::Red),
            "b" | "blue" | "🔵" => Ok(Outcome::Blue),
            "t" | "tie" | "🟡" => Ok(Outcome::Tie),
            other => Err(anyhow!("unknown outcome symbol {:?} (expected red, blue or tie)", other)),
        }
    }
}

/// Rank of the winning card in card-value variants. Ace is lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardRank(u8);

impl CardRank {
    pub fn new(value: u8) -> Result<Self> {
        if (1..=13).contains(&value) {
            Ok(Self(value))
        } else {
            Err(anyhow!("card rank {} out of range 1..=13", value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn class(&self) -> ValueClass {
        match self.0 {
            1..=6 => ValueClass::Low,
            7 => ValueClass::Middle,
            _ => ValueClass::High,
        }
    }
}

impl FromStr for CardRank {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = match s.trim().to_uppercase().as_str() {
            "A" => 1,
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            other => other
                .parse::<u8>()
                .map_err(|_| anyhow!("unknown card rank {:?}", other))?,
        };
        CardRank::new(value)
    }
}

impl fmt::Display for CardRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => f.write_str("A"),
            11 => f.write_str("J"),
            12 => f.write_str("Q"),
            13 => f.write_str("K"),
            n => write!(f, "{}", n),
        }
    }
}

/// Coarse card category; Low is the weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueClass {
    Low,
    Middle,
    High,
}

/// Parse an operator entry such as `r`, `blue`, `🟡`, `r7` or `b K`.
pub fn parse_entry(input: &str) -> Result<(Outcome, Option<CardRank>)> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty entry"));
    }
    if let Ok(outcome) = trimmed.parse::<Outcome>() {
        return Ok((outcome, None));
    }
    if let Some((head, tail)) = trimmed.split_once(char::is_whitespace) {
        let outcome = head.parse::<Outcome>()?;
        let rank = tail.parse::<CardRank>()?;
        return Ok((outcome, Some(rank)));
    }
    // Compact form: one-letter outcome followed by the rank.
    let mut chars = trimmed.chars();
    let head = chars.next().map(|c| c.to_string()).unwrap_or_default();
    let outcome = head.parse::<Outcome>()?;
    let rank = chars.as_str().parse::<CardRank>()?;
    Ok((outcome, Some(rank)))
}
