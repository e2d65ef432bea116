//! Decision Scorer: the J-score, a 1.0 to 100.0 decision-quality value.
//!
//! The score blends three inputs:
//! - hand strength from the [`EquityEvaluator`],
//! - a risk factor from the bet-to-pot ratio (postflop only),
//! - conformance to a per-label strength baseline.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::cards::{Card, parse_cards};
use crate::equity::{EquityEvaluator, PercentileEvaluator};
use crate::hand::{ActionEvent, Street};
use crate::label::ActionLabel;

/// Bet-to-pot ratio above which risk no longer grows.
const MAX_POT_RATIO: f64 = 5.0;
/// Weight of raw strength against label conformance.
const STRENGTH_WEIGHT: f64 = 0.75;

/// Pot facts the scorer needs about one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotState {
    pub street: Street,
    /// Chips put in by the action.
    pub invested: u64,
    pub pot_before: u64,
}

impl PotState {
    pub fn of(event: &ActionEvent) -> Self {
        Self {
            street: event.street,
            invested: event.amount,
            pot_before: event.pot_before,
        }
    }

    /// Multiplier in `0.0..=1.0`, smaller for larger bets relative to the pot.
    /// Preflop and zero-chip actions carry no risk adjustment.
    pub fn risk_factor(&self) -> f64 {
        if self.street == Street::Preflop || self.invested == 0 || self.pot_before == 0 {
            return 1.0;
        }
        let ratio = (self.invested as f64 / self.pot_before as f64).min(MAX_POT_RATIO);
        1.0 - ratio.ln_1p() / MAX_POT_RATIO.ln_1p()
    }
}

/// Outcome of scoring one action.
///
/// Serialized as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum DecisionScore {
    Scored(f64),
    /// Cards were missing or invalid; excluded from score aggregates.
    Unscored,
}

impl DecisionScore {
    pub fn value(self) -> Option<f64> {
        match self {
            DecisionScore::Scored(v) => Some(v),
            DecisionScore::Unscored => None,
        }
    }

    pub fn is_scored(self) -> bool {
        matches!(self, DecisionScore::Scored(_))
    }

    /// The score in tenths of a point, the unit aggregates are summed in.
    pub fn tenths(self) -> Option<u64> {
        self.value().map(|v| (v * 10.0).round() as u64)
    }
}

impl From<Option<f64>> for DecisionScore {
    fn from(value: Option<f64>) -> Self {
        value.map_or(DecisionScore::Unscored, DecisionScore::Scored)
    }
}

impl From<DecisionScore> for Option<f64> {
    fn from(score: DecisionScore) -> Self {
        score.value()
    }
}

/// Hand strength the label usually represents. Bets at or above it conform.
pub fn label_baseline(label: ActionLabel) -> Option<f64> {
    let baseline = match label {
        ActionLabel::Open => 0.45,
        ActionLabel::LimpRaise => 0.60,
        ActionLabel::NBet(2) => 0.55,
        ActionLabel::NBet(3) => 0.65,
        ActionLabel::NBet(_) => 0.75,
        ActionLabel::Cont => 0.40,
        ActionLabel::DelayedCont => 0.45,
        ActionLabel::Donk => 0.55,
        ActionLabel::Lead => 0.50,
        ActionLabel::Probe => 0.45,
        ActionLabel::FloatBet => 0.40,
        ActionLabel::CheckRaise => 0.60,
        ActionLabel::Bet => 0.50,
        ActionLabel::Raise => 0.55,
        ActionLabel::Unclassified => return None,
    };
    Some(baseline)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Clone)]
pub struct DecisionScorer {
    evaluator: Arc<dyn EquityEvaluator>,
}

impl Default for DecisionScorer {
    fn default() -> Self {
        Self::new(Arc::new(PercentileEvaluator::new()))
    }
}

impl DecisionScorer {
    pub fn new(evaluator: Arc<dyn EquityEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Scores one decision. Pure: identical arguments give an identical result.
    pub fn score(
        &self,
        label: Option<ActionLabel>,
        hole: &[Card],
        board: &[Card],
        pot: PotState,
    ) -> DecisionScore {
        if board.len() != visible_board_len(pot.street) {
            return DecisionScore::Unscored;
        }
        let Ok(strength) = self.evaluator.evaluate(hole, board) else {
            return DecisionScore::Unscored;
        };
        if !strength.is_finite() {
            return DecisionScore::Unscored;
        }
        let raw = strength.clamp(0.0, 1.0) * pot.risk_factor();
        let blended = match label.and_then(label_baseline) {
            Some(baseline) => {
                let conformance = if strength >= baseline {
                    1.0
                } else {
                    strength / baseline
                };
                raw * STRENGTH_WEIGHT + conformance * (1.0 - STRENGTH_WEIGHT)
            }
            None => raw,
        };
        DecisionScore::Scored(round1(blended.clamp(0.0, 1.0) * 99.0 + 1.0))
    }

    /// Parses the event's cards and scores it; unparsable cards are unscored.
    pub fn score_event(&self, event: &ActionEvent, label: Option<ActionLabel>) -> DecisionScore {
        let Some(hole) = event.hole_cards.as_deref() else {
            return DecisionScore::Unscored;
        };
        let (Ok(hole), Ok(board)) = (parse_cards(hole), parse_cards(&event.board)) else {
            return DecisionScore::Unscored;
        };
        self.score(label, &hole, &board, PotState::of(event))
    }
}

fn visible_board_len(street: Street) -> usize {
    Street::ALL
        .iter()
        .take_while(|s| **s <= street)
        .map(|s| s.dealt_cards())
        .sum()
}

/// Bet-size bucket of an aggressive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub enum SizeCategory {
    Tiny,
    Small,
    Medium,
    Big,
    Pot,
    Over,
    Huge,
}

impl SizeCategory {
    pub const ALL: [SizeCategory; 7] = [
        SizeCategory::Tiny,
        SizeCategory::Small,
        SizeCategory::Medium,
        SizeCategory::Big,
        SizeCategory::Pot,
        SizeCategory::Over,
        SizeCategory::Huge,
    ];

    /// Upper bounds (exclusive) for preflop sizes in big blinds, `Huge` beyond.
    const PREFLOP_BOUNDS: [f64; 6] = [1.5, 2.25, 3.0, 3.75, 4.5, 6.0];
    /// Upper bounds (exclusive) for postflop sizes as a fraction of the pot.
    const POSTFLOP_BOUNDS: [f64; 6] = [0.2, 0.35, 0.55, 0.85, 1.10, 1.75];

    /// Buckets a fraction computed by [`size_fraction`]; `None` below 0.01.
    pub fn categorize(street: Street, fraction: f64) -> Option<Self> {
        if !fraction.is_finite() || fraction < 0.01 {
            return None;
        }
        let bounds = if street == Street::Preflop {
            &Self::PREFLOP_BOUNDS
        } else {
            &Self::POSTFLOP_BOUNDS
        };
        let bucket = bounds
            .iter()
            .position(|upper| fraction < *upper)
            .unwrap_or(bounds.len());
        Some(Self::ALL[bucket])
    }

    /// Category of an aggressive event; `None` for passive ones.
    pub fn of(event: &ActionEvent) -> Option<Self> {
        if !event.token.is_aggressive() {
            return None;
        }
        size_fraction(event).and_then(|fraction| Self::categorize(event.street, fraction))
    }
}

impl Display for SizeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SizeCategory::Tiny => "tiny",
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Big => "big",
            SizeCategory::Pot => "pot",
            SizeCategory::Over => "over",
            SizeCategory::Huge => "huge",
        })
    }
}

impl std::str::FromStr for SizeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.to_string() == s)
            .ok_or_else(|| format!("unknown size category '{s}'"))
    }
}

/// Preflop: raise-to amount in big blinds. Postflop: chips put in over the
/// pot before the action.
pub fn size_fraction(event: &ActionEvent) -> Option<f64> {
    if event.street == Street::Preflop {
        (event.big_blind > 0).then(|| event.amount_to as f64 / event.big_blind as f64)
    } else {
        (event.pot_before > 0).then(|| event.amount as f64 / event.pot_before as f64)
    }
}
