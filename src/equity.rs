use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;

use crate::cards::{Card, Rank};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquityError {
    #[error("expected two hole cards, got {0}")]
    HoleCards(usize),
    #[error("board must hold 0, 3, 4 or 5 cards, got {0}")]
    Board(usize),
    #[error("card {0} is both a hole card and on the board")]
    Overlap(Card),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum HandCategory {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl HandCategory {
    /// Distinct five-card equivalence classes per category and the number of
    /// classes ranked below the category, out of 7462.
    fn class_span(self) -> (u32, u32) {
        match self {
            HandCategory::HighCard => (0, 1277),
            HandCategory::OnePair => (1277, 2860),
            HandCategory::TwoPair => (4137, 858),
            HandCategory::ThreeOfAKind => (4995, 858),
            HandCategory::Straight => (5853, 10),
            HandCategory::Flush => (5863, 1277),
            HandCategory::FullHouse => (7140, 156),
            HandCategory::FourOfAKind => (7296, 156),
            HandCategory::StraightFlush => (7452, 10),
        }
    }
}

const DISTINCT_HANDS: f64 = 7462.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandStrength {
    pub category: HandCategory,
    pub ranks: [u8; 5],
}

impl HandStrength {
    /// Position of this hand among all five-card classes, 0 (worst) to 1 (best).
    pub fn percentile(&self) -> f64 {
        let (below, size) = self.category.class_span();
        let within = self
            .ranks
            .iter()
            .fold(0u32, |acc, r| acc * 15 + u32::from(*r)) as f64
            / 15f64.powi(5);
        (f64::from(below) + within * f64::from(size)) / DISTINCT_HANDS
    }
}

impl PartialOrd for HandStrength {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandStrength {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.ranks.cmp(&other.ranks))
    }
}

fn fill(mut values: Vec<u8>) -> [u8; 5] {
    values.resize(5, 0);
    [values[0], values[1], values[2], values[3], values[4]]
}

/// Highest card of a five-high or better straight in `counts`; the ace also
/// plays low.
fn straight_high(counts: &[u8; 15]) -> Option<u8> {
    let present = |rank: u8| {
        let idx = if rank == 1 { Rank::Ace.value() } else { rank };
        counts[idx as usize] > 0
    };
    (5..=14u8)
        .rev()
        .find(|&high| (high - 4..=high).all(|rank| present(rank)))
}

fn evaluate_five(cards: [Card; 5]) -> HandStrength {
    let mut counts = [0u8; 15];
    for card in &cards {
        counts[card.rank_value() as usize] += 1;
    }
    let flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let straight = straight_high(&counts);

    // Bigger groups first, higher rank first within a group size.
    let groups: Vec<(u8, u8)> = (2..=14u8)
        .rev()
        .filter(|&rank| counts[rank as usize] > 0)
        .map(|rank| (counts[rank as usize], rank))
        .sorted_by(|a, b| b.0.cmp(&a.0))
        .collect();
    let shape: Vec<u8> = groups.iter().map(|&(count, _)| count).collect();
    let ranks: Vec<u8> = groups.iter().map(|&(_, rank)| rank).collect();

    let (category, ranks) = match (shape.as_slice(), flush, straight) {
        (_, true, Some(high)) => (HandCategory::StraightFlush, vec![high]),
        ([4, 1], ..) => (HandCategory::FourOfAKind, ranks),
        ([3, 2], ..) => (HandCategory::FullHouse, ranks),
        (_, true, None) => (HandCategory::Flush, ranks),
        (_, false, Some(high)) => (HandCategory::Straight, vec![high]),
        ([3, 1, 1], ..) => (HandCategory::ThreeOfAKind, ranks),
        ([2, 2, 1], ..) => (HandCategory::TwoPair, ranks),
        ([2, 1, 1, 1], ..) => (HandCategory::OnePair, ranks),
        _ => (HandCategory::HighCard, ranks),
    };
    HandStrength {
        category,
        ranks: fill(ranks),
    }
}

/// Best five-card hand out of five to seven cards; `None` below five.
pub fn best_five_card_hand(cards: &[Card]) -> Option<HandStrength> {
    if cards.len() < 5 {
        return None;
    }
    cards
        .iter()
        .copied()
        .combinations(5)
        .map(|combo| evaluate_five([combo[0], combo[1], combo[2], combo[3], combo[4]]))
        .max()
}

pub fn compare_strength(a: HandStrength, b: HandStrength) -> Ordering {
    a.cmp(&b)
}

/// Chen formula strength of a starting hand, normalised to 0..=1.
pub fn chen_strength(hole: [Card; 2]) -> f64 {
    let (high, low) = if hole[0].rank >= hole[1].rank {
        (hole[0], hole[1])
    } else {
        (hole[1], hole[0])
    };

    let mut points: f64 = match high.rank {
        Rank::Ace => 10.0,
        Rank::King => 8.0,
        Rank::Queen => 7.0,
        Rank::Jack => 6.0,
        other => f64::from(other.value()) / 2.0,
    };

    if high.rank == low.rank {
        points = (points * 2.0).max(5.0);
    } else {
        if high.suit == low.suit {
            points += 2.0;
        }
        let gap = high.rank.value() - low.rank.value() - 1;
        points -= match gap {
            0 => 0.0,
            1 => 1.0,
            2 => 2.0,
            3 => 4.0,
            _ => 5.0,
        };
        if gap <= 1 && high.rank < Rank::Queen {
            points += 1.0;
        }
    }

    (points.clamp(0.0, 20.0) / 20.0).clamp(0.0, 1.0)
}

/// Hand-strength capability consumed by the decision scorer.
///
/// Implementations must be pure: identical cards always yield an identical
/// value in `0.0..=1.0`.
pub trait EquityEvaluator: Send + Sync {
    fn evaluate(&self, hole: &[Card], board: &[Card]) -> Result<f64, EquityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("failed to read range file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{0}' is not a starting hand (expected AA, AKs or AKo)")]
    Hand(String),
    #[error("starting hand {0} listed twice")]
    Duplicate(String),
    #[error("a range needs at least {min} hands, got {0}", min = PreflopRange::MIN_HANDS)]
    TooShort(usize),
}

/// Canonical starting-hand key: `AA`, `A7s`, `A7o`, higher rank first.
pub fn hand_key(hole: [Card; 2]) -> String {
    let (high, low) = if hole[0].rank >= hole[1].rank {
        (hole[0], hole[1])
    } else {
        (hole[1], hole[0])
    };
    match (high.rank == low.rank, high.suit == low.suit) {
        (true, _) => format!("{}{}", high.rank, low.rank),
        (false, true) => format!("{}{}s", high.rank, low.rank),
        (false, false) => format!("{}{}o", high.rank, low.rank),
    }
}

fn canonical_key(token: &str) -> Option<String> {
    let chars: Vec<char> = token.chars().collect();
    let (a, b, suffix) = match chars.as_slice() {
        [a, b] => (*a, *b, None),
        [a, b, s @ ('s' | 'o')] => (*a, *b, Some(*s)),
        _ => return None,
    };
    let (a, b) = (Rank::from_code(a).ok()?, Rank::from_code(b).ok()?);
    let (high, low) = if a >= b { (a, b) } else { (b, a) };
    match (high == low, suffix) {
        (true, None) => Some(format!("{high}{low}")),
        (false, Some(s)) => Some(format!("{high}{low}{s}")),
        _ => None,
    }
}

/// Starting hands listed strongest first. The first hand scores 1.0, the
/// last 0.0, evenly spaced in between.
#[derive(Debug, Clone, Default)]
pub struct PreflopRange {
    strength: HashMap<String, f64>,
}

impl PreflopRange {
    pub const MIN_HANDS: usize = 10;

    /// Hands separated by commas or whitespace.
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let keys = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| canonical_key(t).ok_or_else(|| RangeError::Hand(t.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        if keys.len() < Self::MIN_HANDS {
            return Err(RangeError::TooShort(keys.len()));
        }

        let top = (keys.len() - 1) as f64;
        let mut strength = HashMap::with_capacity(keys.len());
        for (i, key) in keys.into_iter().enumerate() {
            if strength.contains_key(&key) {
                return Err(RangeError::Duplicate(key));
            }
            strength.insert(key, 1.0 - i as f64 / top);
        }
        Ok(Self { strength })
    }

    pub fn load(path: &Path) -> Result<Self, RangeError> {
        let text = std::fs::read_to_string(path).map_err(|source| RangeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.strength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strength.is_empty()
    }

    pub fn strength(&self, hole: [Card; 2]) -> Option<f64> {
        self.strength.get(&hand_key(hole)).copied()
    }
}

/// Preflop: the hand's place in a [`PreflopRange`] when one is set and lists
/// it, the Chen formula otherwise. Made-hand percentile over the 7462
/// five-card classes once a board is out.
#[derive(Debug, Clone, Default)]
pub struct PercentileEvaluator {
    range: Option<Arc<PreflopRange>>,
}

impl PercentileEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(range: PreflopRange) -> Self {
        Self {
            range: Some(Arc::new(range)),
        }
    }

    fn preflop(&self, hole: [Card; 2]) -> f64 {
        self.range
            .as_ref()
            .and_then(|range| range.strength(hole))
            .unwrap_or_else(|| chen_strength(hole))
    }
}

impl EquityEvaluator for PercentileEvaluator {
    fn evaluate(&self, hole: &[Card], board: &[Card]) -> Result<f64, EquityError> {
        let hole: [Card; 2] = hole
            .try_into()
            .map_err(|_| EquityError::HoleCards(hole.len()))?;
        if hole[0] == hole[1] {
            return Err(EquityError::Overlap(hole[0]));
        }
        if let Some(card) = board.iter().find(|c| hole.contains(c)) {
            return Err(EquityError::Overlap(*card));
        }

        match board.len() {
            0 => Ok(self.preflop(hole)),
            3..=5 => {
                let cards: Vec<Card> = hole.iter().chain(board).copied().collect();
                best_five_card_hand(&cards)
                    .map(|strength| strength.percentile())
                    .ok_or(EquityError::Board(board.len()))
            }
            n => Err(EquityError::Board(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_cards;

    fn five(s: &str) -> HandStrength {
        let cards: [Card; 5] = parse_cards(s).unwrap().try_into().unwrap();
        evaluate_five(cards)
    }

    #[test]
    fn categories_rank_in_order() {
        let hands = [
            ("Ah9d7c5s3h", HandCategory::HighCard),
            ("AhAd7c5s3h", HandCategory::OnePair),
            ("AhAd7c7s3h", HandCategory::TwoPair),
            ("AhAdAc7s3h", HandCategory::ThreeOfAKind),
            ("9hTdJcQsKh", HandCategory::Straight),
            ("Ah9h7h5h3h", HandCategory::Flush),
            ("AhAdAc7s7h", HandCategory::FullHouse),
            ("9c9d9h9sAc", HandCategory::FourOfAKind),
            ("ThJhQhKhAh", HandCategory::StraightFlush),
        ];
        let strengths: Vec<HandStrength> = hands
            .iter()
            .map(|(cards, category)| {
                let strength = five(cards);
                assert_eq!(strength.category, *category, "{cards}");
                strength
            })
            .collect();
        assert!(strengths.windows(2).all(|w| w[0] < w[1]));
        assert!(
            strengths
                .windows(2)
                .all(|w| w[0].percentile() < w[1].percentile())
        );
    }

    #[test]
    fn wheel_straight_detected() {
        let strength = five("Ac2d3h4s5c");
        assert_eq!(strength.category, HandCategory::Straight);
        assert_eq!(strength.ranks[0], 5);
        assert!(strength < five("2d3h4s5c6d"));
    }

    #[test]
    fn kickers_break_ties() {
        assert!(five("KhKd9c5s3h") > five("KsKc9d4s3d"));
        assert!(five("7h7d4c4s9h") > five("7s7c4d4h8d"));
        assert_eq!(
            compare_strength(five("AhKd9c5s3h"), five("AsKc9d5h3d")),
            Ordering::Equal
        );
    }

    #[test]
    fn percentile_orders_categories() {
        let pair = HandStrength {
            category: HandCategory::OnePair,
            ranks: [14, 13, 12, 11, 0],
        };
        let two_pair = HandStrength {
            category: HandCategory::TwoPair,
            ranks: [3, 2, 4, 0, 0],
        };
        assert!(pair.percentile() < two_pair.percentile());
        assert!(two_pair.percentile() < 1.0);
    }
}
