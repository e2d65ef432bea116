use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    pub const ALL: [Street; 4] = [Street::Preflop, Street::Flop, Street::Turn, Street::River];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn previous(self) -> Option<Street> {
        match self {
            Street::Preflop => None,
            Street::Flop => Some(Street::Preflop),
            Street::Turn => Some(Street::Flop),
            Street::River => Some(Street::Turn),
        }
    }

    pub fn is_postflop(self) -> bool {
        self != Street::Preflop
    }

    /// Community cards dealt when this street starts.
    pub fn dealt_cards(self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 3,
            Street::Turn | Street::River => 1,
        }
    }
}

impl Display for Street {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Street::Preflop => "preflop",
            Street::Flop => "flop",
            Street::Turn => "turn",
            Street::River => "river",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PotType {
    Cash,
    Tournament,
}

/// Seat labels in preflop acting order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TablePosition {
    #[serde(rename = "UTG")]
    Utg,
    #[serde(rename = "UTG1")]
    Utg1,
    #[serde(rename = "UTG2")]
    Utg2,
    #[serde(rename = "LJ")]
    Lj,
    #[serde(rename = "HJ")]
    Hj,
    #[serde(rename = "CO")]
    Co,
    #[serde(rename = "BTN")]
    Btn,
    #[serde(rename = "SB")]
    Sb,
    #[serde(rename = "BB")]
    Bb,
}

impl TablePosition {
    pub const PREFLOP_ORDER: [TablePosition; 9] = [
        TablePosition::Utg,
        TablePosition::Utg1,
        TablePosition::Utg2,
        TablePosition::Lj,
        TablePosition::Hj,
        TablePosition::Co,
        TablePosition::Btn,
        TablePosition::Sb,
        TablePosition::Bb,
    ];

    /// The last `players` seats of the preflop order, i.e. the seats a table of
    /// that size uses. Clamped to `2..=9`.
    pub fn for_table(players: usize) -> &'static [TablePosition] {
        let n = players.clamp(2, Self::PREFLOP_ORDER.len());
        &Self::PREFLOP_ORDER[Self::PREFLOP_ORDER.len() - n..]
    }

    /// Rank in postflop acting order: SB first, BTN last.
    pub fn postflop_rank(self) -> usize {
        match self {
            TablePosition::Sb => 0,
            TablePosition::Bb => 1,
            other => other as usize + 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TablePosition::Utg => "UTG",
            TablePosition::Utg1 => "UTG1",
            TablePosition::Utg2 => "UTG2",
            TablePosition::Lj => "LJ",
            TablePosition::Hj => "HJ",
            TablePosition::Co => "CO",
            TablePosition::Btn => "BTN",
            TablePosition::Sb => "SB",
            TablePosition::Bb => "BB",
        }
    }
}

impl Display for TablePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TablePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PREFLOP_ORDER
            .iter()
            .copied()
            .find(|p| p.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown position '{s}'"))
    }
}

/// Position relative to the other players still in on a street.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Relative {
    #[serde(rename = "ip")]
    InPosition,
    #[serde(rename = "oop")]
    OutOfPosition,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
}

impl Token {
    pub fn is_aggressive(self) -> bool {
        matches!(self, Token::Bet | Token::Raise)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Fold => "fold",
            Token::Check => "check",
            Token::Call => "call",
            Token::Bet => "bet",
            Token::Raise => "raise",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blinds {
    pub small: u64,
    pub big: u64,
    #[serde(default)]
    pub ante: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub player_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub position: TablePosition,
    pub stack: u64,
    #[serde(default)]
    pub hole_cards: Option<String>,
}

/// Raw tokens of one street: `f`, `x`, `c`, `b<to>` or `r<to>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreetRecord {
    pub street: Street,
    /// Cards dealt when the street starts; empty preflop.
    #[serde(default)]
    pub board: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A raw hand history as delivered by the upstream source.
///
/// `blinds` and `players` are optional at the wire level so that incomplete
/// records deserialize and can be rejected (and counted) during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandRecord {
    pub hand_id: String,
    #[serde(default)]
    pub blinds: Option<Blinds>,
    #[serde(default)]
    pub players: Vec<Seat>,
    #[serde(default)]
    pub streets: Vec<StreetRecord>,
    pub pot_type: PotType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PlayerRef {
    pub id: String,
    pub name: String,
}

/// One betting decision, in recorded order. Immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionEvent {
    pub hand_id: String,
    pub street: Street,
    /// Position of the event within its street.
    pub index: u32,
    /// Position of the event within the hand.
    pub sequence: u32,
    pub player: PlayerRef,
    pub seat: TablePosition,
    pub relative: Relative,
    pub token: Token,
    /// Chips put in by this action.
    pub amount: u64,
    /// Street total the player reached with this action.
    pub amount_to: u64,
    pub pot_before: u64,
    pub stack_before: u64,
    pub stack_after: u64,
    pub all_in: bool,
    pub big_blind: u64,
    /// Community cards visible when the action was taken.
    pub board: String,
    pub hole_cards: Option<String>,
}
