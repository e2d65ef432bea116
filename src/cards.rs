use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardParseError {
    #[error("invalid rank '{0}'")]
    Rank(char),
    #[error("invalid suit '{0}'")]
    Suit(char),
    #[error("card code '{0}' is not two characters")]
    Length(String),
    #[error("card {0} appears more than once")]
    Duplicate(Card),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    pub fn code(self) -> char {
        match self {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn from_code(c: char) -> Result<Self, CardParseError> {
        match c.to_ascii_lowercase() {
            'c' => Ok(Suit::Clubs),
            'd' => Ok(Suit::Diamonds),
            'h' => Ok(Suit::Hearts),
            's' => Ok(Suit::Spades),
            _ => Err(CardParseError::Suit(c)),
        }
    }
}

impl Display for Suit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn code(self) -> char {
        match self {
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
        }
    }

    pub(crate) fn from_code(c: char) -> Result<Self, CardParseError> {
        match c.to_ascii_uppercase() {
            '2' => Ok(Rank::Two),
            '3' => Ok(Rank::Three),
            '4' => Ok(Rank::Four),
            '5' => Ok(Rank::Five),
            '6' => Ok(Rank::Six),
            '7' => Ok(Rank::Seven),
            '8' => Ok(Rank::Eight),
            '9' => Ok(Rank::Nine),
            'T' => Ok(Rank::Ten),
            'J' => Ok(Rank::Jack),
            'Q' => Ok(Rank::Queen),
            'K' => Ok(Rank::King),
            'A' => Ok(Rank::Ace),
            _ => Err(CardParseError::Rank(c)),
        }
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    pub fn rank_value(&self) -> u8 {
        self.rank.value()
    }

    /// Dense index in `0..52`, suit-major.
    pub fn index(&self) -> usize {
        self.suit.index() * 13 + (self.rank.value() as usize - 2)
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(r), Some(u), None) => Ok(Card::new(Rank::from_code(r)?, Suit::from_code(u)?)),
            _ => Err(CardParseError::Length(s.to_string())),
        }
    }
}

/// Parses a run of card codes as they appear in hand histories.
///
/// Accepts `"AsKd"`, `"As,Kd"`, `"As Kd"` and bracketed boards like `"[Ah7c2d]"`.
/// Duplicates are rejected.
pub fn parse_cards(s: &str) -> Result<Vec<Card>, CardParseError> {
    let compact: Vec<char> = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '[' | ']'))
        .collect();
    if compact.len() % 2 != 0 {
        return Err(CardParseError::Length(s.to_string()));
    }

    let mut cards = Vec::with_capacity(compact.len() / 2);
    for pair in compact.chunks(2) {
        let card = Card::new(Rank::from_code(pair[0])?, Suit::from_code(pair[1])?);
        if cards.contains(&card) {
            return Err(CardParseError::Duplicate(card));
        }
        cards.push(card);
    }
    Ok(cards)
}

pub fn format_cards(cards: &[Card]) -> String {
    cards.iter().map(Card::to_string).collect()
}

pub fn standard_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            cards.push(Card::new(rank, suit));
        }
    }
    cards
}

pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = standard_deck();
    deck.shuffle(rng);
    deck
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separated_and_bracketed_codes() {
        let cards = parse_cards("[Ah 7c,2d]").unwrap();
        assert_eq!(format_cards(&cards), "Ah7c2d");
    }

    #[test]
    fn rejects_duplicates_and_odd_lengths() {
        assert!(matches!(
            parse_cards("AhAh"),
            Err(CardParseError::Duplicate(_))
        ));
        assert!(matches!(parse_cards("AhK"), Err(CardParseError::Length(_))));
        assert!(matches!(parse_cards("Xh"), Err(CardParseError::Rank('X'))));
    }

    #[test]
    fn indices_are_dense_and_unique() {
        let mut seen = [false; 52];
        for card in standard_deck() {
            assert!(!seen[card.index()]);
            seen[card.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
